#![forbid(unsafe_code)]

//! The engine facade: one object wiring the store, runner, recorder,
//! gate, watcher, and persistence together for the host UI.
//!
//! # Construction
//!
//! [`TourEngine::initialize`] fetches the journey snapshot from the
//! service, registers the fetched definitions, restores the persisted
//! session and dismissal sets, and dispatches `Initialize`. Everything
//! afterward is local-first: remote writes are fire-and-confirm, and a
//! failed confirmation never rolls a local transition back.
//!
//! # Failure Modes
//!
//! Only `initialize` can fail (the snapshot fetch). Every other method
//! absorbs remote and storage failures with a warning.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;
use std::time::Instant;

use tourkit_analytics::{
    AnalyticsRecorder, AnalyticsSink, DeviceContext, RecorderConfig, SessionIdentity, SinkError,
};
use tourkit_core::dom::DomAdapter;
use tourkit_core::event::KeyEvent;
use tourkit_core::geometry::Size;
use tourkit_core::reflow::{ReflowCoalescer, ReflowTrigger};
use tourkit_core::storage::{
    KEY_DISMISSED_HIGHLIGHTS, KEY_READ_ANNOUNCEMENTS, StorageBackend, load_json, store_json,
};
use tourkit_journey::action::Action;
use tourkit_journey::catalog::{Catalog, HighlightDef, StepDef};
use tourkit_journey::gate::{FeatureGate, GateDecision};
use tourkit_journey::projection;
use tourkit_journey::stage::PlanTier;
use tourkit_journey::state::{JourneyState, PreferencePatch};
use tourkit_journey::{HighlightId, TimestampMs};

use crate::runner::{RunnerCtx, StepView, TourPhase, TourRunner};
use crate::service::JourneyService;
use crate::session::load_or_create_session;
use crate::store::{JourneyStore, StoreObserver};

/// Engine construction parameters.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub recorder: RecorderConfig,
    pub tier: PlanTier,
    pub device: DeviceContext,
    /// Host feature flags, consulted by highlight show-conditions.
    pub feature_flags: BTreeSet<String>,
}

impl<S: AnalyticsSink> StoreObserver for AnalyticsRecorder<S> {
    fn on_transition(&mut self, transition: &tourkit_journey::reducer::Transition) {
        self.observe_transition(transition);
    }
}

/// The assembled onboarding engine.
pub struct TourEngine<D: DomAdapter, S: AnalyticsSink> {
    dom: D,
    storage: Rc<dyn StorageBackend>,
    store: JourneyStore,
    runner: TourRunner,
    recorder: Rc<RefCell<AnalyticsRecorder<S>>>,
    gate: FeatureGate,
    tier: PlanTier,
    session: SessionIdentity,
    feature_flags: BTreeSet<String>,
    reflow: ReflowCoalescer,
    /// Locally persisted dismissals; unioned with store state so a
    /// dismissal outlives any particular journey snapshot.
    dismissed: BTreeSet<HighlightId>,
    read_announcements: BTreeSet<String>,
}

impl<D: DomAdapter, S: AnalyticsSink + 'static> TourEngine<D, S> {
    /// Fetch the journey and assemble the engine.
    pub fn initialize(
        dom: D,
        storage: Rc<dyn StorageBackend>,
        sink: S,
        gate: FeatureGate,
        config: EngineConfig,
        service: &mut dyn JourneyService,
        user_id: &str,
        at: TimestampMs,
    ) -> Result<Self, crate::service::ServiceError> {
        let fetched = service.fetch_journey(user_id)?;
        let session = load_or_create_session(
            storage.as_ref(),
            &fetched.user_id,
            &fetched.organization_id,
            at,
        );
        let recorder = Rc::new(RefCell::new(AnalyticsRecorder::new(
            Rc::clone(&storage),
            sink,
            session.clone(),
            config.device,
            config.recorder,
        )));

        let mut store = JourneyStore::new(Catalog::new());
        for step in fetched.steps {
            if let Err(e) = store.register_step(step) {
                tracing::warn!(error = %e, "skipping invalid step definition");
            }
        }
        for highlight in fetched.highlights {
            if let Err(e) = store.register_highlight(highlight) {
                tracing::warn!(error = %e, "skipping invalid highlight definition");
            }
        }
        let observer: Rc<RefCell<dyn StoreObserver>> = recorder.clone();
        store.subscribe(observer);

        store.dispatch(Action::Initialize {
            user_id: fetched.user_id,
            organization_id: fetched.organization_id,
            registered_at: fetched.registered_at,
            stage: fetched.stage,
            completed: fetched.completed,
            skipped: fetched.skipped,
            preferences: fetched.preferences,
            highlights: fetched.active_highlights,
            milestones: fetched
                .milestones
                .into_iter()
                .map(|m| (m.id, m.achieved_at))
                .collect(),
            at,
        });

        let dismissed: BTreeSet<HighlightId> =
            load_json(storage.as_ref(), KEY_DISMISSED_HIGHLIGHTS);
        let read_announcements: BTreeSet<String> =
            load_json(storage.as_ref(), KEY_READ_ANNOUNCEMENTS);

        Ok(Self {
            dom,
            storage,
            store,
            runner: TourRunner::new(),
            recorder,
            gate,
            tier: config.tier,
            session,
            feature_flags: config.feature_flags,
            reflow: ReflowCoalescer::new(),
            dismissed,
            read_announcements,
        })
    }

    // -----------------------------------------------------------------
    // Tours
    // -----------------------------------------------------------------

    /// Whether offering this tour makes sense: tours enabled and the
    /// tour not already finished (completed or skipped).
    #[must_use]
    pub fn should_show_tour(&self, tour_id: &str) -> bool {
        self.store.state().preferences.tours_enabled
            && !self.store.state().has_finished_tour(tour_id)
    }

    /// Start a tour, fetching its definition from the service if the
    /// catalog does not have it yet. Returns whether the tour is running.
    pub fn start_tour(
        &mut self,
        service: &mut dyn JourneyService,
        tour_id: &str,
        now: Instant,
        at: TimestampMs,
    ) -> bool {
        if !self.should_show_tour(tour_id) {
            tracing::debug!(tour = tour_id, "tour not offered");
            return false;
        }
        if self.store.catalog().tour(tour_id).is_none() {
            match service.fetch_tour(tour_id) {
                Ok(tour) => {
                    if let Err(e) = self.store.register_tour(tour) {
                        tracing::warn!(tour = tour_id, error = %e, "fetched tour failed validation");
                        return false;
                    }
                }
                Err(e) => {
                    tracing::warn!(tour = tour_id, error = %e, "tour fetch failed");
                    return false;
                }
            }
        }
        self.with_runner(now, at, |runner, ctx| runner.start(tour_id, ctx));
        matches!(self.runner.phase(), TourPhase::Running(_))
    }

    /// Advance the running tour.
    pub fn next(&mut self, now: Instant, at: TimestampMs) {
        self.with_runner(now, at, |runner, ctx| runner.next(ctx));
    }

    /// Step the running tour back.
    pub fn previous(&mut self, now: Instant, at: TimestampMs) {
        self.with_runner(now, at, |runner, ctx| runner.previous(ctx));
    }

    /// Skip the running tour.
    pub fn skip_tour(&mut self, now: Instant, at: TimestampMs) {
        self.with_runner(now, at, |runner, ctx| runner.skip(ctx));
    }

    /// Complete the running tour.
    pub fn complete_tour(&mut self, now: Instant, at: TimestampMs) {
        self.with_runner(now, at, |runner, ctx| runner.complete(ctx));
    }

    /// Pause the running tour.
    pub fn pause(&mut self, now: Instant) {
        self.runner.pause(now);
    }

    /// Resume a paused tour.
    pub fn resume(&mut self, now: Instant) {
        self.runner.resume(now);
    }

    /// Route a keyboard event to the runner.
    pub fn handle_key(&mut self, key: KeyEvent, now: Instant, at: TimestampMs) {
        self.with_runner(now, at, |runner, ctx| runner.handle_key(key, ctx));
    }

    /// Drive deadlines (auto-advance, completion grace, watch timeouts).
    pub fn tick(&mut self, now: Instant, at: TimestampMs) {
        self.with_runner(now, at, |runner, ctx| runner.tick(ctx));
    }

    /// The earliest instant at which [`TourEngine::tick`] or a reflow
    /// recomputation has work to do.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        [self.runner.next_deadline(), self.reflow.next_deadline()]
            .into_iter()
            .flatten()
            .min()
    }

    /// Render model for the current step, with the tooltip placed
    /// against the live target geometry.
    #[must_use]
    pub fn step_view(&self, tooltip: Size) -> Option<StepView> {
        self.runner.step_view(&self.dom, tooltip)
    }

    /// Runner phase.
    #[must_use]
    pub fn phase(&self) -> TourPhase {
        self.runner.phase()
    }

    // -----------------------------------------------------------------
    // Reflow
    // -----------------------------------------------------------------

    /// Note a scroll or resize; placement recomputation becomes due at
    /// frame granularity.
    pub fn mark_reflow(&mut self, trigger: ReflowTrigger, now: Instant) {
        self.reflow.mark(trigger, now);
    }

    /// Whether the host should recompute the step view now.
    pub fn take_reflow(&mut self, now: Instant) -> bool {
        self.reflow.take_due(now)
    }

    // -----------------------------------------------------------------
    // Checklist and preferences
    // -----------------------------------------------------------------

    /// Complete a checklist step locally and confirm it remotely.
    pub fn complete_step(
        &mut self,
        service: &mut dyn JourneyService,
        step_id: &str,
        at: TimestampMs,
    ) {
        let accepted = self
            .store
            .dispatch(Action::CompleteStep {
                id: step_id.to_string(),
                at,
            })
            .is_some();
        if accepted && let Err(e) = service.complete_step(step_id) {
            tracing::warn!(step = step_id, error = %e, "remote step completion failed, local state stands");
        }
    }

    /// Skip a checklist step locally and confirm it remotely.
    pub fn skip_step(
        &mut self,
        service: &mut dyn JourneyService,
        step_id: &str,
        reason: Option<&str>,
        at: TimestampMs,
    ) {
        let accepted = self
            .store
            .dispatch(Action::SkipStep {
                id: step_id.to_string(),
                reason: reason.map(str::to_string),
                at,
            })
            .is_some();
        if accepted && let Err(e) = service.skip_step(step_id, reason) {
            tracing::warn!(step = step_id, error = %e, "remote step skip failed, local state stands");
        }
    }

    /// Apply a preferences patch locally and confirm it remotely.
    pub fn update_preferences(
        &mut self,
        service: &mut dyn JourneyService,
        patch: PreferencePatch,
        at: TimestampMs,
    ) {
        self.store.dispatch(Action::UpdatePreferences { patch, at });
        if let Err(e) = service.update_preferences(patch) {
            tracing::warn!(error = %e, "remote preferences update failed, local state stands");
        }
    }

    /// Record first use of a gated feature.
    pub fn discover_feature(&mut self, feature_id: &str, at: TimestampMs) {
        self.store.dispatch(Action::DiscoverFeature {
            id: feature_id.to_string(),
            at,
        });
    }

    /// Mark a milestone achieved.
    pub fn achieve_milestone(&mut self, milestone_id: &str, at: TimestampMs) {
        self.store.dispatch(Action::AchieveMilestone {
            id: milestone_id.to_string(),
            at,
        });
    }

    // -----------------------------------------------------------------
    // Highlights and announcements
    // -----------------------------------------------------------------

    /// Permanently dismiss a highlight. The id is persisted locally so
    /// the dismissal survives reloads regardless of what the next
    /// journey snapshot contains.
    pub fn dismiss_highlight(&mut self, highlight_id: &str, at: TimestampMs) {
        self.store.dispatch(Action::DismissHighlight {
            id: highlight_id.to_string(),
            at,
        });
        self.dismissed.insert(highlight_id.to_string());
        if let Err(e) = store_json(
            self.storage.as_ref(),
            KEY_DISMISSED_HIGHLIGHTS,
            &self.dismissed,
        ) {
            tracing::warn!(error = %e, "failed to persist dismissed highlights");
        }
    }

    /// Highlights to show right now: active, not dismissed (in state or
    /// locally), show-conditions met, not expired, highest priority first.
    #[must_use]
    pub fn visible_highlights(&self, now: TimestampMs) -> Vec<&HighlightDef> {
        projection::unviewed_highlights(
            self.store.state(),
            self.store.catalog(),
            &self.feature_flags,
            now,
        )
        .into_iter()
        .filter(|h| !self.dismissed.contains(&h.id))
        .collect()
    }

    /// Mark an announcement as read, persisted locally.
    pub fn mark_announcement_read(&mut self, announcement_id: &str) {
        self.read_announcements.insert(announcement_id.to_string());
        if let Err(e) = store_json(
            self.storage.as_ref(),
            KEY_READ_ANNOUNCEMENTS,
            &self.read_announcements,
        ) {
            tracing::warn!(error = %e, "failed to persist read announcements");
        }
    }

    /// Whether an announcement has been read.
    #[must_use]
    pub fn is_announcement_read(&self, announcement_id: &str) -> bool {
        self.read_announcements.contains(announcement_id)
    }

    // -----------------------------------------------------------------
    // Gate, projections, analytics
    // -----------------------------------------------------------------

    /// Evaluate the feature gate for the current journey and plan.
    #[must_use]
    pub fn feature_decision(&self, feature: &str) -> GateDecision {
        self.gate.evaluate(feature, self.store.state(), self.tier)
    }

    /// Fraction of essential checklist steps completed.
    #[must_use]
    pub fn progress(&self) -> f64 {
        projection::overall_progress(self.store.state(), self.store.catalog())
    }

    /// Up to three suggested next checklist steps.
    #[must_use]
    pub fn next_steps(&self) -> Vec<&StepDef> {
        projection::next_steps(self.store.state(), self.store.catalog())
    }

    /// Retry delivery of everything in the analytics backlog.
    pub fn sync_analytics(&mut self) -> Result<usize, SinkError> {
        self.recorder.borrow_mut().sync_stored_events()
    }

    /// Analytics events awaiting delivery.
    #[must_use]
    pub fn pending_analytics(&self) -> usize {
        self.recorder.borrow().pending_count()
    }

    /// Current journey state.
    #[must_use]
    pub fn state(&self) -> &JourneyState {
        self.store.state()
    }

    /// This session's identity.
    #[must_use]
    pub fn session(&self) -> &SessionIdentity {
        &self.session
    }

    fn with_runner<R>(
        &mut self,
        now: Instant,
        at: TimestampMs,
        f: impl FnOnce(&mut TourRunner, &mut RunnerCtx<'_, S>) -> R,
    ) -> R {
        let mut ctx = RunnerCtx {
            store: &mut self.store,
            recorder: &self.recorder,
            dom: &self.dom,
            now,
            at,
        };
        let result = f(&mut self.runner, &mut ctx);
        // No step to place once the tour ends; drop pending reflow work
        // so next_deadline does not wake the host for nothing.
        if !matches!(
            self.runner.phase(),
            TourPhase::Running(_) | TourPhase::Paused(_)
        ) {
            self.reflow.reset();
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tourkit_analytics::{EventKind, MemorySink};
    use tourkit_core::dom::FakeDom;
    use tourkit_core::geometry::Rect;
    use tourkit_core::storage::{FileStorage, MemoryStorage};
    use tourkit_journey::catalog::{StepCategory, TourDef, TourStep};
    use tourkit_journey::gate::FeatureRule;
    use tourkit_journey::stage::Stage;
    use tourkit_journey::state::Preferences;
    use crate::service::{FetchedJourney, MemoryService};

    fn step(id: &str, order: u32) -> StepDef {
        StepDef {
            id: id.into(),
            title: id.into(),
            description: String::new(),
            category: StepCategory::Essential,
            order,
            dependencies: vec![],
        }
    }

    fn highlight(id: &str, priority: u8) -> HighlightDef {
        HighlightDef {
            id: id.into(),
            target: format!("#{id}"),
            title: id.into(),
            content: "Try it".into(),
            priority,
            conditions: vec![],
            expires_at: None,
        }
    }

    fn service() -> MemoryService {
        let mut svc = MemoryService::new();
        svc.put_journey(FetchedJourney {
            user_id: "u1".into(),
            organization_id: "o1".into(),
            registered_at: 10,
            stage: Stage::WorkspaceCreated,
            completed: vec![("create_workspace".into(), 50)],
            skipped: vec![],
            preferences: Preferences::default(),
            steps: vec![
                step("create_workspace", 1),
                step("generate_first_content", 2),
                step("invite_team", 3),
            ],
            highlights: vec![highlight("calendar_view", 5), highlight("bulk_edit", 2)],
            active_highlights: vec!["calendar_view".into(), "bulk_edit".into()],
            milestones: vec![],
        });
        svc.put_tour(TourDef {
            id: "dashboard_overview".into(),
            name: "Dashboard overview".into(),
            steps: (0..6)
                .map(|i| TourStep::new(format!("#s{i}"), format!("Step {i}"), "Body"))
                .collect(),
            estimated_minutes: 4,
            skippable: true,
        });
        svc
    }

    fn engine_with(
        storage: Rc<dyn StorageBackend>,
        svc: &mut MemoryService,
    ) -> TourEngine<FakeDom, MemorySink> {
        let dom = FakeDom::new(Size::new(800.0, 600.0));
        for i in 0..6 {
            dom.insert(format!("#s{i}"), Rect::new(40.0, 40.0 + 50.0 * i as f64, 100.0, 30.0));
        }
        TourEngine::initialize(
            dom,
            storage,
            MemorySink::new(),
            FeatureGate::new([FeatureRule::open("scheduling")
                .with_stage(Stage::FirstContent)
                .with_steps(["generate_first_content"])]),
            EngineConfig::default(),
            svc,
            "u1",
            100,
        )
        .unwrap()
    }

    #[test]
    fn initialize_seeds_state_and_emits_event() {
        let mut svc = service();
        let engine = engine_with(Rc::new(MemoryStorage::new()), &mut svc);

        assert!(engine.state().initialized);
        assert_eq!(engine.state().stage, Stage::WorkspaceCreated);
        assert!(engine.state().is_completed("create_workspace"));
        assert_eq!(engine.session().user_id, "u1");
        assert!((engine.progress() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn initialize_fails_without_a_journey() {
        let mut svc = MemoryService::new();
        let result = TourEngine::initialize(
            FakeDom::new(Size::new(800.0, 600.0)),
            Rc::new(MemoryStorage::new()),
            MemorySink::new(),
            FeatureGate::default(),
            EngineConfig::default(),
            &mut svc,
            "nobody",
            1,
        );
        assert!(result.is_err());
    }

    #[test]
    fn dismissed_highlight_survives_reload() {
        let storage: Rc<dyn StorageBackend> = Rc::new(MemoryStorage::new());
        let mut svc = service();
        {
            let mut engine = engine_with(Rc::clone(&storage), &mut svc);
            let ids: Vec<_> = engine.visible_highlights(0).iter().map(|h| h.id.clone()).collect();
            assert_eq!(ids, vec!["calendar_view".to_string(), "bulk_edit".to_string()]);
            engine.dismiss_highlight("calendar_view", 200);
        }
        let engine = engine_with(Rc::clone(&storage), &mut svc);
        let ids: Vec<_> = engine.visible_highlights(0).iter().map(|h| h.id.clone()).collect();
        assert_eq!(ids, vec!["bulk_edit".to_string()]);
    }

    #[test]
    fn file_backed_state_survives_a_fresh_engine() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("tourkit.json");
        let mut svc = service();
        {
            let storage: Rc<dyn StorageBackend> = Rc::new(FileStorage::new(&path));
            let mut engine = engine_with(Rc::clone(&storage), &mut svc);
            engine.dismiss_highlight("calendar_view", 200);
            engine.mark_announcement_read("release-42");
        }
        let storage: Rc<dyn StorageBackend> = Rc::new(FileStorage::new(&path));
        let engine = engine_with(Rc::clone(&storage), &mut svc);
        let ids: Vec<_> = engine.visible_highlights(0).iter().map(|h| h.id.clone()).collect();
        assert_eq!(ids, vec!["bulk_edit".to_string()]);
        assert!(engine.is_announcement_read("release-42"));
        assert_eq!(engine.session().session_id, "sess-u1-100");
    }

    #[test]
    fn tour_lifecycle_through_the_facade() {
        let mut svc = service();
        let mut engine = engine_with(Rc::new(MemoryStorage::new()), &mut svc);
        let t0 = Instant::now();

        assert!(engine.should_show_tour("dashboard_overview"));
        assert!(engine.start_tour(&mut svc, "dashboard_overview", t0, 100));
        for i in 1..=5u64 {
            engine.next(t0 + Duration::from_millis(i * 100), 100 + i);
        }
        engine.complete_tour(t0 + Duration::from_secs(1), 200);

        assert_eq!(engine.phase(), TourPhase::Completed);
        assert!(!engine.should_show_tour("dashboard_overview"));
        assert!(!engine.start_tour(&mut svc, "dashboard_overview", t0, 300));
    }

    #[test]
    fn ending_a_tour_drops_pending_reflow_work() {
        let mut svc = service();
        let mut engine = engine_with(Rc::new(MemoryStorage::new()), &mut svc);
        let t0 = Instant::now();

        assert!(engine.start_tour(&mut svc, "dashboard_overview", t0, 100));
        engine.mark_reflow(ReflowTrigger::Scroll, t0 + Duration::from_millis(10));
        assert!(engine.next_deadline().is_some());

        engine.skip_tour(t0 + Duration::from_millis(20), 120);
        assert_eq!(engine.phase(), TourPhase::Skipped);
        assert!(engine.next_deadline().is_none());
        assert!(!engine.take_reflow(t0 + Duration::from_millis(30)));
    }

    #[test]
    fn flagged_highlight_needs_the_host_flag() {
        let mut svc = service();
        svc.journeys.get_mut("u1").unwrap().highlights[0].conditions =
            vec![tourkit_journey::catalog::ShowCondition::FeatureFlag {
                name: "calendar_beta".into(),
            }];

        let engine = engine_with(Rc::new(MemoryStorage::new()), &mut svc);
        let ids: Vec<_> = engine.visible_highlights(0).iter().map(|h| h.id.clone()).collect();
        assert_eq!(ids, vec!["bulk_edit".to_string()]);

        let dom = FakeDom::new(Size::new(800.0, 600.0));
        let engine = TourEngine::initialize(
            dom,
            Rc::new(MemoryStorage::new()),
            MemorySink::new(),
            FeatureGate::default(),
            EngineConfig {
                feature_flags: ["calendar_beta".to_string()].into(),
                ..EngineConfig::default()
            },
            &mut svc,
            "u1",
            100,
        )
        .unwrap();
        let ids: Vec<_> = engine.visible_highlights(0).iter().map(|h| h.id.clone()).collect();
        assert_eq!(ids, vec!["calendar_view".to_string(), "bulk_edit".to_string()]);
    }

    #[test]
    fn first_content_metric_flows_through_the_facade() {
        let mut svc = service();
        let mut engine = engine_with(Rc::new(MemoryStorage::new()), &mut svc);
        assert_eq!(engine.state().metrics.time_to_first_content_ms, None);

        engine.complete_step(&mut svc, "generate_first_content", 250);
        // Registered at 10, first content at 250.
        assert_eq!(engine.state().metrics.time_to_first_content_ms, Some(240));
    }

    #[test]
    fn tours_disabled_preference_blocks_offers() {
        let mut svc = service();
        let mut engine = engine_with(Rc::new(MemoryStorage::new()), &mut svc);
        engine.update_preferences(
            &mut svc,
            PreferencePatch {
                tours_enabled: Some(false),
                ..PreferencePatch::default()
            },
            150,
        );
        assert!(!engine.should_show_tour("dashboard_overview"));
    }

    #[test]
    fn start_tour_fetches_unknown_definitions() {
        let mut svc = service();
        let mut engine = engine_with(Rc::new(MemoryStorage::new()), &mut svc);
        assert!(!engine.start_tour(&mut svc, "ghost_tour", Instant::now(), 100));
        assert!(engine.start_tour(&mut svc, "dashboard_overview", Instant::now(), 100));
    }

    #[test]
    fn remote_write_failure_leaves_local_state_standing() {
        let mut svc = service();
        let mut engine = engine_with(Rc::new(MemoryStorage::new()), &mut svc);

        svc.set_failing(true);
        engine.complete_step(&mut svc, "invite_team", 300);
        assert!(engine.state().is_completed("invite_team"));
        assert!(svc.completed_writes.is_empty());

        svc.set_failing(false);
        engine.complete_step(&mut svc, "generate_first_content", 400);
        assert_eq!(svc.completed_writes, vec!["generate_first_content".to_string()]);
    }

    #[test]
    fn feature_gate_reflects_journey_progress() {
        let mut svc = service();
        let engine = engine_with(Rc::new(MemoryStorage::new()), &mut svc);
        // Stage WorkspaceCreated < FirstContent.
        assert!(!engine.feature_decision("scheduling").enabled);
        assert!(engine.feature_decision("unruled").enabled);
    }

    #[test]
    fn read_announcements_persist() {
        let storage: Rc<dyn StorageBackend> = Rc::new(MemoryStorage::new());
        let mut svc = service();
        {
            let mut engine = engine_with(Rc::clone(&storage), &mut svc);
            assert!(!engine.is_announcement_read("v2_launch"));
            engine.mark_announcement_read("v2_launch");
        }
        let engine = engine_with(Rc::clone(&storage), &mut svc);
        assert!(engine.is_announcement_read("v2_launch"));
    }

    #[test]
    fn analytics_flow_through_the_facade() {
        let mut svc = service();
        let mut engine = engine_with(Rc::new(MemoryStorage::new()), &mut svc);
        engine.discover_feature("competitor_report", 500);

        let recorder = engine.recorder.borrow();
        let kinds: Vec<_> = recorder.sink().delivered.iter().map(|e| e.kind).collect();
        drop(recorder);
        assert!(kinds.contains(&EventKind::JourneyInitialized));
        assert!(kinds.contains(&EventKind::FeatureDiscovered));
        assert_eq!(engine.pending_analytics(), 0);
        assert_eq!(engine.sync_analytics().unwrap(), 0);
    }
}
