#![forbid(unsafe_code)]

//! The tour runner state machine.
//!
//! Phases: `Idle -> Running(i) -> { Running(i+1), Paused(i), Completed,
//! Skipped }`. The runner owns the cursor and the step-scoped tasks
//! (auto-advance, completion grace, wait-for-element watch); the store
//! owns the authoritative tour progress. Only one tour runs at a time:
//! starting a new tour force-skips the active one first.
//!
//! # Invariants
//!
//! - The cursor never leaves `[0, last_index]`.
//! - Leaving a step (next, previous, skip, complete) cancels every task
//!   scheduled for that step before anything else happens.
//! - Step duration measures active viewing time only; pausing freezes
//!   the clock and resuming restarts it without counting the gap.
//!
//! # Failure Modes
//!
//! Starting an unregistered tour logs a warning and stays `Idle`. A wait
//! target that never appears times out and the runner proceeds; the user
//! is never blocked indefinitely.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tourkit_analytics::{AnalyticsRecorder, AnalyticsSink, EventKind};
use tourkit_core::dom::DomAdapter;
use tourkit_core::event::{KeyCode, KeyEvent};
use tourkit_core::geometry::{ResolvedPosition, Size, resolve_placement};
use tourkit_journey::action::Action;
use tourkit_journey::catalog::{StepAction, TourDef, TourStep};
use tourkit_journey::state::TourOutcome;
use tourkit_journey::{TimestampMs, TourId};

use crate::store::JourneyStore;
use crate::task::{TaskKind, TaskSet};
use crate::watcher::{WatchHandle, watch};

/// Delay between rendering the last step and auto-firing completion, so
/// the final step is actually seen before the tour ends itself.
pub const COMPLETION_GRACE: Duration = Duration::from_millis(400);

/// Where the runner stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TourPhase {
    #[default]
    Idle,
    Running(usize),
    Paused(usize),
    Completed,
    Skipped,
}

/// Everything the runner needs from its surroundings for one call.
///
/// Built fresh per host callback; `at` is the wall-clock stamp actions
/// and events carry, `now` drives durations and deadlines.
pub struct RunnerCtx<'a, S: AnalyticsSink> {
    pub store: &'a mut JourneyStore,
    pub recorder: &'a Rc<RefCell<AnalyticsRecorder<S>>>,
    pub dom: &'a dyn DomAdapter,
    pub now: Instant,
    pub at: TimestampMs,
}

/// What the host renders for the current step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepView {
    pub tour_id: TourId,
    pub index: usize,
    pub is_last: bool,
    pub step: TourStep,
    /// Resolved tooltip position, `None` while the target is absent.
    pub position: Option<ResolvedPosition>,
}

/// Sequences one tour's steps against the store.
#[derive(Debug, Default)]
pub struct TourRunner {
    phase: TourPhase,
    tour: Option<TourDef>,
    tour_started: Option<Instant>,
    /// Baseline of the current active viewing span; `None` while paused.
    step_entered: Option<Instant>,
    /// Active viewing time accumulated before the current span.
    step_active: Duration,
    tasks: TaskSet,
    watch_handle: Option<WatchHandle>,
    /// A requested advance deferred by an unresolved wait-for action.
    pending_advance: bool,
}

impl TourRunner {
    /// A runner in `Idle`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------

    /// Start a tour at step 0, force-skipping any active tour first.
    ///
    /// An unregistered tour id is absorbed with a warning; nothing
    /// changes, the active tour included.
    pub fn start<S: AnalyticsSink>(&mut self, tour_id: &str, ctx: &mut RunnerCtx<'_, S>) {
        let Some(tour) = ctx.store.catalog().tour(tour_id).cloned() else {
            tracing::warn!(tour = tour_id, "cannot start unregistered tour");
            return;
        };
        if matches!(self.phase, TourPhase::Running(_) | TourPhase::Paused(_)) {
            tracing::debug!(tour = tour_id, "force-skipping active tour before start");
            self.skip(ctx);
        }
        ctx.store.dispatch(Action::StartTour {
            id: tour_id.to_string(),
            at: ctx.at,
        });
        let mut props = Map::new();
        props.insert("tour_id".into(), Value::from(tour_id));
        props.insert("step_count".into(), Value::from(tour.steps.len()));
        props.insert(
            "estimated_minutes".into(),
            Value::from(tour.estimated_minutes),
        );
        ctx.recorder
            .borrow_mut()
            .record(EventKind::TourStarted, props, ctx.at);

        self.tour = Some(tour);
        self.tour_started = Some(ctx.now);
        self.phase = TourPhase::Running(0);
        self.enter_step(0, ctx);
    }

    /// Advance the cursor, recording viewing time for the step left.
    ///
    /// Permitted only while `Running` with steps ahead. If the current
    /// step declares an unresolved wait-for action, the advance is
    /// deferred until the watch resolves.
    pub fn next<S: AnalyticsSink>(&mut self, ctx: &mut RunnerCtx<'_, S>) {
        let TourPhase::Running(index) = self.phase else {
            return;
        };
        if index >= self.last_index() {
            return;
        }
        if let Some(handle) = self.watch_handle.as_mut()
            && !handle.poll(ctx.now).is_resolved()
        {
            tracing::trace!(selector = handle.selector(), "advance deferred by wait-for");
            self.pending_advance = true;
            return;
        }
        self.advance_from(index, ctx);
    }

    /// Move the cursor back one step.
    ///
    /// A navigation, not a completion: no viewing-time event is recorded
    /// for the step being left.
    pub fn previous<S: AnalyticsSink>(&mut self, ctx: &mut RunnerCtx<'_, S>) {
        let TourPhase::Running(index) = self.phase else {
            return;
        };
        if index == 0 {
            return;
        }
        ctx.store.dispatch(Action::AdvanceTourStep {
            index: index - 1,
            at: ctx.at,
        });
        self.phase = TourPhase::Running(index - 1);
        self.enter_step(index - 1, ctx);
    }

    /// End the tour as skipped, from wherever the cursor stands.
    pub fn skip<S: AnalyticsSink>(&mut self, ctx: &mut RunnerCtx<'_, S>) {
        let index = match self.phase {
            TourPhase::Running(i) | TourPhase::Paused(i) => i,
            _ => return,
        };
        let Some(tour) = &self.tour else { return };
        let tour_id = tour.id.clone();
        let elapsed_ms = self
            .tour_started
            .map_or(0, |s| ctx.now.saturating_duration_since(s).as_millis() as u64);
        let progress_pct = index as f64 / tour.steps.len() as f64 * 100.0;

        let mut props = Map::new();
        props.insert("tour_id".into(), Value::from(tour_id.clone()));
        props.insert("elapsed_ms".into(), Value::from(elapsed_ms));
        props.insert("progress_pct".into(), Value::from(progress_pct));
        ctx.recorder
            .borrow_mut()
            .record(EventKind::TourSkipped, props, ctx.at);

        self.leave_step();
        ctx.store.dispatch(Action::EndTour {
            id: tour_id,
            outcome: TourOutcome::Skipped,
            at: ctx.at,
        });
        self.phase = TourPhase::Skipped;
    }

    /// End the tour as completed. Idempotent: a no-op in any terminal
    /// phase or `Idle`.
    pub fn complete<S: AnalyticsSink>(&mut self, ctx: &mut RunnerCtx<'_, S>) {
        if !matches!(self.phase, TourPhase::Running(_) | TourPhase::Paused(_)) {
            return;
        }
        let Some(tour) = &self.tour else { return };
        let tour_id = tour.id.clone();
        let total_ms = self
            .tour_started
            .map_or(0, |s| ctx.now.saturating_duration_since(s).as_millis() as u64);

        let mut props = Map::new();
        props.insert("tour_id".into(), Value::from(tour_id.clone()));
        props.insert("total_ms".into(), Value::from(total_ms));
        props.insert("step_count".into(), Value::from(tour.steps.len()));
        ctx.recorder
            .borrow_mut()
            .record(EventKind::TourCompleted, props, ctx.at);

        self.leave_step();
        ctx.store.dispatch(Action::EndTour {
            id: tour_id,
            outcome: TourOutcome::Completed,
            at: ctx.at,
        });
        self.phase = TourPhase::Completed;
    }

    /// Freeze the per-step clock and suspend deadlines.
    ///
    /// The wait-for watch stays alive: the page can finish rendering
    /// while the user is away.
    pub fn pause(&mut self, now: Instant) {
        let TourPhase::Running(index) = self.phase else {
            return;
        };
        if let Some(entered) = self.step_entered.take() {
            self.step_active += now.saturating_duration_since(entered);
        }
        self.tasks.cancel_all();
        self.phase = TourPhase::Paused(index);
    }

    /// Resume from `Paused`, restarting the viewing clock and
    /// rescheduling the step's deadlines from scratch.
    pub fn resume(&mut self, now: Instant) {
        let TourPhase::Paused(index) = self.phase else {
            return;
        };
        self.phase = TourPhase::Running(index);
        self.step_entered = Some(now);
        self.schedule_step_deadlines(index, now);
    }

    /// Apply a keyboard shortcut. Active only while `Running`; a paused
    /// tour ignores keys entirely.
    pub fn handle_key<S: AnalyticsSink>(&mut self, key: KeyEvent, ctx: &mut RunnerCtx<'_, S>) {
        if !key.is_plain_press() {
            return;
        }
        let TourPhase::Running(index) = self.phase else {
            return;
        };
        match key.code {
            KeyCode::ArrowRight | KeyCode::Char(' ') => self.next(ctx),
            KeyCode::ArrowLeft => self.previous(ctx),
            KeyCode::Escape => self.skip(ctx),
            KeyCode::Enter => {
                if index == self.last_index() {
                    self.complete(ctx);
                } else {
                    self.next(ctx);
                }
            }
            _ => {}
        }
    }

    /// Drive deadlines and the wait-for watch. The host calls this when
    /// `next_deadline` fires (or on any convenient cadence).
    pub fn tick<S: AnalyticsSink>(&mut self, ctx: &mut RunnerCtx<'_, S>) {
        if matches!(self.phase, TourPhase::Running(_)) {
            if let Some(handle) = self.watch_handle.as_mut()
                && handle.poll(ctx.now).is_resolved()
            {
                self.watch_handle = None;
                if self.pending_advance {
                    self.pending_advance = false;
                    if let TourPhase::Running(index) = self.phase {
                        self.advance_from(index, ctx);
                    }
                }
            }
            for kind in self.tasks.take_due(ctx.now) {
                match kind {
                    TaskKind::AutoAdvance => self.next(ctx),
                    TaskKind::CompletionGrace => self.complete(ctx),
                }
            }
        }
    }

    /// The earliest instant at which `tick` has work to do.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        let watch = self.watch_handle.as_ref().and_then(WatchHandle::deadline);
        match (self.tasks.next_deadline(), watch) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    // -----------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> TourPhase {
        self.phase
    }

    /// Cursor position while `Running` or `Paused`.
    #[must_use]
    pub fn step_index(&self) -> Option<usize> {
        match self.phase {
            TourPhase::Running(i) | TourPhase::Paused(i) => Some(i),
            _ => None,
        }
    }

    /// Whether the cursor sits on the last step.
    #[must_use]
    pub fn is_last_step(&self) -> bool {
        self.step_index() == Some(self.last_index()) && self.tour.is_some()
    }

    /// Id of the loaded tour, if any.
    #[must_use]
    pub fn tour_id(&self) -> Option<&str> {
        self.tour.as_ref().map(|t| t.id.as_str())
    }

    /// The step under the cursor.
    #[must_use]
    pub fn current_step(&self) -> Option<&TourStep> {
        let index = self.step_index()?;
        self.tour.as_ref().and_then(|t| t.steps.get(index))
    }

    /// Build the render model for the current step.
    ///
    /// `tooltip` is the host-measured tooltip size. The position is
    /// `None` while the target element is absent; the host typically
    /// renders a centered fallback.
    #[must_use]
    pub fn step_view(&self, dom: &dyn DomAdapter, tooltip: Size) -> Option<StepView> {
        let index = self.step_index()?;
        let tour = self.tour.as_ref()?;
        let step = tour.steps.get(index)?;
        let position = dom
            .resolve(&step.target)
            .map(|el| resolve_placement(el.rect, tooltip, step.placement, dom.viewport()));
        Some(StepView {
            tour_id: tour.id.clone(),
            index,
            is_last: index == tour.last_index(),
            step: step.clone(),
            position,
        })
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    fn last_index(&self) -> usize {
        self.tour.as_ref().map_or(0, TourDef::last_index)
    }

    fn advance_from<S: AnalyticsSink>(&mut self, index: usize, ctx: &mut RunnerCtx<'_, S>) {
        self.record_step_viewed(index, ctx);
        ctx.store.dispatch(Action::AdvanceTourStep {
            index: index + 1,
            at: ctx.at,
        });
        self.phase = TourPhase::Running(index + 1);
        self.enter_step(index + 1, ctx);
    }

    fn enter_step<S: AnalyticsSink>(&mut self, index: usize, ctx: &mut RunnerCtx<'_, S>) {
        self.leave_step();
        self.step_entered = Some(ctx.now);
        self.step_active = Duration::ZERO;

        let Some(tour) = &self.tour else { return };
        let Some(step) = tour.steps.get(index) else {
            return;
        };
        if let Some(StepAction::WaitFor { selector, timeout }) = &step.action {
            self.watch_handle = Some(watch(ctx.dom, selector, *timeout, ctx.now));
        }
        self.schedule_step_deadlines(index, ctx.now);
    }

    fn schedule_step_deadlines(&mut self, index: usize, now: Instant) {
        let Some(tour) = &self.tour else { return };
        if let Some(step) = tour.steps.get(index)
            && let Some(delay) = step.auto_advance
        {
            self.tasks.schedule(TaskKind::AutoAdvance, now + delay);
        }
        if index == tour.last_index() {
            self.tasks.schedule(TaskKind::CompletionGrace, now + COMPLETION_GRACE);
        }
    }

    /// Cancel everything scoped to the current step.
    fn leave_step(&mut self) {
        self.tasks.cancel_all();
        if let Some(mut handle) = self.watch_handle.take() {
            handle.cancel();
        }
        self.pending_advance = false;
    }

    fn step_elapsed(&self, now: Instant) -> Duration {
        self.step_active
            + self
                .step_entered
                .map_or(Duration::ZERO, |e| now.saturating_duration_since(e))
    }

    fn record_step_viewed<S: AnalyticsSink>(&self, index: usize, ctx: &mut RunnerCtx<'_, S>) {
        let Some(tour) = &self.tour else { return };
        let duration_ms = self.step_elapsed(ctx.now).as_millis() as u64;
        let estimate_ms = u64::from(tour.estimated_minutes) * 60_000 / tour.steps.len() as u64;

        let mut props = Map::new();
        props.insert("tour_id".into(), Value::from(tour.id.clone()));
        props.insert("step_index".into(), Value::from(index));
        props.insert("duration_ms".into(), Value::from(duration_ms));
        props.insert(
            "efficiency".into(),
            Value::from(step_efficiency(estimate_ms, duration_ms)),
        );
        ctx.recorder
            .borrow_mut()
            .record(EventKind::TourStepViewed, props, ctx.at);
    }
}

/// Estimated-over-elapsed viewing ratio.
///
/// Elapsed time is floored at one second and the ratio clamped to
/// `[0.0, 10.0]`, so a step dismissed instantly cannot produce an
/// unbounded value.
#[must_use]
pub fn step_efficiency(estimate_ms: u64, elapsed_ms: u64) -> f64 {
    let elapsed = elapsed_ms.max(1_000);
    (estimate_ms as f64 / elapsed as f64).clamp(0.0, 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tourkit_analytics::{DeviceContext, MemorySink, RecorderConfig, SessionIdentity};
    use tourkit_core::dom::FakeDom;
    use tourkit_core::event::KeyEventKind;
    use tourkit_core::geometry::Rect;
    use tourkit_core::storage::MemoryStorage;
    use tourkit_journey::catalog::Catalog;

    struct Harness {
        dom: FakeDom,
        store: JourneyStore,
        recorder: Rc<RefCell<AnalyticsRecorder<MemorySink>>>,
        runner: TourRunner,
        t0: Instant,
    }

    fn six_step_tour() -> TourDef {
        TourDef {
            id: "dashboard_overview".into(),
            name: "Dashboard overview".into(),
            steps: (0..6)
                .map(|i| TourStep::new(format!("#s{i}"), format!("Step {i}"), "Body"))
                .collect(),
            estimated_minutes: 4,
            skippable: true,
        }
    }

    impl Harness {
        fn new() -> Self {
            let dom = FakeDom::new(Size::new(800.0, 600.0));
            for i in 0..6 {
                dom.insert(
                    format!("#s{i}"),
                    Rect::new(50.0, 50.0 + 60.0 * i as f64, 120.0, 40.0),
                );
            }
            let mut catalog = Catalog::new();
            catalog.register_tour(six_step_tour()).unwrap();
            catalog
                .register_tour(TourDef {
                    id: "async_panel".into(),
                    name: "Async panel".into(),
                    steps: vec![
                        TourStep::new("#s0", "Wait here", "Body").with_action(
                            StepAction::WaitFor {
                                selector: "#async".into(),
                                timeout: Duration::from_millis(500),
                            },
                        ),
                        TourStep::new("#s1", "Then here", "Body"),
                    ],
                    estimated_minutes: 1,
                    skippable: true,
                })
                .unwrap();
            catalog
                .register_tour(TourDef {
                    id: "auto_play".into(),
                    name: "Auto play".into(),
                    steps: vec![
                        TourStep::new("#s0", "First", "Body")
                            .with_auto_advance(Duration::from_millis(100)),
                        TourStep::new("#s1", "Second", "Body"),
                        TourStep::new("#s2", "Third", "Body"),
                    ],
                    estimated_minutes: 1,
                    skippable: true,
                })
                .unwrap();
            let recorder = Rc::new(RefCell::new(AnalyticsRecorder::new(
                Rc::new(MemoryStorage::new()),
                MemorySink::new(),
                SessionIdentity {
                    session_id: "sess".into(),
                    user_id: "u".into(),
                    organization_id: "o".into(),
                },
                DeviceContext::default(),
                RecorderConfig::default(),
            )));
            Self {
                dom,
                store: JourneyStore::new(catalog),
                recorder,
                runner: TourRunner::new(),
                t0: Instant::now(),
            }
        }

        fn with_ctx(&mut self, ms: u64, f: impl FnOnce(&mut TourRunner, &mut RunnerCtx<'_, MemorySink>)) {
            let mut ctx = RunnerCtx {
                store: &mut self.store,
                recorder: &self.recorder,
                dom: &self.dom,
                now: self.t0 + Duration::from_millis(ms),
                at: ms,
            };
            f(&mut self.runner, &mut ctx);
        }

        fn start(&mut self, id: &str, ms: u64) {
            self.with_ctx(ms, |r, ctx| r.start(id, ctx));
        }

        fn next(&mut self, ms: u64) {
            self.with_ctx(ms, |r, ctx| r.next(ctx));
        }

        fn previous(&mut self, ms: u64) {
            self.with_ctx(ms, |r, ctx| r.previous(ctx));
        }

        fn skip(&mut self, ms: u64) {
            self.with_ctx(ms, |r, ctx| r.skip(ctx));
        }

        fn complete(&mut self, ms: u64) {
            self.with_ctx(ms, |r, ctx| r.complete(ctx));
        }

        fn tick(&mut self, ms: u64) {
            self.with_ctx(ms, |r, ctx| r.tick(ctx));
        }

        fn key(&mut self, code: KeyCode, ms: u64) {
            self.with_ctx(ms, |r, ctx| r.handle_key(KeyEvent::new(code), ctx));
        }

        fn events(&self) -> Vec<EventKind> {
            self.recorder
                .borrow()
                .sink()
                .delivered
                .iter()
                .map(|e| e.kind)
                .collect()
        }

        fn count(&self, kind: EventKind) -> usize {
            self.events().iter().filter(|k| **k == kind).count()
        }
    }

    #[test]
    fn six_step_scenario_completes_into_history() {
        let mut h = Harness::new();
        h.start("dashboard_overview", 0);
        assert_eq!(h.runner.phase(), TourPhase::Running(0));

        for i in 1..=5 {
            h.next(i * 1_000);
        }
        assert_eq!(h.runner.step_index(), Some(5));
        assert!(h.runner.is_last_step());

        // Advancing past the end is refused.
        h.next(5_500);
        assert_eq!(h.runner.step_index(), Some(5));

        h.complete(6_000);
        assert_eq!(h.runner.phase(), TourPhase::Completed);
        assert!(h.store.state().has_finished_tour("dashboard_overview"));
        assert_eq!(h.store.state().metrics.tours_completed, 1);
        assert!(h.store.state().active_tour.is_none());

        assert_eq!(h.count(EventKind::TourStarted), 1);
        assert_eq!(h.count(EventKind::TourStepViewed), 5);
        assert_eq!(h.count(EventKind::TourCompleted), 1);
    }

    #[test]
    fn start_unregistered_tour_stays_idle() {
        let mut h = Harness::new();
        h.start("ghost", 0);
        assert_eq!(h.runner.phase(), TourPhase::Idle);
        assert!(h.events().is_empty());
    }

    #[test]
    fn start_unknown_tour_leaves_the_active_tour_running() {
        let mut h = Harness::new();
        h.start("dashboard_overview", 0);
        h.next(100);
        h.start("ghost", 200);

        assert_eq!(h.runner.phase(), TourPhase::Running(1));
        assert_eq!(h.runner.tour_id(), Some("dashboard_overview"));
        assert_eq!(h.store.state().active_tour.as_ref().unwrap().step_index, 1);
        assert_eq!(h.count(EventKind::TourSkipped), 0);
        assert!(h.store.state().tour_history.is_empty());
    }

    #[test]
    fn skip_then_restart_resets_cursor() {
        let mut h = Harness::new();
        h.start("dashboard_overview", 0);
        h.next(100);
        h.next(200);
        h.skip(300);
        assert_eq!(h.runner.phase(), TourPhase::Skipped);
        assert_eq!(h.count(EventKind::TourSkipped), 1);

        h.start("dashboard_overview", 400);
        assert_eq!(h.runner.phase(), TourPhase::Running(0));
        assert_eq!(h.store.state().active_tour.as_ref().unwrap().step_index, 0);
    }

    #[test]
    fn skip_records_progress_without_advancing_first() {
        let mut h = Harness::new();
        h.start("dashboard_overview", 0);
        h.next(100);
        h.next(200);
        h.skip(10_000);

        let delivered = h.recorder.borrow().sink().delivered.clone();
        let skipped = delivered
            .iter()
            .find(|e| e.kind == EventKind::TourSkipped)
            .unwrap()
            .clone();
        assert_eq!(skipped.properties.get("elapsed_ms"), Some(&Value::from(10_000u64)));
        // 2 of 6 steps seen.
        let pct = skipped.properties.get("progress_pct").unwrap().as_f64().unwrap();
        assert!((pct - 100.0 * 2.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn complete_is_idempotent() {
        let mut h = Harness::new();
        h.complete(0); // Idle: no-op
        h.start("dashboard_overview", 0);
        h.complete(100);
        h.complete(200);
        assert_eq!(h.runner.phase(), TourPhase::Completed);
        assert_eq!(h.count(EventKind::TourCompleted), 1);
        assert_eq!(h.store.state().tour_history.len(), 1);
    }

    #[test]
    fn starting_over_an_active_tour_force_skips_it() {
        let mut h = Harness::new();
        h.start("dashboard_overview", 0);
        h.next(100);
        h.start("auto_play", 200);

        assert_eq!(h.runner.phase(), TourPhase::Running(0));
        assert_eq!(h.runner.tour_id(), Some("auto_play"));
        assert_eq!(h.count(EventKind::TourSkipped), 1);
        assert_eq!(h.count(EventKind::TourStarted), 2);
        assert!(h.store.state().has_finished_tour("dashboard_overview"));
    }

    #[test]
    fn keyboard_bindings_drive_the_cursor() {
        let mut h = Harness::new();
        h.start("dashboard_overview", 0);

        h.key(KeyCode::ArrowRight, 100);
        assert_eq!(h.runner.step_index(), Some(1));
        h.key(KeyCode::Char(' '), 200);
        assert_eq!(h.runner.step_index(), Some(2));
        h.key(KeyCode::ArrowLeft, 300);
        assert_eq!(h.runner.step_index(), Some(1));
        // Enter off the last step advances.
        h.key(KeyCode::Enter, 400);
        assert_eq!(h.runner.step_index(), Some(2));

        h.key(KeyCode::Escape, 500);
        assert_eq!(h.runner.phase(), TourPhase::Skipped);
    }

    #[test]
    fn enter_on_last_step_completes() {
        let mut h = Harness::new();
        h.start("dashboard_overview", 0);
        for i in 1..=5 {
            h.next(i * 100);
        }
        h.key(KeyCode::Enter, 600);
        assert_eq!(h.runner.phase(), TourPhase::Completed);
    }

    #[test]
    fn keys_are_ignored_while_paused_and_on_modified_press() {
        let mut h = Harness::new();
        h.start("dashboard_overview", 0);

        let release = KeyEvent::new(KeyCode::ArrowRight).with_kind(KeyEventKind::Release);
        h.with_ctx(50, |r, ctx| r.handle_key(release, ctx));
        assert_eq!(h.runner.step_index(), Some(0));

        h.runner.pause(h.t0 + Duration::from_millis(100));
        h.key(KeyCode::ArrowRight, 200);
        h.key(KeyCode::Escape, 300);
        assert_eq!(h.runner.phase(), TourPhase::Paused(0));
    }

    #[test]
    fn auto_advance_fires_at_its_deadline() {
        let mut h = Harness::new();
        h.start("auto_play", 0);
        h.tick(99);
        assert_eq!(h.runner.step_index(), Some(0));
        h.tick(100);
        assert_eq!(h.runner.step_index(), Some(1));
        // Step 1 has no auto-advance; nothing further fires.
        h.tick(10_000);
        assert_eq!(h.runner.step_index(), Some(1));
    }

    #[test]
    fn manual_advance_cancels_the_pending_auto_advance() {
        let mut h = Harness::new();
        h.start("auto_play", 0);
        h.next(50);
        assert_eq!(h.runner.step_index(), Some(1));
        // The step-0 timer must not ghost-fire on step 1.
        h.tick(150);
        assert_eq!(h.runner.step_index(), Some(1));
    }

    #[test]
    fn pause_suspends_auto_advance_and_resume_reschedules() {
        let mut h = Harness::new();
        h.start("auto_play", 0);
        h.runner.pause(h.t0 + Duration::from_millis(50));
        h.tick(500);
        assert_eq!(h.runner.phase(), TourPhase::Paused(0));

        h.runner.resume(h.t0 + Duration::from_millis(1_000));
        h.tick(1_099);
        assert_eq!(h.runner.step_index(), Some(0));
        h.tick(1_100);
        assert_eq!(h.runner.step_index(), Some(1));
    }

    #[test]
    fn reaching_the_last_step_schedules_completion_grace() {
        let mut h = Harness::new();
        h.start("dashboard_overview", 0);
        for i in 1..=5 {
            h.next(i * 100);
        }
        assert!(h.runner.is_last_step());
        assert_eq!(h.runner.phase(), TourPhase::Running(5));

        h.tick(500 + COMPLETION_GRACE.as_millis() as u64 - 1);
        assert_eq!(h.runner.phase(), TourPhase::Running(5));
        h.tick(500 + COMPLETION_GRACE.as_millis() as u64);
        assert_eq!(h.runner.phase(), TourPhase::Completed);
    }

    #[test]
    fn stepping_back_off_the_last_step_cancels_the_grace() {
        let mut h = Harness::new();
        h.start("dashboard_overview", 0);
        for i in 1..=5 {
            h.next(i * 100);
        }
        h.previous(600);
        h.tick(600 + COMPLETION_GRACE.as_millis() as u64 + 100);
        assert_eq!(h.runner.phase(), TourPhase::Running(4));
    }

    #[test]
    fn wait_for_defers_advance_until_the_target_appears() {
        let mut h = Harness::new();
        h.start("async_panel", 0);
        h.next(10);
        // Deferred: target absent, watch unresolved.
        assert_eq!(h.runner.step_index(), Some(0));

        h.dom.insert("#async", Rect::new(0.0, 0.0, 10.0, 10.0));
        h.tick(20);
        assert_eq!(h.runner.step_index(), Some(1));
    }

    #[test]
    fn wait_for_timeout_is_permission_to_proceed() {
        let mut h = Harness::new();
        h.start("async_panel", 0);
        h.next(10);
        assert_eq!(h.runner.step_index(), Some(0));

        h.tick(499);
        assert_eq!(h.runner.step_index(), Some(0));
        h.tick(500);
        assert_eq!(h.runner.step_index(), Some(1));
    }

    #[test]
    fn no_pending_task_survives_a_step_transition() {
        let mut h = Harness::new();
        h.start("async_panel", 0);
        assert_eq!(h.dom.active_observer_count(), 1);

        h.skip(100);
        assert_eq!(h.dom.active_observer_count(), 0);
        assert!(h.runner.next_deadline().is_none());

        h.start("auto_play", 200);
        assert!(h.runner.next_deadline().is_some());
        h.complete(300);
        assert!(h.runner.next_deadline().is_none());
        assert_eq!(h.dom.active_observer_count(), 0);
    }

    #[test]
    fn step_duration_counts_active_viewing_time_only() {
        let mut h = Harness::new();
        h.start("dashboard_overview", 0);
        h.runner.pause(h.t0 + Duration::from_millis(100));
        h.runner.resume(h.t0 + Duration::from_millis(1_000));
        h.next(1_100);

        let delivered = h.recorder.borrow().sink().delivered.clone();
        let viewed = delivered
            .iter()
            .find(|e| e.kind == EventKind::TourStepViewed)
            .unwrap()
            .clone();
        // 100ms before the pause, 100ms after the resume.
        assert_eq!(viewed.properties.get("duration_ms"), Some(&Value::from(200u64)));
    }

    #[test]
    fn step_view_resolves_tooltip_position() {
        let mut h = Harness::new();
        h.start("dashboard_overview", 0);
        let view = h
            .runner
            .step_view(&h.dom, Size::new(200.0, 80.0))
            .unwrap();
        assert_eq!(view.index, 0);
        assert!(!view.is_last);
        assert!(view.position.is_some());

        h.dom.remove("#s0");
        let view = h.runner.step_view(&h.dom, Size::new(200.0, 80.0)).unwrap();
        assert!(view.position.is_none());
    }

    #[test]
    fn efficiency_is_floored_and_clamped() {
        // Instant dismissal uses the one-second floor.
        assert!((step_efficiency(5_000, 0) - 5.0).abs() < 1e-9);
        // Long estimates cap at 10.
        assert!((step_efficiency(600_000, 1_000) - 10.0).abs() < 1e-9);
        // Ordinary ratio passes through.
        assert!((step_efficiency(30_000, 60_000) - 0.5).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn cursor_never_leaves_bounds(ops in prop::collection::vec(0..=1usize, 0..40)) {
            let mut h = Harness::new();
            h.start("dashboard_overview", 0);
            for (i, op) in ops.iter().enumerate() {
                let ms = (i as u64 + 1) * 10;
                match op {
                    0 => h.next(ms),
                    _ => h.previous(ms),
                }
                let index = h.runner.step_index().unwrap();
                prop_assert!(index <= 5);
                prop_assert_eq!(
                    h.store.state().active_tour.as_ref().unwrap().step_index,
                    index
                );
            }
        }
    }
}
