#![forbid(unsafe_code)]

//! The analytics recorder: transitions in, durable ordered events out.
//!
//! # Delivery model
//!
//! `record` appends to the local backlog, persists it, then attempts
//! immediate delivery; success removes the event from the backlog,
//! failure leaves it for retry. `sync_stored_events` batches the whole
//! backlog: all-or-nothing, no partial bookkeeping (the boundary is
//! idempotent per event id). Local order is never reshuffled, whatever
//! order deliveries land in remotely.
//!
//! # Division of labor
//!
//! [`AnalyticsRecorder::observe_transition`] covers store-level events
//! (steps, highlights, features, preferences, lifecycle). Tour events
//! carry timing measured by the runner, so the runner records those
//! itself via [`AnalyticsRecorder::record`]; the observer deliberately
//! skips tour actions to avoid double-emitting.

use std::collections::VecDeque;
use std::rc::Rc;

use serde_json::{Map, Value};
use tourkit_core::storage::{KEY_EVENT_BACKLOG, StorageBackend, load_json, store_json};
use tourkit_journey::TimestampMs;
use tourkit_journey::action::Action;
use tourkit_journey::reducer::Transition;

use crate::event::{AnalyticsEvent, DeviceContext, EventKind, SessionIdentity};
use crate::sink::{AnalyticsSink, SinkError};

/// Recorder tuning.
#[derive(Debug, Clone, Copy)]
pub struct RecorderConfig {
    /// Backlog is bounded to this many events; the oldest are evicted.
    pub backlog_cap: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self { backlog_cap: 100 }
    }
}

/// Converts journey transitions into a durable, ordered event log and
/// pushes it to a remote sink, best-effort.
pub struct AnalyticsRecorder<S> {
    storage: Rc<dyn StorageBackend>,
    sink: S,
    session: SessionIdentity,
    context: DeviceContext,
    backlog: VecDeque<AnalyticsEvent>,
    next_seq: u64,
    cap: usize,
}

impl<S: AnalyticsSink> AnalyticsRecorder<S> {
    /// Create a recorder, restoring any persisted backlog.
    ///
    /// Sequence numbering continues after the restored backlog so event
    /// ids stay unique across reloads of the same session.
    #[must_use]
    pub fn new(
        storage: Rc<dyn StorageBackend>,
        sink: S,
        session: SessionIdentity,
        context: DeviceContext,
        config: RecorderConfig,
    ) -> Self {
        let restored: Vec<AnalyticsEvent> = load_json(storage.as_ref(), KEY_EVENT_BACKLOG);
        let next_seq = restored.iter().map(|e| e.seq).max().map_or(1, |s| s + 1);
        tracing::debug!(
            restored = restored.len(),
            next_seq,
            "analytics recorder initialized"
        );
        Self {
            storage,
            sink,
            session,
            context,
            backlog: restored.into(),
            next_seq,
            cap: config.backlog_cap.max(1),
        }
    }

    /// Record an event and attempt immediate delivery.
    ///
    /// The event is durable (in the persisted backlog) before delivery is
    /// attempted; a delivery failure downgrades to a retry, never a loss.
    pub fn record(&mut self, kind: EventKind, properties: Map<String, Value>, at: TimestampMs) {
        let seq = self.next_seq;
        self.next_seq += 1;
        let event = AnalyticsEvent::new(
            &self.session,
            seq,
            kind,
            at,
            properties,
            self.context.clone(),
        );
        tracing::trace!(id = %event.id, kind = kind.as_str(), "recording analytics event");

        self.backlog.push_back(event.clone());
        while self.backlog.len() > self.cap {
            if let Some(evicted) = self.backlog.pop_front() {
                tracing::warn!(id = %evicted.id, "backlog cap reached, evicting oldest event");
            }
        }
        self.persist_backlog();

        // The event just pushed is last; deliver and acknowledge it.
        match self.sink.send(&event) {
            Ok(()) => {
                self.backlog.pop_back();
                self.persist_backlog();
            }
            Err(e) => {
                tracing::warn!(error = %e, "event delivery failed, retained for retry");
            }
        }
    }

    /// Derive and record events for a store transition.
    pub fn observe_transition(&mut self, transition: &Transition) {
        let at = transition.action.at();
        let Some((kind, properties)) = event_for_action(transition) else {
            return;
        };
        self.record(kind, properties, at);
    }

    /// Batch-deliver everything not yet acknowledged.
    ///
    /// On success the backlog is cleared; on failure it is left intact
    /// for a later retry. Returns the number of events delivered.
    pub fn sync_stored_events(&mut self) -> Result<usize, SinkError> {
        if self.backlog.is_empty() {
            return Ok(0);
        }
        let pending: Vec<AnalyticsEvent> = self.backlog.iter().cloned().collect();
        match self.sink.send_batch(&pending) {
            Ok(()) => {
                let count = pending.len();
                self.backlog.clear();
                self.persist_backlog();
                tracing::debug!(count, "synced stored analytics events");
                Ok(count)
            }
            Err(e) => {
                tracing::warn!(error = %e, pending = pending.len(), "sync failed, backlog retained");
                Err(e)
            }
        }
    }

    /// Events awaiting delivery, oldest first.
    #[must_use]
    pub fn pending(&self) -> impl Iterator<Item = &AnalyticsEvent> {
        self.backlog.iter()
    }

    /// Number of events awaiting delivery.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.backlog.len()
    }

    /// The delivery sink (tests inspect it).
    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Mutable access to the delivery sink.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    fn persist_backlog(&self) {
        let pending: Vec<&AnalyticsEvent> = self.backlog.iter().collect();
        if let Err(e) = store_json(self.storage.as_ref(), KEY_EVENT_BACKLOG, &pending) {
            // The in-memory log remains authoritative for this session.
            tracing::warn!(error = %e, "failed to persist analytics backlog");
        }
    }
}

/// Map a store action to an event kind and property bag.
///
/// Tour actions return `None`: the runner records those with timing
/// properties the store cannot know.
fn event_for_action(transition: &Transition) -> Option<(EventKind, Map<String, Value>)> {
    let mut props = Map::new();
    let kind = match &transition.action {
        Action::Initialize { stage, .. } => {
            props.insert("stage".into(), Value::String(stage.as_str().into()));
            EventKind::JourneyInitialized
        }
        Action::CompleteStep { id, .. } => {
            props.insert("step_id".into(), Value::String(id.clone()));
            // Duplicate completions still emit, flagged for audit.
            if !transition.changed() {
                props.insert("already_completed".into(), Value::Bool(true));
            }
            EventKind::StepCompleted
        }
        Action::SkipStep { id, reason, .. } => {
            props.insert("step_id".into(), Value::String(id.clone()));
            if let Some(reason) = reason {
                props.insert("reason".into(), Value::String(reason.clone()));
            }
            EventKind::StepSkipped
        }
        Action::DismissHighlight { id, .. } => {
            props.insert("highlight_id".into(), Value::String(id.clone()));
            EventKind::HighlightDismissed
        }
        Action::DiscoverFeature { id, .. } => {
            props.insert("feature_id".into(), Value::String(id.clone()));
            EventKind::FeatureDiscovered
        }
        Action::UpdatePreferences { patch, .. } => {
            if let Some(v) = patch.tours_enabled {
                props.insert("tours_enabled".into(), Value::Bool(v));
            }
            if let Some(v) = patch.tooltips_enabled {
                props.insert("tooltips_enabled".into(), Value::Bool(v));
            }
            if let Some(v) = patch.email_tips_enabled {
                props.insert("email_tips_enabled".into(), Value::Bool(v));
            }
            EventKind::PreferencesUpdated
        }
        Action::AchieveMilestone { id, .. } => {
            props.insert("milestone_id".into(), Value::String(id.clone()));
            EventKind::MilestoneAchieved
        }
        Action::ResetJourney { .. } => EventKind::JourneyReset,
        Action::StartTour { .. }
        | Action::AdvanceTourStep { .. }
        | Action::EndTour { .. }
        | Action::SetHighlights { .. } => return None,
    };
    Some((kind, props))
}
