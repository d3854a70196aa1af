#![forbid(unsafe_code)]

//! The analytics event model.
//!
//! Events are immutable records: once built they are only ever marked
//! delivered (by removal from the backlog) or retried. Event ids are
//! `{session_id}-{seq}` so the remote boundary can deduplicate retried
//! deliveries.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tourkit_journey::TimestampMs;

/// Closed set of event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    JourneyInitialized,
    StepCompleted,
    StepSkipped,
    TourStarted,
    TourStepViewed,
    TourCompleted,
    TourSkipped,
    HighlightDismissed,
    FeatureDiscovered,
    PreferencesUpdated,
    MilestoneAchieved,
    JourneyReset,
}

impl EventKind {
    /// Stable wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            EventKind::JourneyInitialized => "journey_initialized",
            EventKind::StepCompleted => "step_completed",
            EventKind::StepSkipped => "step_skipped",
            EventKind::TourStarted => "tour_started",
            EventKind::TourStepViewed => "tour_step_viewed",
            EventKind::TourCompleted => "tour_completed",
            EventKind::TourSkipped => "tour_skipped",
            EventKind::HighlightDismissed => "highlight_dismissed",
            EventKind::FeatureDiscovered => "feature_discovered",
            EventKind::PreferencesUpdated => "preferences_updated",
            EventKind::MilestoneAchieved => "milestone_achieved",
            EventKind::JourneyReset => "journey_reset",
        }
    }
}

/// Who this engine session belongs to. Persisted so a reload keeps the
/// same session id (and therefore stable event ids).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub session_id: String,
    pub user_id: String,
    pub organization_id: String,
}

/// Device and referrer metadata captured once per session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceContext {
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub referrer: Option<String>,
    /// Viewport size in pixels at session start.
    #[serde(default)]
    pub viewport: Option<(u32, u32)>,
}

/// An immutable analytics record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    /// Idempotency key: `{session_id}-{seq}`.
    pub id: String,
    /// Per-session sequence number; strictly increasing, never reused.
    pub seq: u64,
    pub kind: EventKind,
    pub user_id: String,
    pub organization_id: String,
    pub session_id: String,
    pub at: TimestampMs,
    /// Free-form property bag.
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub context: DeviceContext,
}

impl AnalyticsEvent {
    /// Build an event for a session with the given sequence number.
    #[must_use]
    pub fn new(
        session: &SessionIdentity,
        seq: u64,
        kind: EventKind,
        at: TimestampMs,
        properties: Map<String, Value>,
        context: DeviceContext,
    ) -> Self {
        Self {
            id: format!("{}-{}", session.session_id, seq),
            seq,
            kind,
            user_id: session.user_id.clone(),
            organization_id: session.organization_id.clone(),
            session_id: session.session_id.clone(),
            at,
            properties,
            context,
        }
    }
}
