#![forbid(unsafe_code)]

//! The closed action vocabulary.
//!
//! Every mutation of [`crate::state::JourneyState`] is one of these.
//! Actions carry their own `at` timestamp so the reducer stays a pure
//! function; the dispatcher stamps them at creation time.

use serde::{Deserialize, Serialize};

use crate::stage::Stage;
use crate::state::{PreferencePatch, Preferences, TourOutcome};
use crate::{FeatureId, HighlightId, MilestoneId, StepId, TimestampMs, TourId};

/// A journey state transition request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Action {
    /// Seed the state from a journey snapshot fetched from the service.
    Initialize {
        user_id: String,
        organization_id: String,
        registered_at: TimestampMs,
        stage: Stage,
        completed: Vec<(StepId, TimestampMs)>,
        skipped: Vec<(StepId, TimestampMs)>,
        preferences: Preferences,
        highlights: Vec<HighlightId>,
        milestones: Vec<(MilestoneId, Option<TimestampMs>)>,
        at: TimestampMs,
    },
    /// Mark a checklist step completed.
    CompleteStep { id: StepId, at: TimestampMs },
    /// Mark a checklist step skipped.
    SkipStep {
        id: StepId,
        reason: Option<String>,
        at: TimestampMs,
    },
    /// Begin a tour at step 0.
    StartTour { id: TourId, at: TimestampMs },
    /// Move the active tour's cursor.
    AdvanceTourStep { index: usize, at: TimestampMs },
    /// Finish the active tour.
    EndTour {
        id: TourId,
        outcome: TourOutcome,
        at: TimestampMs,
    },
    /// Replace the set of currently eligible highlights.
    SetHighlights {
        ids: Vec<HighlightId>,
        at: TimestampMs,
    },
    /// Permanently dismiss a highlight.
    DismissHighlight { id: HighlightId, at: TimestampMs },
    /// Record that the user used a gated feature for the first time.
    DiscoverFeature { id: FeatureId, at: TimestampMs },
    /// Apply a preferences patch.
    UpdatePreferences {
        patch: PreferencePatch,
        at: TimestampMs,
    },
    /// Mark a milestone achieved.
    AchieveMilestone { id: MilestoneId, at: TimestampMs },
    /// Explicitly reset the journey to its initial state.
    ResetJourney { at: TimestampMs },
}

impl Action {
    /// The timestamp the action was created at.
    #[must_use]
    pub const fn at(&self) -> TimestampMs {
        match self {
            Action::Initialize { at, .. }
            | Action::CompleteStep { at, .. }
            | Action::SkipStep { at, .. }
            | Action::StartTour { at, .. }
            | Action::AdvanceTourStep { at, .. }
            | Action::EndTour { at, .. }
            | Action::SetHighlights { at, .. }
            | Action::DismissHighlight { at, .. }
            | Action::DiscoverFeature { at, .. }
            | Action::UpdatePreferences { at, .. }
            | Action::AchieveMilestone { at, .. }
            | Action::ResetJourney { at } => *at,
        }
    }

    /// Stable name used in logs and analytics properties.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Action::Initialize { .. } => "initialize",
            Action::CompleteStep { .. } => "complete_step",
            Action::SkipStep { .. } => "skip_step",
            Action::StartTour { .. } => "start_tour",
            Action::AdvanceTourStep { .. } => "advance_tour_step",
            Action::EndTour { .. } => "end_tour",
            Action::SetHighlights { .. } => "set_highlights",
            Action::DismissHighlight { .. } => "dismiss_highlight",
            Action::DiscoverFeature { .. } => "discover_feature",
            Action::UpdatePreferences { .. } => "update_preferences",
            Action::AchieveMilestone { .. } => "achieve_milestone",
            Action::ResetJourney { .. } => "reset_journey",
        }
    }
}
