#![forbid(unsafe_code)]

//! The journey state: the single source of truth the reducer folds over.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::stage::Stage;
use crate::{FeatureId, HighlightId, MilestoneId, StepId, TimestampMs, TourId};

/// Booleans controlling tour/tooltip/email behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub tours_enabled: bool,
    pub tooltips_enabled: bool,
    pub email_tips_enabled: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            tours_enabled: true,
            tooltips_enabled: true,
            email_tips_enabled: true,
        }
    }
}

/// A partial preferences update; `None` leaves the field unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PreferencePatch {
    pub tours_enabled: Option<bool>,
    pub tooltips_enabled: Option<bool>,
    pub email_tips_enabled: Option<bool>,
}

impl Preferences {
    /// Apply a patch, returning the updated preferences.
    #[must_use]
    pub fn apply(mut self, patch: PreferencePatch) -> Self {
        if let Some(v) = patch.tours_enabled {
            self.tours_enabled = v;
        }
        if let Some(v) = patch.tooltips_enabled {
            self.tooltips_enabled = v;
        }
        if let Some(v) = patch.email_tips_enabled {
            self.email_tips_enabled = v;
        }
        self
    }
}

/// Usage counters maintained by the reducer (and seeded from the service).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JourneyMetrics {
    pub steps_completed: u32,
    pub tours_completed: u32,
    pub features_used: u32,
    /// Time from registration to first generated content, if reached.
    pub time_to_first_content_ms: Option<u64>,
}

impl JourneyMetrics {
    /// Look a counter up by its wire name (usage thresholds and milestone
    /// definitions reference counters this way).
    #[must_use]
    pub fn value(&self, metric: &str) -> Option<u64> {
        match metric {
            "steps_completed" => Some(u64::from(self.steps_completed)),
            "tours_completed" => Some(u64::from(self.tours_completed)),
            "features_used" => Some(u64::from(self.features_used)),
            _ => None,
        }
    }
}

/// How a tour ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TourOutcome {
    Completed,
    Skipped,
}

/// The cursor of the currently active tour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TourProgress {
    pub tour_id: TourId,
    pub step_index: usize,
    pub started_at: TimestampMs,
}

/// A finished tour, kept in history so it is not offered again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TourRecord {
    pub tour_id: TourId,
    pub outcome: TourOutcome,
    pub at: TimestampMs,
}

/// One user's journey through onboarding, anchored to an organization.
///
/// # Invariants
///
/// - A step id appears in at most one of `completed_steps` /
///   `skipped_steps` (completing removes from skipped and vice versa).
/// - `active_tour.step_index` stays within the tour's step range.
/// - `dismissed_highlights` only grows (reset excepted).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JourneyState {
    pub user_id: String,
    pub organization_id: String,
    /// Set once `Initialize` has been applied.
    pub initialized: bool,
    /// When the account was registered; anchors time-to-value metrics.
    pub registered_at: TimestampMs,
    pub stage: Stage,
    /// Completed step ids with completion timestamps.
    pub completed_steps: BTreeMap<StepId, TimestampMs>,
    /// Skipped step ids with skip timestamps.
    pub skipped_steps: BTreeMap<StepId, TimestampMs>,
    pub preferences: Preferences,
    pub metrics: JourneyMetrics,
    pub active_tour: Option<TourProgress>,
    pub tour_history: Vec<TourRecord>,
    /// Highlights currently eligible to show, most recent `SetHighlights`.
    pub active_highlights: Vec<HighlightId>,
    pub dismissed_highlights: BTreeSet<HighlightId>,
    pub discovered_features: BTreeSet<FeatureId>,
    /// Milestone achievement times, keyed by milestone id.
    pub milestones: BTreeMap<MilestoneId, Option<TimestampMs>>,
}

impl JourneyState {
    /// Check whether a step is completed.
    #[must_use]
    pub fn is_completed(&self, step_id: &str) -> bool {
        self.completed_steps.contains_key(step_id)
    }

    /// Check whether a step is skipped.
    #[must_use]
    pub fn is_skipped(&self, step_id: &str) -> bool {
        self.skipped_steps.contains_key(step_id)
    }

    /// Check whether a tour already appears in history.
    #[must_use]
    pub fn has_finished_tour(&self, tour_id: &str) -> bool {
        self.tour_history.iter().any(|r| r.tour_id == tour_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preferences_default_on() {
        let p = Preferences::default();
        assert!(p.tours_enabled && p.tooltips_enabled && p.email_tips_enabled);
    }

    #[test]
    fn patch_only_touches_set_fields() {
        let p = Preferences::default().apply(PreferencePatch {
            email_tips_enabled: Some(false),
            ..PreferencePatch::default()
        });
        assert!(p.tours_enabled);
        assert!(p.tooltips_enabled);
        assert!(!p.email_tips_enabled);
    }

    #[test]
    fn finished_tour_lookup() {
        let mut s = JourneyState::default();
        assert!(!s.has_finished_tour("t"));
        s.tour_history.push(TourRecord {
            tour_id: "t".into(),
            outcome: TourOutcome::Completed,
            at: 1,
        });
        assert!(s.has_finished_tour("t"));
    }
}
