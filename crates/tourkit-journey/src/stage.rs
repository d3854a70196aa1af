#![forbid(unsafe_code)]

//! Journey stages and plan tiers.

use serde::{Deserialize, Serialize};

/// Ordered milestones of the onboarding journey.
///
/// The derived `Ord` follows declaration order; stage requirements compare
/// with `>=` against it. A journey's stage only moves forward (or resets
/// to `Registration` on an explicit journey reset).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Account exists, nothing else.
    #[default]
    Registration,
    /// First workspace created.
    WorkspaceCreated,
    /// First piece of content generated.
    FirstContent,
    /// Content placed on the schedule.
    ContentScheduled,
    /// First competitor tracked.
    CompetitorTracked,
    /// A teammate invited.
    TeamInvited,
    /// Journey finished.
    Completed,
}

impl Stage {
    /// All stages in journey order.
    pub const ALL: [Stage; 7] = [
        Stage::Registration,
        Stage::WorkspaceCreated,
        Stage::FirstContent,
        Stage::ContentScheduled,
        Stage::CompetitorTracked,
        Stage::TeamInvited,
        Stage::Completed,
    ];

    /// Stable identifier used in analytics properties.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Stage::Registration => "registration",
            Stage::WorkspaceCreated => "workspace_created",
            Stage::FirstContent => "first_content",
            Stage::ContentScheduled => "content_scheduled",
            Stage::CompetitorTracked => "competitor_tracked",
            Stage::TeamInvited => "team_invited",
            Stage::Completed => "completed",
        }
    }
}

/// Subscription plan tier, as reported by the backing service.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    #[default]
    Free,
    Starter,
    Growth,
    Enterprise,
}

impl PlanTier {
    /// Stable identifier used in analytics properties and lock hints.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Starter => "starter",
            PlanTier::Growth => "growth",
            PlanTier::Enterprise => "enterprise",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_ordering_follows_journey() {
        assert!(Stage::Registration < Stage::WorkspaceCreated);
        assert!(Stage::FirstContent < Stage::Completed);
        let mut sorted = Stage::ALL;
        sorted.sort();
        assert_eq!(sorted, Stage::ALL);
    }

    #[test]
    fn stage_default_is_registration() {
        assert_eq!(Stage::default(), Stage::Registration);
    }
}
