#![forbid(unsafe_code)]

//! Feature unlock gating.
//!
//! [`FeatureGate::evaluate`] is a pure function of `(rule table, journey
//! state, plan tier)` with no hidden state, so UI layers can memoize on
//! its inputs safely. Checks run in a fixed order and the first failure
//! short-circuits with the reason:
//!
//! 1. stage requirement (`current >= required`)
//! 2. step dependencies (all required ids completed)
//! 3. plan tier membership

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;

use crate::stage::{PlanTier, Stage};
use crate::state::JourneyState;
use crate::{FeatureId, StepId};

/// Unlock requirements for one feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureRule {
    pub feature: FeatureId,
    /// Journey stage that must be reached, if any.
    pub requires_stage: Option<Stage>,
    /// Steps that must all be completed.
    pub requires_steps: Vec<StepId>,
    /// Plan tiers the feature is available on; `None` means every tier.
    pub allowed_tiers: Option<BTreeSet<PlanTier>>,
}

impl FeatureRule {
    /// A rule with no requirements (always unlocked).
    #[must_use]
    pub fn open(feature: impl Into<FeatureId>) -> Self {
        Self {
            feature: feature.into(),
            requires_stage: None,
            requires_steps: Vec::new(),
            allowed_tiers: None,
        }
    }

    /// Require a journey stage.
    #[must_use]
    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.requires_stage = Some(stage);
        self
    }

    /// Require completed steps.
    #[must_use]
    pub fn with_steps(mut self, steps: impl IntoIterator<Item = impl Into<StepId>>) -> Self {
        self.requires_steps = steps.into_iter().map(Into::into).collect();
        self
    }

    /// Restrict to plan tiers.
    #[must_use]
    pub fn with_tiers(mut self, tiers: impl IntoIterator<Item = PlanTier>) -> Self {
        self.allowed_tiers = Some(tiers.into_iter().collect());
        self
    }
}

/// Why a feature is locked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockReason {
    /// The journey has not reached the required stage.
    StageNotReached { required: Stage, current: Stage },
    /// Required steps are incomplete.
    StepsIncomplete { missing: Vec<StepId> },
    /// The current plan tier does not include the feature.
    PlanNotEligible { current: PlanTier },
}

impl LockReason {
    /// Human-readable unlock hint.
    #[must_use]
    pub fn hint(&self) -> String {
        match self {
            LockReason::StageNotReached { required, .. } => {
                format!("reach the {} stage to unlock this", required.as_str())
            }
            LockReason::StepsIncomplete { missing } => {
                format!("complete {} to unlock this", missing.join(", "))
            }
            LockReason::PlanNotEligible { current } => {
                format!("not included in the {} plan", current.as_str())
            }
        }
    }
}

impl fmt::Display for LockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hint())
    }
}

/// The evaluation result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateDecision {
    pub enabled: bool,
    /// Present iff `enabled` is false.
    pub reason: Option<LockReason>,
}

impl GateDecision {
    const UNLOCKED: GateDecision = GateDecision {
        enabled: true,
        reason: None,
    };

    fn locked(reason: LockReason) -> Self {
        Self {
            enabled: false,
            reason: Some(reason),
        }
    }
}

/// The static rule table.
#[derive(Debug, Default)]
pub struct FeatureGate {
    rules: BTreeMap<FeatureId, FeatureRule>,
}

impl FeatureGate {
    /// Build a gate from a rule list. Later rules for the same feature
    /// replace earlier ones.
    #[must_use]
    pub fn new(rules: impl IntoIterator<Item = FeatureRule>) -> Self {
        Self {
            rules: rules
                .into_iter()
                .map(|r| (r.feature.clone(), r))
                .collect(),
        }
    }

    /// Look up a rule.
    #[must_use]
    pub fn rule(&self, feature: &str) -> Option<&FeatureRule> {
        self.rules.get(feature)
    }

    /// Evaluate whether `feature` is unlocked for this journey and plan.
    ///
    /// A feature without a rule has no gate and is unlocked.
    #[must_use]
    pub fn evaluate(&self, feature: &str, state: &JourneyState, tier: PlanTier) -> GateDecision {
        let Some(rule) = self.rules.get(feature) else {
            return GateDecision::UNLOCKED;
        };

        if let Some(required) = rule.requires_stage
            && state.stage < required
        {
            return GateDecision::locked(LockReason::StageNotReached {
                required,
                current: state.stage,
            });
        }

        let missing: Vec<StepId> = rule
            .requires_steps
            .iter()
            .filter(|id| !state.is_completed(id))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return GateDecision::locked(LockReason::StepsIncomplete { missing });
        }

        if let Some(allowed) = &rule.allowed_tiers
            && !allowed.contains(&tier)
        {
            return GateDecision::locked(LockReason::PlanNotEligible { current: tier });
        }

        GateDecision::UNLOCKED
    }
}
