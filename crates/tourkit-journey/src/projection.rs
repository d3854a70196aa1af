#![forbid(unsafe_code)]

//! Computed projections over the journey state.
//!
//! These are deterministic pure functions recomputed on every state
//! change; nothing here is separately mutated or cached.

use std::collections::BTreeSet;

use crate::TimestampMs;
use crate::catalog::{Catalog, HighlightDef, ShowCondition, StepCategory, StepDef};
use crate::state::JourneyState;

/// Maximum number of suggestions surfaced by [`next_steps`].
pub const NEXT_STEPS_CAP: usize = 3;

/// Fraction of essential steps completed, in `[0.0, 1.0]`.
///
/// Returns `0.0` when the catalog has no essential steps.
#[must_use]
pub fn overall_progress(state: &JourneyState, catalog: &Catalog) -> f64 {
    let essential: Vec<_> = catalog
        .steps_in_order()
        .into_iter()
        .filter(|s| s.category == StepCategory::Essential)
        .collect();
    if essential.is_empty() {
        return 0.0;
    }
    let done = essential
        .iter()
        .filter(|s| state.is_completed(&s.id))
        .count();
    done as f64 / essential.len() as f64
}

/// Whether every dependency of a step is completed.
#[must_use]
pub fn is_step_available(state: &JourneyState, step: &StepDef) -> bool {
    step.dependencies.iter().all(|dep| state.is_completed(dep))
}

/// The next steps to suggest: incomplete, not skipped, dependency
/// satisfied, sorted by order, capped to [`NEXT_STEPS_CAP`].
#[must_use]
pub fn next_steps<'a>(state: &JourneyState, catalog: &'a Catalog) -> Vec<&'a StepDef> {
    catalog
        .steps_in_order()
        .into_iter()
        .filter(|s| !state.is_completed(&s.id))
        .filter(|s| !state.is_skipped(&s.id))
        .filter(|s| is_step_available(state, s))
        .take(NEXT_STEPS_CAP)
        .collect()
}

/// Whether every show-condition holds: stage and usage come from the
/// state, feature flags from the host-supplied set. A condition naming
/// an unknown metric never holds.
#[must_use]
pub fn conditions_met(
    state: &JourneyState,
    conditions: &[ShowCondition],
    feature_flags: &BTreeSet<String>,
) -> bool {
    conditions.iter().all(|c| match c {
        ShowCondition::StageReached { stage } => state.stage >= *stage,
        ShowCondition::FeatureFlag { name } => feature_flags.contains(name),
        ShowCondition::UsageAtLeast { metric, count } => {
            state.metrics.value(metric).is_some_and(|v| v >= *count)
        }
    })
}

/// Active highlights the user has not dismissed, whose show-conditions
/// all hold, and that have not expired, sorted by descending priority
/// (id as tiebreak).
#[must_use]
pub fn unviewed_highlights<'a>(
    state: &JourneyState,
    catalog: &'a Catalog,
    feature_flags: &BTreeSet<String>,
    now: TimestampMs,
) -> Vec<&'a HighlightDef> {
    let mut highlights: Vec<&HighlightDef> = state
        .active_highlights
        .iter()
        .filter(|id| !state.dismissed_highlights.contains(*id))
        .filter_map(|id| catalog.highlight(id))
        .filter(|h| conditions_met(state, &h.conditions, feature_flags))
        .filter(|h| h.expires_at.is_none_or(|exp| exp > now))
        .collect();
    highlights.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.id.cmp(&b.id))
    });
    highlights
}
