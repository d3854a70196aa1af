#![forbid(unsafe_code)]

//! The pure reducer over the closed action set.
//!
//! `reduce` never mutates its input and never panics. Actions referencing
//! unknown step/tour/highlight ids are dropped with a logged warning and
//! the state is returned unchanged. Idempotence holds at the state level:
//! completing an already-completed step returns an equal state (the
//! dispatcher still notifies observers so the duplicate stays auditable).

use crate::action::Action;
use crate::catalog::Catalog;
use crate::stage::Stage;
use crate::state::{JourneyState, TourProgress, TourRecord};

/// One applied action with the states on either side of it.
///
/// Observers receive a transition for every *accepted* action, including
/// ones that left the state unchanged (duplicate completions stay
/// auditable). Dropped actions (unknown ids) produce no transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub action: Action,
    pub before: JourneyState,
    pub after: JourneyState,
}

impl Transition {
    /// Whether the action actually changed the state.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.before != self.after
    }
}

/// Whether every id the action references is registered (or structurally
/// valid for the current state). Mirrors the drop conditions in
/// [`reduce`]; the dispatcher uses it to decide if observers are told.
#[must_use]
pub fn is_action_accepted(state: &JourneyState, action: &Action, catalog: &Catalog) -> bool {
    match action {
        Action::CompleteStep { id, .. } | Action::SkipStep { id, .. } => {
            catalog.step(id).is_some()
        }
        Action::StartTour { id, .. } => catalog.tour(id).is_some(),
        Action::AdvanceTourStep { index, .. } => state
            .active_tour
            .as_ref()
            .and_then(|a| catalog.tour(&a.tour_id))
            .is_some_and(|t| *index <= t.last_index()),
        Action::EndTour { id, .. } => state
            .active_tour
            .as_ref()
            .is_some_and(|a| a.tour_id == *id),
        Action::DismissHighlight { id, .. } => catalog.highlight(id).is_some(),
        _ => true,
    }
}

/// Fold one action into the state, producing the next state.
#[must_use]
pub fn reduce(state: &JourneyState, action: &Action, catalog: &Catalog) -> JourneyState {
    match action {
        Action::Initialize {
            user_id,
            organization_id,
            registered_at,
            stage,
            completed,
            skipped,
            preferences,
            highlights,
            milestones,
            ..
        } => {
            let mut next = JourneyState {
                user_id: user_id.clone(),
                organization_id: organization_id.clone(),
                initialized: true,
                registered_at: *registered_at,
                stage: *stage,
                preferences: *preferences,
                ..JourneyState::default()
            };
            for (id, at) in completed {
                next.completed_steps.insert(id.clone(), *at);
            }
            for (id, at) in skipped {
                // The disjointness invariant wins over bad server data.
                if !next.completed_steps.contains_key(id) {
                    next.skipped_steps.insert(id.clone(), *at);
                }
            }
            next.metrics.steps_completed = next.completed_steps.len() as u32;
            if let Some(at) = next.completed_steps.get(crate::catalog::STEP_FIRST_CONTENT) {
                next.metrics.time_to_first_content_ms = Some(at.saturating_sub(*registered_at));
            }
            next.active_highlights = known_highlights(catalog, highlights);
            for (id, achieved_at) in milestones {
                next.milestones.insert(id.clone(), *achieved_at);
            }
            next
        }

        Action::CompleteStep { id, at } => {
            if catalog.step(id).is_none() {
                tracing::warn!(step = %id, "dropping complete-step for unknown step");
                return state.clone();
            }
            if state.is_completed(id) {
                return state.clone();
            }
            let mut next = state.clone();
            next.skipped_steps.remove(id);
            next.completed_steps.insert(id.clone(), *at);
            next.metrics.steps_completed = next.completed_steps.len() as u32;
            if id == crate::catalog::STEP_FIRST_CONTENT
                && next.metrics.time_to_first_content_ms.is_none()
            {
                next.metrics.time_to_first_content_ms =
                    Some(at.saturating_sub(state.registered_at));
            }
            next
        }

        Action::SkipStep { id, .. } => {
            if catalog.step(id).is_none() {
                tracing::warn!(step = %id, "dropping skip-step for unknown step");
                return state.clone();
            }
            // Completion is stronger than a skip; a completed step stays
            // completed.
            if state.is_completed(id) || state.is_skipped(id) {
                return state.clone();
            }
            let mut next = state.clone();
            next.skipped_steps.insert(id.clone(), action.at());
            next
        }

        Action::StartTour { id, at } => {
            if catalog.tour(id).is_none() {
                tracing::warn!(tour = %id, "dropping start-tour for unknown tour");
                return state.clone();
            }
            if let Some(active) = &state.active_tour {
                // The runner force-skips before starting a new tour; if an
                // active entry is still present this is a stale dispatch.
                tracing::warn!(active = %active.tour_id, starting = %id, "starting tour over an active one");
            }
            let mut next = state.clone();
            next.active_tour = Some(TourProgress {
                tour_id: id.clone(),
                step_index: 0,
                started_at: *at,
            });
            next
        }

        Action::AdvanceTourStep { index, .. } => {
            let Some(active) = &state.active_tour else {
                tracing::warn!("dropping advance-tour-step with no active tour");
                return state.clone();
            };
            let Some(tour) = catalog.tour(&active.tour_id) else {
                tracing::warn!(tour = %active.tour_id, "dropping advance for unregistered tour");
                return state.clone();
            };
            if *index > tour.last_index() {
                tracing::warn!(tour = %active.tour_id, index, "dropping out-of-range tour step index");
                return state.clone();
            }
            let mut next = state.clone();
            if let Some(active) = &mut next.active_tour {
                active.step_index = *index;
            }
            next
        }

        Action::EndTour { id, outcome, at } => {
            match &state.active_tour {
                Some(active) if active.tour_id == *id => {}
                _ => {
                    tracing::warn!(tour = %id, "dropping end-tour for tour that is not active");
                    return state.clone();
                }
            }
            let mut next = state.clone();
            next.active_tour = None;
            next.tour_history.push(TourRecord {
                tour_id: id.clone(),
                outcome: *outcome,
                at: *at,
            });
            if *outcome == crate::state::TourOutcome::Completed {
                next.metrics.tours_completed += 1;
            }
            next
        }

        Action::SetHighlights { ids, .. } => {
            let mut next = state.clone();
            next.active_highlights = known_highlights(catalog, ids);
            next
        }

        Action::DismissHighlight { id, .. } => {
            if catalog.highlight(id).is_none() {
                tracing::warn!(highlight = %id, "dropping dismiss for unknown highlight");
                return state.clone();
            }
            if state.dismissed_highlights.contains(id) {
                return state.clone();
            }
            let mut next = state.clone();
            next.dismissed_highlights.insert(id.clone());
            next.active_highlights.retain(|h| h != id);
            next
        }

        Action::DiscoverFeature { id, .. } => {
            if state.discovered_features.contains(id) {
                return state.clone();
            }
            let mut next = state.clone();
            next.discovered_features.insert(id.clone());
            next.metrics.features_used = next.discovered_features.len() as u32;
            next
        }

        Action::UpdatePreferences { patch, .. } => {
            let mut next = state.clone();
            next.preferences = next.preferences.apply(*patch);
            next
        }

        Action::AchieveMilestone { id, at } => {
            let mut next = state.clone();
            match next.milestones.get(id) {
                Some(Some(_)) => return state.clone(),
                _ => {
                    next.milestones.insert(id.clone(), Some(*at));
                }
            }
            next
        }

        Action::ResetJourney { .. } => JourneyState {
            user_id: state.user_id.clone(),
            organization_id: state.organization_id.clone(),
            initialized: true,
            // Registration time is identity, not progress.
            registered_at: state.registered_at,
            stage: Stage::Registration,
            ..JourneyState::default()
        },
    }
}

/// Filter a highlight id list down to registered ones, warning per drop.
fn known_highlights(catalog: &Catalog, ids: &[String]) -> Vec<String> {
    ids.iter()
        .filter(|id| {
            let known = catalog.highlight(id).is_some();
            if !known {
                tracing::warn!(highlight = %id, "dropping unknown highlight id");
            }
            known
        })
        .cloned()
        .collect()
}
