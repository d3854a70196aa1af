#![forbid(unsafe_code)]

//! The dispatching journey store.
//!
//! Wraps the pure reducer with a catalog, the current state, and an
//! explicit subscriber list. Components receive the store by reference
//! and dispatch actions; nothing mutates the held state in place.
//!
//! # Invariants
//!
//! - Observers are notified for every *accepted* action, including ones
//!   that left the state unchanged (duplicate completions stay auditable).
//! - Actions referencing unknown ids are dropped with a warning and
//!   produce no transition and no notification.

use std::cell::RefCell;
use std::rc::Rc;

use tourkit_journey::action::Action;
use tourkit_journey::catalog::{
    Catalog, CatalogError, HighlightDef, StepDef, TourDef,
};
use tourkit_journey::reducer::{Transition, is_action_accepted, reduce};
use tourkit_journey::state::JourneyState;

/// Receives every accepted transition, in dispatch order.
pub trait StoreObserver {
    fn on_transition(&mut self, transition: &Transition);
}

/// The single mutable resource of the engine.
pub struct JourneyStore {
    state: JourneyState,
    catalog: Catalog,
    observers: Vec<Rc<RefCell<dyn StoreObserver>>>,
}

impl JourneyStore {
    /// Create a store over a catalog, starting from the default state.
    #[must_use]
    pub fn new(catalog: Catalog) -> Self {
        Self {
            state: JourneyState::default(),
            catalog,
            observers: Vec::new(),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> &JourneyState {
        &self.state
    }

    /// The static definition catalog.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Register a step definition fetched from the service.
    pub fn register_step(&mut self, step: StepDef) -> Result<(), CatalogError> {
        self.catalog.register_step(step)
    }

    /// Register a tour definition fetched from the service.
    pub fn register_tour(&mut self, tour: TourDef) -> Result<(), CatalogError> {
        self.catalog.register_tour(tour)
    }

    /// Register a highlight definition fetched from the service.
    pub fn register_highlight(&mut self, highlight: HighlightDef) -> Result<(), CatalogError> {
        self.catalog.register_highlight(highlight)
    }

    /// Add a transition observer. Observers are notified in subscription
    /// order and stay subscribed for the store's lifetime.
    pub fn subscribe(&mut self, observer: Rc<RefCell<dyn StoreObserver>>) {
        self.observers.push(observer);
    }

    /// Apply an action through the reducer.
    ///
    /// Returns the transition if the action was accepted, `None` if it
    /// was dropped (unknown id, structurally invalid). Accepted actions
    /// are broadcast to observers even when the state did not change.
    pub fn dispatch(&mut self, action: Action) -> Option<Transition> {
        if !is_action_accepted(&self.state, &action, &self.catalog) {
            tracing::warn!(action = action.name(), "dropping action with unknown or invalid target");
            return None;
        }
        let after = reduce(&self.state, &action, &self.catalog);
        let transition = Transition {
            action,
            before: std::mem::replace(&mut self.state, after.clone()),
            after,
        };
        tracing::trace!(
            action = transition.action.name(),
            changed = transition.changed(),
            "dispatched action"
        );
        for observer in &self.observers {
            observer.borrow_mut().on_transition(&transition);
        }
        Some(transition)
    }
}

impl std::fmt::Debug for JourneyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JourneyStore")
            .field("initialized", &self.state.initialized)
            .field("stage", &self.state.stage)
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tourkit_journey::catalog::StepCategory;

    #[derive(Default)]
    struct RecordingObserver {
        seen: Vec<&'static str>,
    }

    impl StoreObserver for RecordingObserver {
        fn on_transition(&mut self, transition: &Transition) {
            self.seen.push(transition.action.name());
        }
    }

    fn store() -> JourneyStore {
        let mut catalog = Catalog::new();
        catalog
            .register_step(StepDef {
                id: "create_workspace".into(),
                title: "Create a workspace".into(),
                description: String::new(),
                category: StepCategory::Essential,
                order: 1,
                dependencies: vec![],
            })
            .unwrap();
        JourneyStore::new(catalog)
    }

    #[test]
    fn dispatch_applies_and_notifies() {
        let mut store = store();
        let observer = Rc::new(RefCell::new(RecordingObserver::default()));
        store.subscribe(observer.clone());

        let t = store
            .dispatch(Action::CompleteStep {
                id: "create_workspace".into(),
                at: 1,
            })
            .unwrap();
        assert!(t.changed());
        assert!(store.state().is_completed("create_workspace"));
        assert_eq!(observer.borrow().seen, vec!["complete_step"]);
    }

    #[test]
    fn duplicate_completion_still_notifies() {
        let mut store = store();
        let observer = Rc::new(RefCell::new(RecordingObserver::default()));
        store.subscribe(observer.clone());

        for at in [1, 2] {
            store
                .dispatch(Action::CompleteStep {
                    id: "create_workspace".into(),
                    at,
                })
                .unwrap();
        }
        assert_eq!(observer.borrow().seen.len(), 2);
        assert_eq!(store.state().completed_steps.get("create_workspace"), Some(&1));
    }

    #[test]
    fn dropped_action_produces_no_transition_or_notification() {
        let mut store = store();
        let observer = Rc::new(RefCell::new(RecordingObserver::default()));
        store.subscribe(observer.clone());

        let t = store.dispatch(Action::CompleteStep {
            id: "ghost".into(),
            at: 1,
        });
        assert!(t.is_none());
        assert!(observer.borrow().seen.is_empty());
    }
}
