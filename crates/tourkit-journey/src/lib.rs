#![forbid(unsafe_code)]

//! Journey domain model: stages, catalogs, state, reducer, projections,
//! and the feature gate.
//!
//! Everything in this crate is pure. State changes go through
//! [`reducer::reduce`], a function of `(state, action) -> state`; the
//! projections and the gate are functions of state. Orchestration (timers,
//! keyboard, persistence, remote delivery) lives in `tourkit-runtime`.

pub mod action;
pub mod catalog;
pub mod gate;
pub mod projection;
pub mod reducer;
pub mod stage;
pub mod state;

/// Milliseconds since the Unix epoch. All persisted and analytics-visible
/// times use this; monotonic engine timing uses `std::time::Instant`.
pub type TimestampMs = u64;

/// Identifier of an onboarding checklist step.
pub type StepId = String;
/// Identifier of a guided tour.
pub type TourId = String;
/// Identifier of a feature highlight callout.
pub type HighlightId = String;
/// Identifier of a gated feature.
pub type FeatureId = String;
/// Identifier of a milestone achievement.
pub type MilestoneId = String;
