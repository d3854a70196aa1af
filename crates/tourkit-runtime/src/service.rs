#![forbid(unsafe_code)]

//! The remote journey service boundary.
//!
//! The backing API is an external collaborator; the engine only ever
//! talks to this trait. Writes are fire-and-confirm: local state is the
//! source of truth, a failed remote write is logged and never rolls a
//! local transition back.

use std::collections::BTreeMap;
use std::fmt;

use tourkit_journey::catalog::{HighlightDef, Milestone, StepDef, TourDef};
use tourkit_journey::stage::Stage;
use tourkit_journey::state::{PreferencePatch, Preferences};
use tourkit_journey::{HighlightId, StepId, TimestampMs, TourId};

/// Failures at the service boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Transport-level failure (offline, timeout).
    Unavailable(String),
    /// The requested entity does not exist remotely.
    NotFound(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::Unavailable(msg) => write!(f, "journey service unavailable: {msg}"),
            ServiceError::NotFound(what) => write!(f, "not found: {what}"),
        }
    }
}

impl std::error::Error for ServiceError {}

/// Everything the service returns for one user's journey.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FetchedJourney {
    pub user_id: String,
    pub organization_id: String,
    /// Account registration time; anchors time-to-value metrics.
    pub registered_at: TimestampMs,
    pub stage: Stage,
    pub completed: Vec<(StepId, TimestampMs)>,
    pub skipped: Vec<(StepId, TimestampMs)>,
    pub preferences: Preferences,
    /// Static step definitions for the checklist catalog.
    pub steps: Vec<StepDef>,
    /// Highlight definitions plus the currently eligible ids.
    pub highlights: Vec<HighlightDef>,
    pub active_highlights: Vec<HighlightId>,
    pub milestones: Vec<Milestone>,
}

/// Remote journey operations the engine consumes.
pub trait JourneyService {
    /// Fetch the journey snapshot, catalog definitions included.
    fn fetch_journey(&mut self, user_id: &str) -> Result<FetchedJourney, ServiceError>;

    /// Look up a tour definition.
    fn fetch_tour(&mut self, tour_id: &str) -> Result<TourDef, ServiceError>;

    /// Confirm a step completion remotely.
    fn complete_step(&mut self, step_id: &str) -> Result<(), ServiceError>;

    /// Confirm a step skip remotely.
    fn skip_step(&mut self, step_id: &str, reason: Option<&str>) -> Result<(), ServiceError>;

    /// Confirm a preferences change remotely.
    fn update_preferences(&mut self, patch: PreferencePatch) -> Result<(), ServiceError>;
}

/// In-memory service double for tests and offline development.
///
/// Records every write so tests can assert what was confirmed, and
/// injects failures on demand.
#[derive(Debug, Default)]
pub struct MemoryService {
    pub journeys: BTreeMap<String, FetchedJourney>,
    pub tours: BTreeMap<TourId, TourDef>,
    pub completed_writes: Vec<StepId>,
    pub skipped_writes: Vec<(StepId, Option<String>)>,
    pub preference_writes: Vec<PreferencePatch>,
    failing: bool,
}

impl MemoryService {
    /// An empty service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a journey snapshot.
    pub fn put_journey(&mut self, journey: FetchedJourney) {
        self.journeys.insert(journey.user_id.clone(), journey);
    }

    /// Seed a tour definition.
    pub fn put_tour(&mut self, tour: TourDef) {
        self.tours.insert(tour.id.clone(), tour);
    }

    /// Make subsequent calls fail (or succeed again).
    pub fn set_failing(&mut self, failing: bool) {
        self.failing = failing;
    }

    fn check(&self) -> Result<(), ServiceError> {
        if self.failing {
            Err(ServiceError::Unavailable("injected failure".into()))
        } else {
            Ok(())
        }
    }
}

impl JourneyService for MemoryService {
    fn fetch_journey(&mut self, user_id: &str) -> Result<FetchedJourney, ServiceError> {
        self.check()?;
        self.journeys
            .get(user_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("journey for {user_id}")))
    }

    fn fetch_tour(&mut self, tour_id: &str) -> Result<TourDef, ServiceError> {
        self.check()?;
        self.tours
            .get(tour_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("tour {tour_id}")))
    }

    fn complete_step(&mut self, step_id: &str) -> Result<(), ServiceError> {
        self.check()?;
        self.completed_writes.push(step_id.to_string());
        Ok(())
    }

    fn skip_step(&mut self, step_id: &str, reason: Option<&str>) -> Result<(), ServiceError> {
        self.check()?;
        self.skipped_writes
            .push((step_id.to_string(), reason.map(str::to_string)));
        Ok(())
    }

    fn update_preferences(&mut self, patch: PreferencePatch) -> Result<(), ServiceError> {
        self.check()?;
        self.preference_writes.push(patch);
        Ok(())
    }
}
