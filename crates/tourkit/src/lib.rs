#![forbid(unsafe_code)]

//! Onboarding and guided-tour orchestration engine.
//!
//! `tourkit` tracks a user's progression through a multi-stage journey,
//! runs interactive product tours that visually track page elements,
//! gates feature visibility by unlock rules, and records a durable,
//! ordered analytics trail with best-effort remote delivery.
//!
//! The engine is a library for a host UI: it owns no rendering, no
//! network protocol, and no event loop. The host implements the
//! [`DomAdapter`] capability over its page, a [`JourneyService`] over
//! its API, and an [`AnalyticsSink`] over its delivery channel, then
//! drives [`TourEngine`] from its callbacks and timers.
//!
//! ```no_run
//! use std::rc::Rc;
//! use std::time::Instant;
//!
//! use tourkit::analytics::MemorySink;
//! use tourkit::{EngineConfig, FeatureGate, Size, TourEngine};
//! use tourkit::runtime::MemoryService;
//! use tourkit_core::dom::FakeDom;
//! use tourkit_core::storage::MemoryStorage;
//!
//! let mut service = MemoryService::new();
//! let mut engine = TourEngine::initialize(
//!     FakeDom::new(Size::new(1280.0, 720.0)),
//!     Rc::new(MemoryStorage::new()),
//!     MemorySink::new(),
//!     FeatureGate::default(),
//!     EngineConfig::default(),
//!     &mut service,
//!     "user-1",
//!     0,
//! )?;
//! engine.start_tour(&mut service, "dashboard_overview", Instant::now(), 0);
//! # Ok::<(), tourkit::runtime::ServiceError>(())
//! ```

pub use tourkit_analytics as analytics;
pub use tourkit_core;
pub use tourkit_journey as journey;
pub use tourkit_runtime as runtime;

use std::fmt;

use journey::catalog::CatalogError;
use runtime::ServiceError;

pub use analytics::{AnalyticsEvent, AnalyticsSink, EventKind, SessionIdentity, SinkError};
pub use journey::action::Action;
pub use journey::gate::{FeatureGate, FeatureRule, GateDecision, LockReason};
pub use journey::stage::{PlanTier, Stage};
pub use journey::state::JourneyState;
pub use runtime::{EngineConfig, JourneyService, StepView, TourEngine, TourPhase};
pub use tourkit_core::dom::DomAdapter;
pub use tourkit_core::geometry::{Placement, Rect, ResolvedPosition, Size, resolve_placement};
pub use tourkit_core::storage::{StorageBackend, StorageError};

/// Any failure the engine can surface across its public contract.
///
/// Most failures degrade internally (logged warnings, defaults); the
/// ones that do surface are wrapped here for hosts that want a single
/// error type.
#[derive(Debug)]
pub enum Error {
    Catalog(CatalogError),
    Storage(StorageError),
    Service(ServiceError),
    Sink(SinkError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Catalog(e) => write!(f, "catalog: {e}"),
            Error::Storage(e) => write!(f, "storage: {e}"),
            Error::Service(e) => write!(f, "service: {e}"),
            Error::Sink(e) => write!(f, "analytics sink: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Catalog(e) => Some(e),
            Error::Storage(e) => Some(e),
            Error::Service(e) => Some(e),
            Error::Sink(e) => Some(e),
        }
    }
}

impl From<CatalogError> for Error {
    fn from(e: CatalogError) -> Self {
        Error::Catalog(e)
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Error::Storage(e)
    }
}

impl From<ServiceError> for Error {
    fn from(e: ServiceError) -> Self {
        Error::Service(e)
    }
}

impl From<SinkError> for Error {
    fn from(e: SinkError) -> Self {
        Error::Sink(e)
    }
}
