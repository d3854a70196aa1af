#![forbid(unsafe_code)]

//! Orchestration runtime.
//!
//! Everything impure lives here: the dispatching store with its observer
//! list, the tour runner state machine (keyboard, deadlines, pause and
//! resume, wait-for-element), the target watcher, the remote journey
//! service boundary, session identity, and the [`engine::TourEngine`]
//! facade that wires it all together.
//!
//! The runtime is single-threaded and event-driven. No call blocks; time
//! enters exclusively through explicit `now: Instant` parameters and the
//! host drives deadlines by calling `tick` and scheduling a wake-up for
//! `next_deadline`.

pub mod engine;
pub mod runner;
pub mod service;
pub mod session;
pub mod store;
pub mod task;
pub mod watcher;

pub use engine::{EngineConfig, TourEngine};
pub use runner::{RunnerCtx, StepView, TourPhase, TourRunner};
pub use service::{FetchedJourney, JourneyService, MemoryService, ServiceError};
pub use session::load_or_create_session;
pub use store::{JourneyStore, StoreObserver};
pub use task::{TaskKind, TaskSet};
pub use watcher::{WatchHandle, WatchStatus, watch};
