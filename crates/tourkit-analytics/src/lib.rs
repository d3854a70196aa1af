#![forbid(unsafe_code)]

//! Analytics: an ordered, timestamped, locally durable event trail with
//! best-effort remote delivery.
//!
//! The recorder observes journey transitions and turns them into
//! [`event::AnalyticsEvent`]s. Events land in a capped local backlog
//! persisted through `tourkit-core`'s storage capability, then delivery
//! to an [`sink::AnalyticsSink`] is attempted. Failed deliveries keep the
//! backlog intact; `sync_stored_events` retries everything. Local order
//! is append-only and never reshuffled by delivery retries.

pub mod event;
pub mod recorder;
pub mod sink;

pub use event::{AnalyticsEvent, DeviceContext, EventKind, SessionIdentity};
pub use recorder::{AnalyticsRecorder, RecorderConfig};
pub use sink::{AnalyticsSink, MemorySink, SinkError};
