#![forbid(unsafe_code)]

//! The remote delivery boundary.
//!
//! The sink is expected to be idempotent per event id; the recorder may
//! deliver the same event more than once across retries and the boundary
//! system deduplicates. No partial-success bookkeeping: a batch either
//! lands or it does not.

use std::fmt;

use crate::event::AnalyticsEvent;

/// Delivery failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// Transport-level failure (offline, timeout).
    Unavailable(String),
    /// The boundary refused the payload.
    Rejected(String),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Unavailable(msg) => write!(f, "sink unavailable: {msg}"),
            SinkError::Rejected(msg) => write!(f, "sink rejected events: {msg}"),
        }
    }
}

impl std::error::Error for SinkError {}

/// Remote analytics delivery.
pub trait AnalyticsSink {
    /// Deliver one event.
    fn send(&mut self, event: &AnalyticsEvent) -> Result<(), SinkError>;

    /// Deliver a batch, all-or-nothing from the caller's point of view.
    fn send_batch(&mut self, events: &[AnalyticsEvent]) -> Result<(), SinkError>;
}

/// In-memory sink with failure injection, for tests and offline hosts.
#[derive(Debug, Default)]
pub struct MemorySink {
    /// Everything successfully delivered, in delivery order.
    pub delivered: Vec<AnalyticsEvent>,
    failing: bool,
}

impl MemorySink {
    /// Create a healthy sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent deliveries fail (or succeed again).
    pub fn set_failing(&mut self, failing: bool) {
        self.failing = failing;
    }

    /// Ids of delivered events, in order.
    #[must_use]
    pub fn delivered_ids(&self) -> Vec<&str> {
        self.delivered.iter().map(|e| e.id.as_str()).collect()
    }
}

impl AnalyticsSink for MemorySink {
    fn send(&mut self, event: &AnalyticsEvent) -> Result<(), SinkError> {
        if self.failing {
            return Err(SinkError::Unavailable("injected failure".into()));
        }
        self.delivered.push(event.clone());
        Ok(())
    }

    fn send_batch(&mut self, events: &[AnalyticsEvent]) -> Result<(), SinkError> {
        if self.failing {
            return Err(SinkError::Unavailable("injected failure".into()));
        }
        self.delivered.extend(events.iter().cloned());
        Ok(())
    }
}
