#![forbid(unsafe_code)]

//! The target watcher: resolve a selector to a live element, waiting for
//! elements that do not exist yet.
//!
//! `watch` probes immediately, then observes mutations through the
//! [`DomAdapter`] capability. The handle resolves exactly once, to
//! `Found` on the first match or `TimedOut` at the deadline, whichever
//! comes first. A timeout is policy, not failure: the caller treats it
//! as permission to proceed.
//!
//! # Invariants
//!
//! - A handle never changes its answer after reaching a terminal status.
//! - Cancelation (explicit or by drop) tears the DOM observation down,
//!   so no callback outlives the step that created the watch.

use std::sync::mpsc;
use std::time::{Duration, Instant};

use tourkit_core::dom::{DomAdapter, ElementHandle, Observation};

/// Where a watch currently stands.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchStatus {
    /// Not resolved yet; keep polling until the deadline.
    Pending,
    /// The selector matched.
    Found(ElementHandle),
    /// The deadline passed without a match.
    TimedOut,
}

impl WatchStatus {
    /// Whether this status is terminal.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !matches!(self, WatchStatus::Pending)
    }
}

/// A single in-flight selector watch.
pub struct WatchHandle {
    selector: String,
    deadline: Instant,
    receiver: mpsc::Receiver<ElementHandle>,
    observation: Option<Observation>,
    resolved: Option<WatchStatus>,
}

/// Start watching for `selector`, resolving within `timeout`.
///
/// Probes the adapter synchronously first, so an already-present element
/// resolves without any observation being registered.
#[must_use]
pub fn watch(
    dom: &dyn DomAdapter,
    selector: &str,
    timeout: Duration,
    now: Instant,
) -> WatchHandle {
    let (sender, receiver) = mpsc::channel();
    if let Some(element) = dom.resolve(selector) {
        tracing::trace!(selector, "watch target already present");
        return WatchHandle {
            selector: selector.to_string(),
            deadline: now + timeout,
            receiver,
            observation: None,
            resolved: Some(WatchStatus::Found(element)),
        };
    }
    let observation = dom.observe(selector, sender);
    tracing::trace!(selector, ?timeout, "watching for target");
    WatchHandle {
        selector: selector.to_string(),
        deadline: now + timeout,
        receiver,
        observation: Some(observation),
        resolved: None,
    }
}

impl WatchHandle {
    /// The selector being watched.
    #[must_use]
    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// Advance the watch and return its status.
    ///
    /// A match delivered before the deadline wins even when both are
    /// observable at the same poll.
    pub fn poll(&mut self, now: Instant) -> WatchStatus {
        if let Some(status) = &self.resolved {
            return status.clone();
        }
        if let Ok(element) = self.receiver.try_recv() {
            tracing::trace!(selector = %self.selector, "watch target appeared");
            return self.resolve(WatchStatus::Found(element));
        }
        if now >= self.deadline {
            tracing::debug!(selector = %self.selector, "watch timed out, proceeding without target");
            return self.resolve(WatchStatus::TimedOut);
        }
        WatchStatus::Pending
    }

    /// The timeout deadline, while still pending.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        if self.resolved.is_some() {
            None
        } else {
            Some(self.deadline)
        }
    }

    /// Whether the watch has reached a terminal status.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }

    /// Tear the observation down without resolving.
    pub fn cancel(&mut self) {
        if let Some(observation) = self.observation.take() {
            observation.cancel();
        }
    }

    fn resolve(&mut self, status: WatchStatus) -> WatchStatus {
        self.cancel();
        self.resolved = Some(status.clone());
        status
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("selector", &self.selector)
            .field("resolved", &self.resolved)
            .finish()
    }
}
