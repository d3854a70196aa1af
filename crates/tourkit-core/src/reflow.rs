#![forbid(unsafe_code)]

//! Reflow coalescing for scroll/resize storms.
//!
//! While a tour step is active its tooltip position must track both the
//! target element and the viewport, so every scroll and resize event
//! requires a placement recompute. Hosts can deliver hundreds of those per
//! second; recomputing each one is wasted work. [`ReflowCoalescer`] folds
//! bursts down to animation-frame granularity with latest-wins semantics.
//!
//! # Invariants
//!
//! - **Latest-wins**: the final event of a burst always produces a
//!   recompute; nothing is dropped, only folded.
//! - **Bounded latency**: a dirty coalescer becomes due within one frame
//!   interval of the marking event.
//! - **Deterministic**: behavior depends only on the `now` values passed
//!   in, never on wall-clock reads.

use std::time::{Duration, Instant};

/// What invalidated the current placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReflowTrigger {
    /// The page scrolled; the target may have moved.
    Scroll,
    /// The viewport resized; clamping bounds changed.
    Resize,
}

/// Folds scroll/resize bursts to frame granularity.
#[derive(Debug)]
pub struct ReflowCoalescer {
    frame_interval: Duration,
    dirty_since: Option<Instant>,
    last_emit: Option<Instant>,
}

impl ReflowCoalescer {
    /// Default frame interval (~60fps).
    pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

    /// Create a coalescer with the default frame interval.
    #[must_use]
    pub fn new() -> Self {
        Self::with_frame_interval(Self::DEFAULT_FRAME_INTERVAL)
    }

    /// Create a coalescer with an explicit frame interval.
    #[must_use]
    pub fn with_frame_interval(frame_interval: Duration) -> Self {
        Self {
            frame_interval,
            dirty_since: None,
            last_emit: None,
        }
    }

    /// Record an invalidating event.
    pub fn mark(&mut self, trigger: ReflowTrigger, now: Instant) {
        tracing::trace!(?trigger, "placement invalidated");
        self.dirty_since.get_or_insert(now);
    }

    /// Check whether a recompute is due, consuming the dirty flag if so.
    ///
    /// A recompute is due when the coalescer is dirty and at least one
    /// frame interval has passed since the last emitted recompute (the
    /// first recompute after idle fires immediately).
    pub fn take_due(&mut self, now: Instant) -> bool {
        if self.dirty_since.is_none() {
            return false;
        }
        if let Some(last) = self.last_emit
            && now.saturating_duration_since(last) < self.frame_interval
        {
            return false;
        }
        self.dirty_since = None;
        self.last_emit = Some(now);
        true
    }

    /// When the pending recompute becomes due, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        let marked = self.dirty_since?;
        match self.last_emit {
            Some(last) => Some(marked.max(last + self.frame_interval)),
            None => Some(marked),
        }
    }

    /// Drop any pending recompute (step ended, nothing to place).
    pub fn reset(&mut self) {
        self.dirty_since = None;
        self.last_emit = None;
    }

    /// Whether an unconsumed invalidation is pending.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty_since.is_some()
    }
}

impl Default for ReflowCoalescer {
    fn default() -> Self {
        Self::new()
    }
}
