#![forbid(unsafe_code)]

//! Step-scoped deadline tasks.
//!
//! Timers are modeled as explicit deadlines rather than callbacks: the
//! runner schedules, the host polls. Every task belongs to the step that
//! scheduled it, and the runner cancels the whole set the instant that
//! step is left, so a stale timer can never fire an advance on a step
//! the user is no longer viewing.

use std::time::Instant;

/// What a deadline means when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Advance to the next step.
    AutoAdvance,
    /// Auto-complete the tour shortly after the last step rendered.
    CompletionGrace,
}

#[derive(Debug, Clone, Copy)]
struct DeadlineTask {
    kind: TaskKind,
    deadline: Instant,
}

/// The set of pending deadlines for the current step.
#[derive(Debug, Default)]
pub struct TaskSet {
    tasks: Vec<DeadlineTask>,
}

impl TaskSet {
    /// An empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a deadline, replacing any pending task of the same kind.
    pub fn schedule(&mut self, kind: TaskKind, deadline: Instant) {
        self.cancel(kind);
        self.tasks.push(DeadlineTask { kind, deadline });
    }

    /// Cancel a pending task of this kind, if any.
    pub fn cancel(&mut self, kind: TaskKind) {
        self.tasks.retain(|t| t.kind != kind);
    }

    /// Cancel everything.
    pub fn cancel_all(&mut self) {
        self.tasks.clear();
    }

    /// Remove and return the kinds whose deadline has passed, soonest
    /// first.
    pub fn take_due(&mut self, now: Instant) -> Vec<TaskKind> {
        let mut due: Vec<DeadlineTask> = Vec::new();
        self.tasks.retain(|t| {
            if t.deadline <= now {
                due.push(*t);
                false
            } else {
                true
            }
        });
        due.sort_by_key(|t| t.deadline);
        due.into_iter().map(|t| t.kind).collect()
    }

    /// Earliest pending deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.tasks.iter().map(|t| t.deadline).min()
    }

    /// Whether nothing is scheduled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
