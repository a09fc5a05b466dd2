//! Task state machine for the queue.

use serde::{Deserialize, Serialize};

/// Task state.
///
/// Transitions:
/// - Scheduled -> Queued (once `run_at` has passed)
/// - Queued -> Running -> Succeeded
/// - Queued -> Running -> RetryScheduled -> Queued (until the attempt budget is spent)
/// - Queued -> Running -> Dead
/// - Dead -> Queued (manual replay)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Delayed or scheduled; invisible to workers until due.
    Scheduled,

    /// Ready to run.
    Queued,

    /// Leased by a worker.
    Running,

    Succeeded,

    /// Waiting out a backoff delay.
    RetryScheduled,

    /// Failed permanently or ran out of attempts.
    Dead,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Dead)
    }

    pub fn is_runnable(self) -> bool {
        matches!(self, TaskState::Queued)
    }

    /// Waiting in the time-ordered heap.
    pub fn is_waiting(self) -> bool {
        matches!(self, TaskState::Scheduled | TaskState::RetryScheduled)
    }
}
