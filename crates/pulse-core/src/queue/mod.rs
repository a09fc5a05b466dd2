//! Queue module: state management, retry logic, fair dequeue and the
//! in-memory broker.

mod memory;
mod record;
mod retry;
mod state;
mod weights;

pub use memory::{InMemoryQueue, QueueSettings};
pub use record::TaskRecord;
pub use retry::RetryPolicy;
pub use state::TaskState;
pub use weights::{PriorityWeights, WeightedSelector};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{AttemptRecord, Decision, DecisionRecord, TaskEnvelope, TaskError, TaskId};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueueError {
    /// The broker cannot accept or hand out work.
    #[error("queue unavailable")]
    Unavailable,

    #[error("payload could not be encoded: {0}")]
    Encode(String),

    #[error("task {0} already enqueued")]
    Duplicate(TaskId),

    #[error("task {0} not found")]
    NotFound(TaskId),

    #[error("task {0} is not dead-lettered")]
    NotDead(TaskId),

    /// The lease was reclaimed before the worker reported back.
    #[error("lease on task {0} expired")]
    LeaseExpired(TaskId),
}

impl From<QueueError> for TaskError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Encode(_) => TaskError::validation(err.to_string()),
            _ => TaskError::transient(err.to_string()),
        }
    }
}

/// Number of tasks per state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    pub scheduled: u64,
    pub queued: u64,
    pub running: u64,
    pub succeeded: u64,
    pub retry_scheduled: u64,
    pub dead: u64,
}

/// A dead-lettered task, as shown to operators.
#[derive(Debug, Clone)]
pub struct DeadLetterEntry {
    pub envelope: TaskEnvelope,
    pub attempts: u32,
    pub last_error: Option<TaskError>,
    pub died_at: DateTime<Utc>,
}

/// Everything the queue remembers about how a task ran.
#[derive(Debug, Clone)]
pub struct TaskHistory {
    pub state: TaskState,
    pub attempts: Vec<AttemptRecord>,
    pub decisions: Vec<DecisionRecord>,
}

/// A leased task. The worker owns the lease and must either `ack` or `fail`.
///
/// The queue owns state transitions; the worker runs side effects and
/// reports the result.
#[async_trait]
pub trait TaskLease: Send {
    fn envelope(&self) -> &TaskEnvelope;

    /// 1-based attempt number of this run.
    fn attempt(&self) -> u32;

    async fn ack(self: Box<Self>) -> Result<(), QueueError>;

    /// Report a failure; the queue decides between retry and dead-letter.
    async fn fail(self: Box<Self>, error: TaskError) -> Result<Decision, QueueError>;
}

#[async_trait]
pub trait Queue: Send + Sync {
    /// Store a task. Success means it is queued, not that it ran.
    async fn enqueue(&self, envelope: TaskEnvelope) -> Result<TaskId, QueueError>;

    /// Wait for a runnable task. `None` once the queue is closed.
    async fn lease(&self) -> Option<Box<dyn TaskLease>>;

    /// Take a runnable task if one is due right now.
    async fn try_lease(&self) -> Option<Box<dyn TaskLease>>;

    async fn counts_by_state(&self) -> Result<QueueCounts, QueueError>;

    async fn dead_letters(&self) -> Result<Vec<DeadLetterEntry>, QueueError>;

    /// Put a dead task back in line with a fresh attempt budget.
    async fn replay_dead_letter(&self, task_id: TaskId) -> Result<(), QueueError>;

    async fn history(&self, task_id: TaskId) -> Result<TaskHistory, QueueError>;
}
