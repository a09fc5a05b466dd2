//! Decision model: what happens to a task after a failed attempt.

use std::time::Duration;

use super::errors::TaskError;
use crate::queue::{RetryPolicy, TaskRecord};

/// The next action for a failed task.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Run the task again after `delay`.
    Retry { delay: Duration, reason: String },

    /// Give up and move the task to the dead-letter list.
    MarkDead { reason: String },
}

impl Decision {
    pub fn is_dead(&self) -> bool {
        matches!(self, Decision::MarkDead { .. })
    }
}

/// Decides the next action from the task record and the latest failure.
///
/// Deciders are pure: the queue applies the returned decision.
pub trait Decider: Send + Sync {
    fn decide(&self, task: &TaskRecord, error: &TaskError) -> Decision;
}

/// Classification-aware retry with exponential backoff.
///
/// - validation and domain faults are dead-lettered on the first failure
/// - transient faults retry until `attempts >= max_attempts`
#[derive(Debug, Clone)]
pub struct DefaultDecider {
    retry_policy: RetryPolicy,
}

impl DefaultDecider {
    pub fn new(retry_policy: RetryPolicy) -> Self {
        Self { retry_policy }
    }
}

impl Default for DefaultDecider {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl Decider for DefaultDecider {
    fn decide(&self, task: &TaskRecord, error: &TaskError) -> Decision {
        if !error.is_retryable() {
            return Decision::MarkDead {
                reason: format!("permanent {:?} fault: {}", error.kind(), error.message()),
            };
        }

        if task.attempts >= task.max_attempts {
            Decision::MarkDead {
                reason: format!(
                    "Max attempts reached: {}/{}",
                    task.attempts, task.max_attempts
                ),
            }
        } else {
            let delay = self.retry_policy.next_delay(task.attempts);
            Decision::Retry {
                delay,
                reason: format!(
                    "Retry attempt {}/{} after {:?}",
                    task.attempts + 1,
                    task.max_attempts,
                    delay
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Priority, TaskEnvelope, TaskId, TaskType};
    use chrono::Utc;
    use ulid::Ulid;

    fn record(attempts: u32, max_attempts: u32) -> TaskRecord {
        let now = Utc::now();
        let envelope = TaskEnvelope::new(
            TaskId::from_ulid(Ulid::new()),
            TaskType::new("churn:calculate"),
            b"{}".to_vec(),
            Priority::Default,
            None,
            now,
        );
        let mut record = TaskRecord::new(envelope, max_attempts, now);
        record.attempts = attempts;
        record
    }

    #[test]
    fn transient_fault_is_retried_with_backoff() {
        let decider = DefaultDecider::new(RetryPolicy::default());
        let decision = decider.decide(&record(1, 5), &TaskError::transient("timeout"));
        assert_eq!(
            decision,
            Decision::Retry {
                delay: Duration::from_secs(2),
                reason: "Retry attempt 2/5 after 2s".to_string(),
            }
        );
    }

    #[test]
    fn transient_fault_dies_when_budget_is_spent() {
        let decider = DefaultDecider::default();
        let decision = decider.decide(&record(5, 5), &TaskError::transient("timeout"));
        assert!(decision.is_dead());
    }

    #[test]
    fn permanent_faults_die_on_first_failure() {
        let decider = DefaultDecider::default();
        assert!(decider.decide(&record(1, 5), &TaskError::validation("bad payload")).is_dead());
        assert!(decider.decide(&record(1, 5), &TaskError::domain("no such user")).is_dead());
    }
}
