//! Task record: envelope plus queue bookkeeping.

use chrono::{DateTime, Utc};

use super::TaskState;
use crate::domain::{AttemptRecord, DecisionRecord, TaskEnvelope, TaskError};

/// The queue's single source of truth for a task.
///
/// Ready lists and the scheduled heap only hold `TaskId`s; every state
/// transition happens here.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub envelope: TaskEnvelope,
    pub state: TaskState,

    /// Runs started so far, including the current one while `Running`.
    pub attempts: u32,

    pub max_attempts: u32,

    /// Bumped on every lease and never reset, so a lease taken before a
    /// replay cannot report on a later run.
    pub lease_generation: u64,

    pub last_error: Option<TaskError>,

    /// When a `Scheduled`/`RetryScheduled` task becomes eligible.
    pub run_at: Option<DateTime<Utc>>,

    /// When the current run was leased.
    pub leased_at: Option<DateTime<Utc>>,

    /// A `Running` task whose lease passes this instant is redelivered.
    pub lease_expires_at: Option<DateTime<Utc>>,

    pub history: Vec<AttemptRecord>,
    pub decisions: Vec<DecisionRecord>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    /// New record; delayed envelopes start out `Scheduled`.
    pub fn new(envelope: TaskEnvelope, max_attempts: u32, now: DateTime<Utc>) -> Self {
        let (state, run_at) = match envelope.not_before() {
            Some(at) if at > now => (TaskState::Scheduled, Some(at)),
            _ => (TaskState::Queued, None),
        };
        Self {
            envelope,
            state,
            attempts: 0,
            max_attempts,
            lease_generation: 0,
            last_error: None,
            run_at,
            leased_at: None,
            lease_expires_at: None,
            history: Vec::new(),
            decisions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn start_attempt(&mut self, now: DateTime<Utc>, lease_expires_at: DateTime<Utc>) {
        self.state = TaskState::Running;
        self.attempts += 1;
        self.lease_generation += 1;
        self.leased_at = Some(now);
        self.lease_expires_at = Some(lease_expires_at);
        self.updated_at = now;
    }

    /// Whether the lease handed out as `generation` still owns this record.
    pub fn is_leased_by(&self, generation: u64) -> bool {
        self.state == TaskState::Running && self.lease_generation == generation
    }

    pub fn mark_succeeded(&mut self, now: DateTime<Utc>) {
        self.state = TaskState::Succeeded;
        self.lease_expires_at = None;
        self.updated_at = now;
    }

    pub fn mark_dead(&mut self, error: TaskError, now: DateTime<Utc>) {
        self.state = TaskState::Dead;
        self.last_error = Some(error);
        self.lease_expires_at = None;
        self.updated_at = now;
    }

    pub fn schedule_retry(&mut self, run_at: DateTime<Utc>, error: TaskError, now: DateTime<Utc>) {
        self.state = TaskState::RetryScheduled;
        self.run_at = Some(run_at);
        self.last_error = Some(error);
        self.lease_expires_at = None;
        self.updated_at = now;
    }

    /// Waiting -> Queued.
    pub fn requeue(&mut self, now: DateTime<Utc>) {
        self.state = TaskState::Queued;
        self.run_at = None;
        self.updated_at = now;
    }

    /// Dead -> Queued with a fresh attempt budget. History is kept.
    pub fn revive(&mut self, now: DateTime<Utc>) {
        self.state = TaskState::Queued;
        self.attempts = 0;
        self.last_error = None;
        self.run_at = None;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Priority, TaskId, TaskType};
    use ulid::Ulid;

    fn envelope(not_before: Option<DateTime<Utc>>, now: DateTime<Utc>) -> TaskEnvelope {
        TaskEnvelope::new(
            TaskId::from_ulid(Ulid::new()),
            TaskType::new("survey:process"),
            b"{}".to_vec(),
            Priority::Default,
            not_before,
            now,
        )
    }

    #[test]
    fn delayed_envelope_starts_scheduled() {
        let now = Utc::now();
        let later = now + chrono::Duration::minutes(5);

        let record = TaskRecord::new(envelope(Some(later), now), 5, now);
        assert_eq!(record.state, TaskState::Scheduled);
        assert_eq!(record.run_at, Some(later));

        let record = TaskRecord::new(envelope(Some(now), now), 5, now);
        assert_eq!(record.state, TaskState::Queued);
    }

    #[test]
    fn lease_ownership_follows_the_latest_lease() {
        let now = Utc::now();
        let mut record = TaskRecord::new(envelope(None, now), 5, now);

        record.start_attempt(now, now + chrono::Duration::minutes(5));
        assert!(record.is_leased_by(1));

        record.schedule_retry(now, TaskError::transient("boom"), now);
        record.requeue(now);
        record.start_attempt(now, now + chrono::Duration::minutes(5));
        assert!(!record.is_leased_by(1));
        assert!(record.is_leased_by(2));
    }

    #[test]
    fn revived_record_does_not_reuse_an_old_lease() {
        let now = Utc::now();
        let mut record = TaskRecord::new(envelope(None, now), 1, now);

        record.start_attempt(now, now + chrono::Duration::minutes(5));
        let stale = record.lease_generation;
        record.mark_dead(TaskError::transient("boom"), now);
        record.revive(now);
        record.start_attempt(now, now + chrono::Duration::minutes(5));

        assert_eq!(record.attempts, 1);
        assert!(!record.is_leased_by(stale));
        assert!(record.is_leased_by(record.lease_generation));
    }
}
