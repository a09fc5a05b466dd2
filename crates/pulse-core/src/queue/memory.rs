//! In-memory broker.

use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};

use super::{
    DeadLetterEntry, PriorityWeights, Queue, QueueCounts, QueueError, RetryPolicy, TaskHistory,
    TaskLease, TaskRecord, TaskState, WeightedSelector,
};
use crate::domain::{
    AttemptRecord, Decider, Decision, DecisionRecord, DefaultDecider, Priority, TaskEnvelope,
    TaskError, TaskId,
};
use crate::ports::{Clock, IdGenerator, UlidGenerator};

#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub retry: RetryPolicy,
    pub weights: PriorityWeights,
    /// How long a worker may hold a task before it is redelivered.
    pub lease_timeout: Duration,
    /// Upper bound on how long an idle `lease` sleeps between checks.
    pub poll_interval: Duration,
    /// How long a succeeded task stays inspectable before it is dropped.
    /// Dead tasks are kept until replayed.
    pub succeeded_retention: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            weights: PriorityWeights::default(),
            lease_timeout: Duration::from_secs(300),
            poll_interval: Duration::from_millis(200),
            succeeded_retention: Duration::from_secs(3600),
        }
    }
}

/// Entry of the time-ordered heap. Reverse ordering turns `BinaryHeap` into
/// a min-heap; `seq` keeps equal deadlines in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ScheduledTask {
    run_at: DateTime<Utc>,
    seq: u64,
    task_id: TaskId,
}

impl PartialOrd for ScheduledTask {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledTask {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .run_at
            .cmp(&self.run_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

fn add_std(at: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|d| at.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// What `take_ready` hands to a new lease.
struct Leased {
    task_id: TaskId,
    attempt: u32,
    generation: u64,
    envelope: TaskEnvelope,
}

struct QueueState {
    records: HashMap<TaskId, TaskRecord>,

    /// One FIFO per priority class, indexed by `Priority::index`.
    ready: [VecDeque<TaskId>; 3],

    scheduled: BinaryHeap<ScheduledTask>,

    running: HashSet<TaskId>,

    selector: WeightedSelector,

    seq: u64,

    closed: bool,
}

impl QueueState {
    fn new() -> Self {
        Self {
            records: HashMap::new(),
            ready: [VecDeque::new(), VecDeque::new(), VecDeque::new()],
            scheduled: BinaryHeap::new(),
            running: HashSet::new(),
            selector: WeightedSelector::new(),
            seq: 0,
            closed: false,
        }
    }

    fn schedule(&mut self, task_id: TaskId, run_at: DateTime<Utc>) {
        self.seq += 1;
        self.scheduled.push(ScheduledTask {
            run_at,
            seq: self.seq,
            task_id,
        });
    }

    fn push_ready(&mut self, task_id: TaskId, priority: Priority) {
        self.ready[priority.index()].push_back(task_id);
    }

    /// Move due tasks from the heap to their ready lists.
    fn promote_due(&mut self, now: DateTime<Utc>) {
        while let Some(entry) = self.scheduled.peek() {
            if entry.run_at > now {
                break;
            }
            let Some(entry) = self.scheduled.pop() else {
                break;
            };
            // Entries left behind by a replay or a re-schedule are skipped.
            if let Some(record) = self.records.get_mut(&entry.task_id)
                && record.state.is_waiting()
                && record.run_at == Some(entry.run_at)
            {
                record.requeue(now);
                let priority = record.envelope.priority();
                self.ready[priority.index()].push_back(entry.task_id);
            }
        }
    }

    fn next_ready(&mut self, weights: &PriorityWeights) -> Option<TaskId> {
        let ready = &self.ready;
        let priority = self
            .selector
            .pick(weights, |p| !ready[p.index()].is_empty())?;
        self.ready[priority.index()].pop_front()
    }

    /// Time until the next scheduled task or lease expiry.
    fn next_wake(&self, now: DateTime<Utc>) -> Option<Duration> {
        let next_scheduled = self.scheduled.peek().map(|e| e.run_at);
        let next_expiry = self
            .running
            .iter()
            .filter_map(|id| self.records.get(id).and_then(|r| r.lease_expires_at))
            .min();
        let at = match (next_scheduled, next_expiry) {
            (Some(a), Some(b)) => a.min(b),
            (a, b) => a.or(b)?,
        };
        Some((at - now).to_std().unwrap_or(Duration::ZERO))
    }

    /// Drop succeeded records last touched at or before `cutoff`.
    fn prune_succeeded(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.records.len();
        self.records
            .retain(|_, r| r.state != TaskState::Succeeded || r.updated_at > cutoff);
        before - self.records.len()
    }

    fn counts(&self) -> QueueCounts {
        let mut counts = QueueCounts::default();
        for record in self.records.values() {
            match record.state {
                TaskState::Scheduled => counts.scheduled += 1,
                TaskState::Queued => counts.queued += 1,
                TaskState::Running => counts.running += 1,
                TaskState::Succeeded => counts.succeeded += 1,
                TaskState::RetryScheduled => counts.retry_scheduled += 1,
                TaskState::Dead => counts.dead += 1,
            }
        }
        counts
    }
}

struct Inner {
    state: Mutex<QueueState>,
    notify: Notify,
    clock: Arc<dyn Clock>,
    ids: Box<dyn IdGenerator>,
    decider: Arc<dyn Decider>,
    settings: QueueSettings,
}

impl Inner {
    fn prune(&self, state: &mut QueueState, now: DateTime<Utc>) {
        let Ok(retention) = chrono::Duration::from_std(self.settings.succeeded_retention) else {
            return;
        };
        let Some(cutoff) = now.checked_sub_signed(retention) else {
            return;
        };
        let pruned = state.prune_succeeded(cutoff);
        if pruned > 0 {
            debug!(pruned, "succeeded tasks past retention dropped");
        }
    }

    /// Promote due tasks, reclaim expired leases and drop old successes.
    fn refresh(&self, state: &mut QueueState, now: DateTime<Utc>) {
        let expired: Vec<TaskId> = state
            .running
            .iter()
            .filter(|id| {
                state
                    .records
                    .get(*id)
                    .and_then(|r| r.lease_expires_at)
                    .is_some_and(|at| at <= now)
            })
            .copied()
            .collect();

        for task_id in expired {
            warn!(%task_id, "lease expired, reclaiming task");
            self.apply_failure(
                state,
                task_id,
                TaskError::transient("lease expired before the worker reported back"),
                now,
            );
        }

        state.promote_due(now);
        self.prune(state, now);
    }

    fn take_ready(
        &self,
        state: &mut QueueState,
        now: DateTime<Utc>,
    ) -> Option<Leased> {
        while let Some(task_id) = state.next_ready(&self.settings.weights) {
            let Some(record) = state.records.get_mut(&task_id) else {
                continue;
            };
            if !record.state.is_runnable() {
                continue;
            }
            record.start_attempt(now, add_std(now, self.settings.lease_timeout));
            let leased = Leased {
                task_id,
                attempt: record.attempts,
                generation: record.lease_generation,
                envelope: record.envelope.clone(),
            };
            state.running.insert(task_id);
            return Some(leased);
        }
        None
    }

    /// Record a failed run and apply the decider's verdict.
    fn apply_failure(
        &self,
        state: &mut QueueState,
        task_id: TaskId,
        error: TaskError,
        now: DateTime<Utc>,
    ) -> Option<Decision> {
        let record = state.records.get_mut(&task_id)?;

        record.history.push(AttemptRecord {
            attempt_id: self.ids.generate_attempt_id(),
            task_id,
            attempt: record.attempts,
            started_at: record.leased_at.unwrap_or(now),
            finished_at: now,
            error: Some(error.clone()),
        });

        let decision = self.decider.decide(record, &error);
        let trigger = serde_json::json!({
            "error": error.message(),
            "kind": error.kind(),
            "attempts": record.attempts,
            "max_attempts": record.max_attempts,
        });
        let kind = record.envelope.task_type().clone();

        let retry_at = match &decision {
            Decision::Retry { delay, reason } => {
                let run_at = add_std(now, *delay);
                let context = serde_json::json!({
                    "delay_ms": u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "run_at": run_at,
                    "reason": reason,
                });
                record.decisions.push(DecisionRecord::new(
                    task_id,
                    trigger,
                    "retry_policy",
                    "schedule_retry",
                    Some(context),
                    now,
                ));
                info!(%task_id, %kind, attempt = record.attempts, ?delay, error = %error, "scheduling retry");
                record.schedule_retry(run_at, error, now);
                Some(run_at)
            }
            Decision::MarkDead { reason } => {
                record.decisions.push(DecisionRecord::new(
                    task_id,
                    trigger,
                    "retry_policy",
                    "mark_dead",
                    Some(serde_json::json!({ "reason": reason })),
                    now,
                ));
                warn!(%task_id, %kind, attempt = record.attempts, error = %error, "task dead-lettered");
                record.mark_dead(error, now);
                None
            }
        };

        state.running.remove(&task_id);
        if let Some(run_at) = retry_at {
            state.schedule(task_id, run_at);
        }
        Some(decision)
    }
}

/// Single-process broker. Cloning shares the same queue.
#[derive(Clone)]
pub struct InMemoryQueue {
    inner: Arc<Inner>,
}

impl InMemoryQueue {
    /// Queue using the default classification-aware decider.
    pub fn new(settings: QueueSettings, clock: Arc<dyn Clock>) -> Self {
        let decider = Arc::new(DefaultDecider::new(settings.retry.clone()));
        Self::with_decider(settings, clock, decider)
    }

    pub fn with_decider(
        settings: QueueSettings,
        clock: Arc<dyn Clock>,
        decider: Arc<dyn Decider>,
    ) -> Self {
        let ids = Box::new(UlidGenerator::new(Arc::clone(&clock)));
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState::new()),
                notify: Notify::new(),
                clock,
                ids,
                decider,
                settings,
            }),
        }
    }

    /// Stop accepting and handing out work. Blocked `lease` calls return `None`.
    pub async fn close(&self) {
        self.inner.state.lock().await.closed = true;
        self.inner.notify.notify_waiters();
        info!("queue closed");
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.state.lock().await.closed
    }

    fn lease_now(&self, state: &mut QueueState) -> Option<Box<dyn TaskLease>> {
        let now = self.inner.clock.now();
        self.inner.refresh(state, now);
        let Leased {
            task_id,
            attempt,
            generation,
            envelope,
        } = self.inner.take_ready(state, now)?;
        debug!(%task_id, kind = %envelope.task_type(), priority = %envelope.priority(), attempt, "task leased");
        Some(Box::new(InMemoryLease {
            task_id,
            attempt,
            generation,
            envelope,
            inner: Arc::clone(&self.inner),
        }))
    }
}

#[async_trait]
impl Queue for InMemoryQueue {
    async fn enqueue(&self, envelope: TaskEnvelope) -> Result<TaskId, QueueError> {
        let now = self.inner.clock.now();
        let task_id = envelope.task_id();
        let kind = envelope.task_type().clone();
        let priority = envelope.priority();

        {
            let mut state = self.inner.state.lock().await;
            if state.closed {
                return Err(QueueError::Unavailable);
            }
            if state.records.contains_key(&task_id) {
                return Err(QueueError::Duplicate(task_id));
            }

            let record = TaskRecord::new(envelope, self.inner.settings.retry.max_attempts, now);
            match record.run_at {
                Some(run_at) if record.state == TaskState::Scheduled => {
                    state.schedule(task_id, run_at)
                }
                _ => state.push_ready(task_id, priority),
            }
            state.records.insert(task_id, record);
        }

        self.inner.notify.notify_one();
        debug!(%task_id, %kind, %priority, "task enqueued");
        Ok(task_id)
    }

    async fn lease(&self) -> Option<Box<dyn TaskLease>> {
        loop {
            let wait = {
                let mut state = self.inner.state.lock().await;
                if state.closed {
                    return None;
                }
                if let Some(lease) = self.lease_now(&mut state) {
                    return Some(lease);
                }
                let now = self.inner.clock.now();
                state.next_wake(now)
            };

            let poll = self.inner.settings.poll_interval;
            let sleep_for = wait.map_or(poll, |d| d.min(poll));
            tokio::select! {
                _ = self.inner.notify.notified() => {},
                _ = tokio::time::sleep(sleep_for) => {},
            }
        }
    }

    async fn try_lease(&self) -> Option<Box<dyn TaskLease>> {
        let mut state = self.inner.state.lock().await;
        if state.closed {
            return None;
        }
        self.lease_now(&mut state)
    }

    async fn counts_by_state(&self) -> Result<QueueCounts, QueueError> {
        let now = self.inner.clock.now();
        let mut state = self.inner.state.lock().await;
        self.inner.prune(&mut state, now);
        Ok(state.counts())
    }

    async fn dead_letters(&self) -> Result<Vec<DeadLetterEntry>, QueueError> {
        let state = self.inner.state.lock().await;
        let mut entries: Vec<DeadLetterEntry> = state
            .records
            .values()
            .filter(|r| r.state == TaskState::Dead)
            .map(|r| DeadLetterEntry {
                envelope: r.envelope.clone(),
                attempts: r.attempts,
                last_error: r.last_error.clone(),
                died_at: r.updated_at,
            })
            .collect();
        entries.sort_by_key(|e| (e.died_at, e.envelope.task_id()));
        Ok(entries)
    }

    async fn replay_dead_letter(&self, task_id: TaskId) -> Result<(), QueueError> {
        let now = self.inner.clock.now();
        {
            let mut state = self.inner.state.lock().await;
            if state.closed {
                return Err(QueueError::Unavailable);
            }
            let record = state
                .records
                .get_mut(&task_id)
                .ok_or(QueueError::NotFound(task_id))?;
            if record.state != TaskState::Dead {
                return Err(QueueError::NotDead(task_id));
            }

            let trigger = serde_json::json!({
                "attempts": record.attempts,
                "last_error": record.last_error.as_ref().map(|e| e.message().to_string()),
            });
            record.decisions.push(DecisionRecord::new(
                task_id, trigger, "operator", "replay", None, now,
            ));
            record.revive(now);
            let priority = record.envelope.priority();
            state.push_ready(task_id, priority);
        }

        self.inner.notify.notify_one();
        info!(%task_id, "dead letter replayed");
        Ok(())
    }

    async fn history(&self, task_id: TaskId) -> Result<TaskHistory, QueueError> {
        let state = self.inner.state.lock().await;
        let record = state
            .records
            .get(&task_id)
            .ok_or(QueueError::NotFound(task_id))?;
        Ok(TaskHistory {
            state: record.state,
            attempts: record.history.clone(),
            decisions: record.decisions.clone(),
        })
    }
}

struct InMemoryLease {
    task_id: TaskId,
    attempt: u32,
    generation: u64,
    envelope: TaskEnvelope,
    inner: Arc<Inner>,
}

#[async_trait]
impl TaskLease for InMemoryLease {
    fn envelope(&self) -> &TaskEnvelope {
        &self.envelope
    }

    fn attempt(&self) -> u32 {
        self.attempt
    }

    async fn ack(self: Box<Self>) -> Result<(), QueueError> {
        let now = self.inner.clock.now();
        let mut state = self.inner.state.lock().await;

        let record = state
            .records
            .get_mut(&self.task_id)
            .ok_or(QueueError::NotFound(self.task_id))?;
        if !record.is_leased_by(self.generation) {
            return Err(QueueError::LeaseExpired(self.task_id));
        }

        record.history.push(AttemptRecord {
            attempt_id: self.inner.ids.generate_attempt_id(),
            task_id: self.task_id,
            attempt: self.attempt,
            started_at: record.leased_at.unwrap_or(now),
            finished_at: now,
            error: None,
        });
        record.mark_succeeded(now);
        state.running.remove(&self.task_id);
        Ok(())
    }

    async fn fail(self: Box<Self>, error: TaskError) -> Result<Decision, QueueError> {
        let now = self.inner.clock.now();
        let decision = {
            let mut state = self.inner.state.lock().await;
            let owned = state
                .records
                .get(&self.task_id)
                .ok_or(QueueError::NotFound(self.task_id))?
                .is_leased_by(self.generation);
            if !owned {
                return Err(QueueError::LeaseExpired(self.task_id));
            }
            self.inner
                .apply_failure(&mut state, self.task_id, error, now)
                .ok_or(QueueError::NotFound(self.task_id))?
        };

        // wake idle workers so they recompute their sleep
        self.inner.notify.notify_one();
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ErrorKind, TaskType};
    use crate::ports::ManualClock;
    use chrono::TimeZone;
    use ulid::Ulid;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn queue(settings: QueueSettings) -> (InMemoryQueue, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start()));
        let queue = InMemoryQueue::new(settings, clock.clone());
        (queue, clock)
    }

    fn envelope(
        kind: &str,
        priority: Priority,
        not_before: Option<DateTime<Utc>>,
    ) -> TaskEnvelope {
        TaskEnvelope::new(
            TaskId::from_ulid(Ulid::new()),
            TaskType::new(kind),
            br#"{"user_id":1,"company_id":1}"#.to_vec(),
            priority,
            not_before,
            start(),
        )
    }

    #[tokio::test]
    async fn enqueue_and_counts() {
        let (queue, _) = queue(QueueSettings::default());
        queue
            .enqueue(envelope("churn:calculate", Priority::Default, None))
            .await
            .unwrap();

        let counts = queue.counts_by_state().await.unwrap();
        assert_eq!(counts.queued, 1);
        assert_eq!(counts.running, 0);
    }

    #[tokio::test]
    async fn duplicate_task_id_is_rejected() {
        let (queue, _) = queue(QueueSettings::default());
        let env = envelope("churn:calculate", Priority::Default, None);
        queue.enqueue(env.clone()).await.unwrap();

        let err = queue.enqueue(env.clone()).await.unwrap_err();
        assert_eq!(err, QueueError::Duplicate(env.task_id()));
    }

    #[tokio::test]
    async fn ack_marks_succeeded_and_records_the_attempt() {
        let (queue, _) = queue(QueueSettings::default());
        let task_id = queue
            .enqueue(envelope("survey:process", Priority::Default, None))
            .await
            .unwrap();

        let lease = tokio::time::timeout(Duration::from_millis(100), queue.lease())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(lease.envelope().task_type().as_str(), "survey:process");
        assert_eq!(lease.attempt(), 1);
        assert_eq!(queue.counts_by_state().await.unwrap().running, 1);

        lease.ack().await.unwrap();

        let counts = queue.counts_by_state().await.unwrap();
        assert_eq!(counts.succeeded, 1);
        assert_eq!(counts.running, 0);

        let history = queue.history(task_id).await.unwrap();
        assert_eq!(history.attempts.len(), 1);
        assert!(history.attempts[0].succeeded());
        assert!(history.decisions.is_empty());
    }

    #[tokio::test]
    async fn delayed_task_is_invisible_until_due() {
        let (queue, clock) = queue(QueueSettings::default());
        let due = start() + chrono::Duration::minutes(5);
        queue
            .enqueue(envelope("churn:calculate", Priority::Default, Some(due)))
            .await
            .unwrap();
        assert_eq!(queue.counts_by_state().await.unwrap().scheduled, 1);

        assert!(queue.try_lease().await.is_none());

        clock.advance(chrono::Duration::seconds(299));
        assert!(queue.try_lease().await.is_none());

        clock.advance(chrono::Duration::seconds(1));
        let lease = queue.try_lease().await.expect("due after five minutes");
        assert_eq!(lease.envelope().not_before(), Some(due));
    }

    #[tokio::test]
    async fn blocked_lease_wakes_when_scheduled_task_falls_due() {
        let settings = QueueSettings {
            poll_interval: Duration::from_millis(10),
            ..QueueSettings::default()
        };
        let (queue, clock) = queue(settings);
        let due = start() + chrono::Duration::minutes(5);
        queue
            .enqueue(envelope("churn:calculate", Priority::Default, Some(due)))
            .await
            .unwrap();

        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.lease().await.map(|l| l.attempt()) })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!waiter.is_finished());

        clock.advance(chrono::Duration::minutes(5));
        let attempt = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(attempt, Some(1));
    }

    #[tokio::test]
    async fn transient_failure_is_retried_then_dead_lettered() {
        let settings = QueueSettings {
            retry: RetryPolicy {
                max_attempts: 3,
                ..RetryPolicy::default()
            },
            ..QueueSettings::default()
        };
        let (queue, clock) = queue(settings);
        let task_id = queue
            .enqueue(envelope("notification:send", Priority::Critical, None))
            .await
            .unwrap();

        let lease = queue.try_lease().await.unwrap();
        let decision = lease.fail(TaskError::transient("slack timeout")).await.unwrap();
        assert!(matches!(decision, Decision::Retry { delay, .. } if delay == Duration::from_secs(2)));

        // still backing off
        clock.advance(chrono::Duration::seconds(1));
        assert!(queue.try_lease().await.is_none());
        assert_eq!(queue.counts_by_state().await.unwrap().retry_scheduled, 1);

        clock.advance(chrono::Duration::seconds(1));
        let lease = queue.try_lease().await.unwrap();
        assert_eq!(lease.attempt(), 2);
        let decision = lease.fail(TaskError::transient("slack timeout")).await.unwrap();
        assert!(matches!(decision, Decision::Retry { delay, .. } if delay == Duration::from_secs(4)));

        clock.advance(chrono::Duration::seconds(4));
        let lease = queue.try_lease().await.unwrap();
        assert_eq!(lease.attempt(), 3);
        let decision = lease.fail(TaskError::transient("slack timeout")).await.unwrap();
        assert!(decision.is_dead());

        let dead = queue.dead_letters().await.unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].envelope.task_id(), task_id);
        assert_eq!(dead[0].attempts, 3);

        let history = queue.history(task_id).await.unwrap();
        assert_eq!(history.attempts.len(), 3);
        let decisions: Vec<_> = history.decisions.iter().map(|d| d.decision.as_str()).collect();
        assert_eq!(decisions, ["schedule_retry", "schedule_retry", "mark_dead"]);
        assert_eq!(history.decisions[2].trigger["attempts"], 3);
        assert_eq!(history.decisions[2].trigger["max_attempts"], 3);
    }

    #[tokio::test]
    async fn validation_failure_is_dead_lettered_without_retry() {
        let (queue, _) = queue(QueueSettings::default());
        let task_id = queue
            .enqueue(envelope("survey:process", Priority::Default, None))
            .await
            .unwrap();

        let lease = queue.try_lease().await.unwrap();
        let decision = lease
            .fail(TaskError::validation("unknown field `foo`"))
            .await
            .unwrap();
        assert!(decision.is_dead());

        let history = queue.history(task_id).await.unwrap();
        assert_eq!(history.state, TaskState::Dead);
        assert_eq!(history.attempts.len(), 1);
        assert_eq!(history.decisions.len(), 1);
        assert_eq!(history.decisions[0].decision, "mark_dead");

        let dead = queue.dead_letters().await.unwrap();
        assert_eq!(
            dead[0].last_error.as_ref().map(|e| e.kind()),
            Some(ErrorKind::Validation)
        );
    }

    #[tokio::test]
    async fn weighted_dequeue_serves_all_classes() {
        let (queue, _) = queue(QueueSettings::default());
        for priority in Priority::ALL {
            for _ in 0..20 {
                queue
                    .enqueue(envelope("survey:process", priority, None))
                    .await
                    .unwrap();
            }
        }

        let mut counts = [0; 3];
        for _ in 0..10 {
            let lease = queue.try_lease().await.unwrap();
            counts[lease.envelope().priority().index()] += 1;
            lease.ack().await.unwrap();
        }
        assert_eq!(counts, [6, 3, 1]);
    }

    #[tokio::test]
    async fn low_priority_runs_alone_when_nothing_else_is_ready() {
        let (queue, _) = queue(QueueSettings::default());
        queue
            .enqueue(envelope("churn:calculate", Priority::Low, None))
            .await
            .unwrap();

        let lease = queue.try_lease().await.unwrap();
        assert_eq!(lease.envelope().priority(), Priority::Low);
    }

    #[tokio::test]
    async fn replayed_dead_letter_runs_again() {
        let (queue, _) = queue(QueueSettings::default());
        let task_id = queue
            .enqueue(envelope("survey:invitation", Priority::Default, None))
            .await
            .unwrap();
        let lease = queue.try_lease().await.unwrap();
        lease.fail(TaskError::domain("survey 4 not found")).await.unwrap();

        queue.replay_dead_letter(task_id).await.unwrap();
        assert!(queue.dead_letters().await.unwrap().is_empty());

        let lease = queue.try_lease().await.unwrap();
        assert_eq!(lease.attempt(), 1);
        lease.ack().await.unwrap();

        let history = queue.history(task_id).await.unwrap();
        assert_eq!(history.attempts.len(), 2);
        assert_eq!(history.decisions.last().unwrap().decision, "replay");

        let err = queue.replay_dead_letter(task_id).await.unwrap_err();
        assert_eq!(err, QueueError::NotDead(task_id));
    }

    #[tokio::test]
    async fn closed_queue_is_unavailable() {
        let (queue, _) = queue(QueueSettings::default());
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.lease().await.is_none() })
        };
        tokio::task::yield_now().await;

        queue.close().await;

        let err = queue
            .enqueue(envelope("survey:process", Priority::Default, None))
            .await
            .unwrap_err();
        assert_eq!(err, QueueError::Unavailable);

        let got_none = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(got_none);
    }

    #[tokio::test]
    async fn expired_lease_is_redelivered_and_stale_ack_ignored() {
        let settings = QueueSettings {
            lease_timeout: Duration::from_secs(10),
            ..QueueSettings::default()
        };
        let (queue, clock) = queue(settings);
        let task_id = queue
            .enqueue(envelope("churn:calculate", Priority::Default, None))
            .await
            .unwrap();

        let stale = queue.try_lease().await.unwrap();

        // lease expires, then the 2s backoff passes
        clock.advance(chrono::Duration::seconds(11));
        assert!(queue.try_lease().await.is_none());
        clock.advance(chrono::Duration::seconds(2));
        let fresh = queue.try_lease().await.unwrap();
        assert_eq!(fresh.attempt(), 2);

        let err = stale.ack().await.unwrap_err();
        assert_eq!(err, QueueError::LeaseExpired(task_id));

        fresh.ack().await.unwrap();
        assert_eq!(queue.counts_by_state().await.unwrap().succeeded, 1);
    }

    #[tokio::test]
    async fn succeeded_tasks_are_dropped_after_retention() {
        let settings = QueueSettings {
            succeeded_retention: Duration::from_secs(60),
            retry: RetryPolicy {
                max_attempts: 1,
                ..RetryPolicy::default()
            },
            ..QueueSettings::default()
        };
        let (queue, clock) = queue(settings);
        let mut done = Vec::new();
        for _ in 0..3 {
            let id = queue
                .enqueue(envelope("survey:process", Priority::Default, None))
                .await
                .unwrap();
            queue.try_lease().await.unwrap().ack().await.unwrap();
            done.push(id);
        }
        let dead = queue
            .enqueue(envelope("survey:process", Priority::Default, None))
            .await
            .unwrap();
        let lease = queue.try_lease().await.unwrap();
        lease.fail(TaskError::transient("smtp down")).await.unwrap();

        clock.advance(chrono::Duration::seconds(59));
        assert_eq!(queue.counts_by_state().await.unwrap().succeeded, 3);

        clock.advance(chrono::Duration::seconds(1));
        let counts = queue.counts_by_state().await.unwrap();
        assert_eq!(counts.succeeded, 0);
        assert_eq!(counts.dead, 1);
        assert_eq!(
            queue.history(done[0]).await.unwrap_err(),
            QueueError::NotFound(done[0])
        );
        queue.replay_dead_letter(dead).await.unwrap();
    }

    #[tokio::test]
    async fn lease_from_before_a_replay_cannot_ack_the_new_run() {
        let settings = QueueSettings {
            lease_timeout: Duration::from_secs(10),
            retry: RetryPolicy {
                max_attempts: 1,
                ..RetryPolicy::default()
            },
            ..QueueSettings::default()
        };
        let (queue, clock) = queue(settings);
        let task_id = queue
            .enqueue(envelope("survey:invitation", Priority::Default, None))
            .await
            .unwrap();

        let stale = queue.try_lease().await.unwrap();
        assert_eq!(stale.attempt(), 1);

        // the expired lease uses up the only attempt
        clock.advance(chrono::Duration::seconds(11));
        assert!(queue.try_lease().await.is_none());
        assert_eq!(queue.history(task_id).await.unwrap().state, TaskState::Dead);

        queue.replay_dead_letter(task_id).await.unwrap();
        let fresh = queue.try_lease().await.unwrap();
        assert_eq!(fresh.attempt(), 1);

        let err = stale.ack().await.unwrap_err();
        assert_eq!(err, QueueError::LeaseExpired(task_id));
        assert_eq!(queue.history(task_id).await.unwrap().state, TaskState::Running);

        fresh.ack().await.unwrap();
        assert_eq!(queue.history(task_id).await.unwrap().state, TaskState::Succeeded);
    }
}
