//! WorkerPool: `concurrency` workers pulling from one shared queue.
//!
//! Each worker loops lease → run handler → ack/fail. The queue decides
//! between retry and dead-letter; workers only report what happened. The
//! number of workers is the ceiling on in-flight executions.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::builder::App;
use crate::config::WorkerConfig;
use crate::domain::{Decision, TaskEnvelope, TaskError};
use crate::queue::{Queue, QueueError, TaskLease};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPoolConfig {
    pub concurrency: usize,
    /// Upper bound on one handler run. Expiry counts as a transient fault.
    pub handler_timeout: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self::from(&WorkerConfig::default())
    }
}

impl From<&WorkerConfig> for WorkerPoolConfig {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            concurrency: config.concurrency.max(1),
            handler_timeout: config.handler_timeout(),
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    processed: AtomicU64,
    succeeded: AtomicU64,
    retried: AtomicU64,
    dead_lettered: AtomicU64,
    in_flight: AtomicUsize,
}

impl Counters {
    fn snapshot(&self) -> PoolStats {
        PoolStats {
            processed: self.processed.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of what the pool has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub processed: u64,
    pub succeeded: u64,
    pub retried: u64,
    pub dead_lettered: u64,
    pub in_flight: usize,
}

/// Worker pool handle.
/// - `request_shutdown` stops taking new leases
/// - `shutdown_and_join` also waits for in-flight runs to finish
/// - dropping the handle stops the workers without waiting
pub struct WorkerPool {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl WorkerPool {
    pub fn spawn(config: WorkerPoolConfig, queue: Arc<dyn Queue>, app: Arc<App>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let counters = Arc::new(Counters::default());
        let concurrency = config.concurrency.max(1);

        let mut joins = Vec::with_capacity(concurrency);
        for worker_id in 0..concurrency {
            let worker = Worker {
                id: worker_id,
                queue: Arc::clone(&queue),
                app: Arc::clone(&app),
                handler_timeout: config.handler_timeout,
                counters: Arc::clone(&counters),
            };
            let mut rx = shutdown_rx.clone();
            joins.push(tokio::spawn(async move {
                worker.run(&mut rx).await;
            }));
        }

        info!(concurrency, kinds = ?app.kinds(), "worker pool started");
        Self {
            shutdown_tx,
            joins,
            counters,
        }
    }

    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot()
    }

    /// In-flight runs are not cancelled.
    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) -> PoolStats {
        self.request_shutdown();
        for join in self.joins {
            if let Err(e) = join.await {
                error!(error = %e, "worker task ended abnormally");
            }
        }
        let stats = self.counters.snapshot();
        info!(?stats, "worker pool stopped");
        stats
    }
}

/// Resolve the handler for `envelope` and run it under `timeout`.
///
/// An unknown kind is a validation fault so the task is dead-lettered
/// without retries.
pub async fn execute(app: &App, envelope: &TaskEnvelope, timeout: Duration) -> Result<(), TaskError> {
    let Some(handler) = app.handler_for(envelope.task_type()) else {
        return Err(TaskError::validation(format!(
            "no handler registered for task type '{}'",
            envelope.task_type()
        )));
    };

    match tokio::time::timeout(timeout, handler.handle_dyn(envelope.payload())).await {
        Ok(result) => result,
        Err(_) => Err(TaskError::transient(format!(
            "handler timed out after {timeout:?}"
        ))),
    }
}

struct Worker {
    id: usize,
    queue: Arc<dyn Queue>,
    app: Arc<App>,
    handler_timeout: Duration,
    counters: Arc<Counters>,
}

impl Worker {
    async fn run(&self, shutdown_rx: &mut watch::Receiver<bool>) {
        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            // lease may wait, so race it against shutdown
            let lease = tokio::select! {
                changed = shutdown_rx.changed() => {
                    // a dropped pool handle stops the workers too
                    if changed.is_err() {
                        debug!(worker = self.id, "pool handle dropped, worker exiting");
                        break;
                    }
                    continue;
                }
                lease = self.queue.lease() => lease,
            };

            let Some(lease) = lease else {
                debug!(worker = self.id, "queue closed, worker exiting");
                break;
            };

            self.counters.in_flight.fetch_add(1, Ordering::Relaxed);
            self.process(lease).await;
            self.counters.in_flight.fetch_sub(1, Ordering::Relaxed);
        }
    }

    async fn process(&self, lease: Box<dyn TaskLease>) {
        let envelope = lease.envelope().clone();
        let attempt = lease.attempt();
        let task_id = envelope.task_id();
        let kind = envelope.task_type().clone();

        debug!(worker = self.id, %task_id, %kind, attempt, "executing task");
        let result = execute(&self.app, &envelope, self.handler_timeout).await;
        self.counters.processed.fetch_add(1, Ordering::Relaxed);

        match result {
            Ok(()) => match lease.ack().await {
                Ok(()) => {
                    self.counters.succeeded.fetch_add(1, Ordering::Relaxed);
                    info!(worker = self.id, %task_id, %kind, attempt, "task succeeded");
                }
                Err(QueueError::LeaseExpired(_)) => {
                    warn!(worker = self.id, %task_id, %kind, "ack after lease expiry ignored");
                }
                Err(e) => error!(worker = self.id, %task_id, error = %e, "ack failed"),
            },
            Err(err) => {
                warn!(worker = self.id, %task_id, %kind, attempt, error = %err, "task failed");
                match lease.fail(err).await {
                    Ok(Decision::Retry { .. }) => {
                        self.counters.retried.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(Decision::MarkDead { .. }) => {
                        self.counters.dead_lettered.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(QueueError::LeaseExpired(_)) => {
                        warn!(worker = self.id, %task_id, %kind, "failure after lease expiry ignored");
                    }
                    Err(e) => error!(worker = self.id, %task_id, error = %e, "fail report failed"),
                }
            }
        }
    }
}
