//! Long-lived consumer pool draining the job queue.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::processor::JobProcessor;
use crate::jobs::{JobOutcome, JobQueue, QueuedJob, RequeuePolicy};
use crate::jobs::queue::DEFAULT_DEQUEUE_TIMEOUT;

#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub worker_count: usize,
    /// How long a worker waits on an empty queue before re-checking for
    /// shutdown.
    pub dequeue_timeout: Duration,
    pub requeue: RequeuePolicy,
    /// Name for logging
    pub name: String,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: 1,
            dequeue_timeout: DEFAULT_DEQUEUE_TIMEOUT,
            requeue: RequeuePolicy::default(),
            name: "match-worker".to_string(),
        }
    }
}

impl WorkerPoolConfig {
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn with_requeue(mut self, requeue: RequeuePolicy) -> Self {
        self.requeue = requeue;
        self
    }

    pub fn with_dequeue_timeout(mut self, timeout: Duration) -> Self {
        self.dequeue_timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("worker_count must be at least 1")]
    NoWorkers,
}

/// Pool runtime statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub processed: u64,
    pub succeeded: u64,
    pub requeued: u64,
    pub dropped: u64,
    pub in_flight: usize,
    pub uptime_secs: u64,
}

/// Handle to a running pool.
#[derive(Debug)]
pub struct WorkerPoolHandle {
    shutdown: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
    stats: Arc<Mutex<PoolStats>>,
    started: Instant,
}

impl WorkerPoolHandle {
    pub fn worker_count(&self) -> usize {
        self.joins.len()
    }

    pub fn stats(&self) -> PoolStats {
        let mut stats = self
            .stats
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default();
        stats.uptime_secs = self.started.elapsed().as_secs();
        stats
    }

    /// Stop the workers and wait for them.
    ///
    /// In-flight jobs finish first; jobs still buffered in the queue stay
    /// there. Call `JobQueue::await_drained` beforehand for a full drain.
    pub async fn shutdown(self) -> PoolStats {
        let Self {
            shutdown,
            joins,
            stats,
            started,
        } = self;

        let _ = shutdown.send(true);
        for join in joins {
            if let Err(e) = join.await {
                error!(error = %e, "worker task ended abnormally");
            }
        }

        let mut final_stats = stats.lock().map(|s| s.clone()).unwrap_or_default();
        final_stats.uptime_secs = started.elapsed().as_secs();
        info!(
            processed = final_stats.processed,
            succeeded = final_stats.succeeded,
            requeued = final_stats.requeued,
            dropped = final_stats.dropped,
            "job processor stopped"
        );
        final_stats
    }
}

/// Fixed-size set of queue consumers.
///
/// Each worker takes one job at a time, so at most `worker_count` analyzer
/// calls are in flight. Every dequeued job is acknowledged exactly once,
/// after it has succeeded, been requeued, or been dropped.
#[derive(Debug)]
pub struct WorkerPool;

impl WorkerPool {
    pub fn spawn(
        config: WorkerPoolConfig,
        queue: Arc<JobQueue>,
        processor: Arc<JobProcessor>,
    ) -> Result<WorkerPoolHandle, PoolError> {
        if config.worker_count == 0 {
            return Err(PoolError::NoWorkers);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stats = Arc::new(Mutex::new(PoolStats::default()));

        let joins = (0..config.worker_count)
            .map(|idx| {
                let worker = Worker {
                    name: format!("{}-{}", config.name, idx + 1),
                    config: config.clone(),
                    queue: Arc::clone(&queue),
                    processor: Arc::clone(&processor),
                    stats: Arc::clone(&stats),
                };
                tokio::spawn(worker.run(shutdown_rx.clone()))
            })
            .collect();

        info!(workers = config.worker_count, "job processor started");
        Ok(WorkerPoolHandle {
            shutdown: shutdown_tx,
            joins,
            stats,
            started: Instant::now(),
        })
    }
}

struct Worker {
    name: String,
    config: WorkerPoolConfig,
    queue: Arc<JobQueue>,
    processor: Arc<JobProcessor>,
    stats: Arc<Mutex<PoolStats>>,
}

impl Worker {
    async fn run(self, shutdown: watch::Receiver<bool>) {
        debug!(worker = %self.name, "worker started");
        loop {
            if *shutdown.borrow() {
                break;
            }

            let Some(job) = self.queue.dequeue(self.config.dequeue_timeout).await else {
                continue;
            };

            self.update(|s| s.in_flight += 1);
            let outcome = self.handle(job).await;
            if let Err(e) = self.queue.ack() {
                error!(worker = %self.name, error = %e, "queue ack failed");
            }

            self.update(|s| {
                s.in_flight = s.in_flight.saturating_sub(1);
                s.processed += 1;
                match outcome {
                    JobOutcome::Succeeded => s.succeeded += 1,
                    JobOutcome::Requeued => s.requeued += 1,
                    JobOutcome::Dropped => s.dropped += 1,
                }
            });
        }
        debug!(worker = %self.name, "worker stopped");
    }

    async fn handle(&self, job: QueuedJob) -> JobOutcome {
        match self.processor.process(&job).await {
            Ok(listing) => {
                info!(
                    worker = %self.name,
                    title = %job.title(),
                    company = %job.company(),
                    rating = %listing.rating,
                    rejected = listing.rejected,
                    "processed job"
                );
                JobOutcome::Succeeded
            }
            Err(e) if e.is_recoverable() && self.config.requeue.allows(&job) => {
                warn!(
                    worker = %self.name,
                    title = %job.title(),
                    company = %job.company(),
                    delivery = job.delivery_count,
                    error = %e,
                    "adding job back to queue"
                );
                self.queue.requeue(job.redeliver());
                JobOutcome::Requeued
            }
            Err(e) => {
                error!(
                    worker = %self.name,
                    title = %job.title(),
                    company = %job.company(),
                    delivery = job.delivery_count,
                    recoverable = e.is_recoverable(),
                    error = %e,
                    "dropping job"
                );
                JobOutcome::Dropped
            }
        }
    }

    fn update(&self, f: impl FnOnce(&mut PoolStats)) {
        if let Ok(mut stats) = self.stats.lock() {
            f(&mut stats);
        }
    }
}
