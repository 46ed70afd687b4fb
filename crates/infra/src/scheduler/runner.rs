//! The top-level loop: run producers on a cadence, then drain and stop.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{Local, NaiveTime};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::blocked_period::BlockedPeriod;
use crate::jobs::{JobQueue, QueueStats};
use crate::producers::ProducerOrchestrator;
use crate::shutdown::ShutdownCoordinator;
use crate::workers::{PoolStats, WorkerPoolHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoopState {
    Running,
    ShutdownRequested,
    Terminated,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Pause between cycles; `None` or zero starts the next cycle at once.
    pub run_interval: Option<Duration>,
    pub blocked_period: BlockedPeriod,
}

/// How the scheduler finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "exit")]
pub enum SchedulerExit {
    /// Every accepted job was acknowledged and the pool stopped.
    Graceful {
        cycles: u64,
        queue: QueueStats,
        pool: PoolStats,
    },
    /// Shutdown escalated; pending work was abandoned.
    Forced { cycles: u64, pending: u64 },
}

impl SchedulerExit {
    /// Process exit code for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            SchedulerExit::Graceful { .. } => 0,
            SchedulerExit::Forced { .. } => 1,
        }
    }
}

type Clock = Box<dyn Fn() -> NaiveTime + Send + Sync>;

/// Drives producer runs and owns the pipeline's lifecycle.
pub struct Scheduler {
    config: SchedulerConfig,
    orchestrator: ProducerOrchestrator,
    queue: Arc<JobQueue>,
    shutdown: ShutdownCoordinator,
    state: watch::Sender<LoopState>,
    cycles: AtomicU64,
    blocked_streak: AtomicU64,
    clock: Clock,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .field("orchestrator", &self.orchestrator)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        orchestrator: ProducerOrchestrator,
        queue: Arc<JobQueue>,
        shutdown: ShutdownCoordinator,
    ) -> Self {
        let (state, _) = watch::channel(LoopState::Running);
        Self {
            config,
            orchestrator,
            queue,
            shutdown,
            state,
            cycles: AtomicU64::new(0),
            blocked_streak: AtomicU64::new(0),
            clock: Box::new(|| Local::now().time()),
        }
    }

    /// Replace the local wall clock used for the blocked-period check.
    pub fn with_clock(mut self, clock: impl Fn() -> NaiveTime + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<LoopState> {
        self.state.subscribe()
    }

    /// Completed cycles, whether producers ran or were skipped.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Run until shutdown, then drain the queue and stop `pool`.
    ///
    /// An escalated shutdown at any point returns [`SchedulerExit::Forced`]
    /// immediately, without waiting for the drain.
    pub async fn run(&self, pool: WorkerPoolHandle) -> SchedulerExit {
        let graceful = async {
            self.run_cycles().await;
            self.state.send_replace(LoopState::Terminated);
            info!(pending = self.queue.pending(), "waiting for consumer to finish processing");
            self.queue.await_drained().await;
            info!("consumer finished processing all jobs");
        };

        tokio::select! {
            biased;
            _ = self.shutdown.escalated() => {
                self.state.send_replace(LoopState::Terminated);
                let pending = self.queue.pending();
                warn!(pending, "shutdown escalated, abandoning pending jobs");
                // Dropping the handle leaves workers to die with the runtime.
                drop(pool);
                return SchedulerExit::Forced { cycles: self.cycles(), pending };
            }
            _ = graceful => {}
        }

        let pool = pool.shutdown().await;
        let queue = self.queue.stats();
        let cycles = self.cycles();
        info!(cycles, enqueued = queue.enqueued, acked = queue.acked, "job system shutdown complete");
        SchedulerExit::Graceful {
            cycles,
            queue,
            pool,
        }
    }

    async fn run_cycles(&self) {
        loop {
            self.run_once().await;
            self.cycles.fetch_add(1, Ordering::Relaxed);

            if self.shutdown.is_requested() {
                info!("shutdown requested, breaking main loop");
                self.state.send_replace(LoopState::ShutdownRequested);
                return;
            }

            match self.config.run_interval.filter(|d| !d.is_zero()) {
                Some(interval) => {
                    let next_run = Local::now()
                        + chrono::Duration::from_std(interval).unwrap_or_default();
                    info!(
                        seconds = interval.as_secs(),
                        next_run = %next_run.format("%Y-%m-%d %H:%M:%S"),
                        "waiting before next run"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(interval) => {}
                        _ = self.shutdown.requested() => {}
                    }
                }
                None => tokio::task::yield_now().await,
            }

            if self.shutdown.is_requested() {
                info!("shutdown requested, breaking main loop");
                self.state.send_replace(LoopState::ShutdownRequested);
                return;
            }
        }
    }

    /// Cycles skipped in a row because of the blocked period.
    pub fn blocked_streak(&self) -> u64 {
        self.blocked_streak.load(Ordering::Relaxed)
    }

    /// One cycle: run every producer unless inside the blocked period.
    ///
    /// Only the first skip of a blocked stretch is logged at `info`.
    pub async fn run_once(&self) -> bool {
        let now = (self.clock)();
        if self.config.blocked_period.is_blocked_at(now) {
            let skipped = self.blocked_streak.fetch_add(1, Ordering::Relaxed) + 1;
            if skipped == 1 {
                info!(
                    blocked_period = %self.config.blocked_period,
                    "skipping producer run, inside blocked period"
                );
            } else {
                debug!(
                    blocked_period = %self.config.blocked_period,
                    skipped,
                    "still inside blocked period"
                );
            }
            return false;
        }
        let skipped = self.blocked_streak.swap(0, Ordering::Relaxed);
        if skipped > 0 {
            info!(skipped, "blocked period over");
        }
        info!(units = self.orchestrator.len(), "starting producers");
        self.orchestrator.run_all().await;
        true
    }
}
