//! Pipeline infrastructure: queue, stores, producers, workers, scheduling,
//! shutdown and configuration.
//!
//! Data flow: `Scheduler` → (unless blocked) `ProducerOrchestrator` →
//! `JobQueue` → `WorkerPool` → analyzer + notifiers. The
//! `ShutdownCoordinator` gates the scheduler's next cycle and the final
//! drain.

pub mod config;
pub mod jobs;
pub mod producers;
pub mod scheduler;
pub mod shutdown;
pub mod workers;

mod integration_tests;

pub use crate::config::{AppConfig, ConfigError};
pub use jobs::{JobQueue, QueueError, QueueStats, QueuedJob, RecordStore};
pub use producers::{ProducerMode, ProducerOrchestrator, ProducerUnit, RunSummary};
pub use scheduler::{BlockedPeriod, LoopState, Scheduler, SchedulerConfig, SchedulerExit};
pub use shutdown::{ShutdownCoordinator, ShutdownStage, Signal};
pub use workers::{JobProcessor, PoolStats, ProcessError, WorkerPool, WorkerPoolConfig};
