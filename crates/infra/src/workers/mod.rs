//! Consumers: analyze queued postings and notify.

pub mod pool;
pub mod processor;

pub use pool::{PoolError, PoolStats, WorkerPool, WorkerPoolConfig, WorkerPoolHandle};
pub use processor::{DEFAULT_REJECTION_THRESHOLD, JobProcessor, ProcessError};
