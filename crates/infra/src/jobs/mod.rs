//! The job pipeline's hand-off point.
//!
//! ## Components
//!
//! - `QueuedJob`: one enqueue event for an immutable posting
//! - `JobQueue`: bounded FIFO with backpressure and a drain barrier
//! - `RecordStore`: per-producer durable storage keyed by canonical URL
//! - `RetryPolicy` / `RequeuePolicy`: the two bounds on attempts per posting

pub mod queue;
pub mod store;
pub mod types;

pub use queue::{JobQueue, QueueError, QueueStats};
pub use store::{InMemoryRecordStore, JsonLinesStore, RecordStore, StoreError};
pub use types::{JobOutcome, QueuedJob, RequeuePolicy, RetryPolicy, total_attempt_budget};
