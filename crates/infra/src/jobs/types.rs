//! Queue items and the policies that bound how often a job is attempted.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use jobwatch_core::{DeliveryId, JobPosting};

/// One enqueue event for a posting.
///
/// The posting itself is shared and never mutated; a requeue produces a new
/// `QueuedJob` around the same posting with a fresh delivery id.
#[derive(Debug, Clone)]
pub struct QueuedJob {
    pub delivery: DeliveryId,
    pub posting: Arc<JobPosting>,
    /// 1 for the first enqueue, incremented on every requeue.
    pub delivery_count: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl QueuedJob {
    pub fn new(posting: JobPosting) -> Self {
        Self {
            delivery: DeliveryId::new(),
            posting: Arc::new(posting),
            delivery_count: 1,
            enqueued_at: Utc::now(),
        }
    }

    /// The next enqueue event for the same posting.
    pub fn redeliver(&self) -> Self {
        Self {
            delivery: DeliveryId::new(),
            posting: Arc::clone(&self.posting),
            delivery_count: self.delivery_count + 1,
            enqueued_at: Utc::now(),
        }
    }

    pub fn title(&self) -> &str {
        &self.posting.title
    }

    pub fn company(&self) -> &str {
        &self.posting.company
    }
}

/// Local (in-place) retry policy with a fixed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts per delivery, counting the first one. Zero still tries once.
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            delay: Duration::ZERO,
        }
    }

    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Total attempts for one delivery.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    /// Whether another attempt may follow attempt number `attempt` (1-indexed).
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts()
    }
}

/// How many times a job whose local retries ended in a recoverable error is
/// put back on the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequeuePolicy {
    pub max_requeues: u32,
}

impl Default for RequeuePolicy {
    fn default() -> Self {
        Self { max_requeues: 1 }
    }
}

impl RequeuePolicy {
    pub fn allows(&self, job: &QueuedJob) -> bool {
        job.delivery_count <= self.max_requeues
    }
}

/// Upper bound on analyzer calls for a single posting.
pub fn total_attempt_budget(retry: &RetryPolicy, requeue: &RequeuePolicy) -> u32 {
    retry.max_attempts() * (requeue.max_requeues + 1)
}

/// What a worker did with one dequeued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    Succeeded,
    Requeued,
    Dropped,
}
