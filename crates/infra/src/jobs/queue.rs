//! Bounded in-memory job queue with drain tracking.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, mpsc, watch};
use tracing::{debug, warn};

use super::types::QueuedJob;

pub const DEFAULT_CAPACITY: usize = 100;
pub const DEFAULT_DEQUEUE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("queue capacity must be at least 1")]
    ZeroCapacity,
    #[error("queue is closed")]
    Closed,
    #[error("ack without a matching enqueue")]
    UnmatchedAck,
}

/// Snapshot of queue counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub enqueued: u64,
    pub acked: u64,
    /// Enqueued but not yet acknowledged (buffered or in flight).
    pub pending: u64,
    /// Items currently buffered.
    pub len: usize,
    pub capacity: usize,
}

/// FIFO hand-off between producers and workers.
///
/// - `enqueue` waits while the buffer is full; it never drops.
/// - `dequeue` hands each item to exactly one caller and gives up after a
///   timeout so callers can observe cancellation.
/// - Every accepted item (requeues included) must be `ack`ed once;
///   `await_drained` resolves when nothing is pending.
#[derive(Debug)]
pub struct JobQueue {
    tx: mpsc::Sender<QueuedJob>,
    rx: Mutex<mpsc::Receiver<QueuedJob>>,
    pending: watch::Sender<u64>,
    enqueued: AtomicU64,
    acked: AtomicU64,
}

impl JobQueue {
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        if capacity == 0 {
            return Err(QueueError::ZeroCapacity);
        }
        Ok(Self::build(capacity))
    }

    fn build(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        let (pending, _) = watch::channel(0);
        Self {
            tx,
            rx: Mutex::new(rx),
            pending,
            enqueued: AtomicU64::new(0),
            acked: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Items currently buffered.
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pending(&self) -> u64 {
        *self.pending.borrow()
    }

    /// Add a job, waiting for a free slot when the queue is full.
    pub async fn enqueue(&self, job: QueuedJob) -> Result<(), QueueError> {
        // Count before the send so a concurrent drain wait cannot finish
        // between the hand-off and the increment.
        self.mark_enqueued();
        if self.tx.send(job).await.is_err() {
            self.unmark_enqueued();
            return Err(QueueError::Closed);
        }
        Ok(())
    }

    /// Put a job back as a new enqueue event.
    ///
    /// Callable from a worker that still holds an unacked slot: when the
    /// buffer is full the send continues in the background instead of
    /// blocking the only consumers of the queue.
    pub fn requeue(self: &Arc<Self>, job: QueuedJob) {
        self.mark_enqueued();
        match self.tx.try_send(job) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(job)) => {
                debug!(title = %job.title(), "queue full, deferring requeue");
                let queue = Arc::clone(self);
                tokio::spawn(async move {
                    if queue.tx.send(job).await.is_err() {
                        queue.unmark_enqueued();
                    }
                });
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                warn!(title = %job.title(), "queue closed, requeue lost");
                self.unmark_enqueued();
            }
        }
    }

    /// Take the next job, or `None` if nothing arrives within `timeout`.
    pub async fn dequeue(&self, timeout: Duration) -> Option<QueuedJob> {
        tokio::time::timeout(timeout, async {
            let mut rx = self.rx.lock().await;
            rx.recv().await
        })
        .await
        .ok()
        .flatten()
    }

    /// Mark one dequeued job as fully handled.
    pub fn ack(&self) -> Result<(), QueueError> {
        let mut result = Ok(());
        self.pending.send_modify(|pending| {
            if *pending == 0 {
                result = Err(QueueError::UnmatchedAck);
            } else {
                *pending -= 1;
            }
        });
        if result.is_ok() {
            self.acked.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Wait until every accepted job has been acknowledged.
    pub async fn await_drained(&self) {
        let mut rx = self.pending.subscribe();
        // The sender lives in `self`, so `wait_for` cannot fail here.
        let _ = rx.wait_for(|pending| *pending == 0).await;
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            acked: self.acked.load(Ordering::Relaxed),
            pending: self.pending(),
            len: self.len(),
            capacity: self.capacity(),
        }
    }

    fn mark_enqueued(&self) {
        self.pending.send_modify(|pending| *pending += 1);
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    fn unmark_enqueued(&self) {
        self.pending
            .send_modify(|pending| *pending = pending.saturating_sub(1));
        self.enqueued.fetch_sub(1, Ordering::Relaxed);
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::build(DEFAULT_CAPACITY)
    }
}
