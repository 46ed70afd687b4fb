use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use jobwatch_core::JobListing;

use crate::Notifier;

/// Per-listing delivery outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub delivered: Vec<String>,
    pub failed: Vec<String>,
}

impl DeliveryReport {
    pub fn all_delivered(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Fans a listing out to every configured sink, in order.
#[derive(Clone, Default)]
pub struct NotificationService {
    sinks: Vec<Arc<dyn Notifier>>,
}

impl std::fmt::Debug for NotificationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationService")
            .field("sinks", &self.sinks.iter().map(|s| s.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl NotificationService {
    pub fn new(sinks: Vec<Arc<dyn Notifier>>) -> Self {
        Self { sinks }
    }

    pub fn with_sink(mut self, sink: Arc<dyn Notifier>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Deliver to every sink. Failures are logged and recorded, never raised.
    pub async fn deliver(&self, listing: &JobListing) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for sink in &self.sinks {
            match sink.deliver(listing).await {
                Ok(()) => {
                    debug!(sink = sink.name(), title = %listing.job_title, "notification delivered");
                    report.delivered.push(sink.name().to_string());
                }
                Err(e) => {
                    warn!(
                        sink = sink.name(),
                        title = %listing.job_title,
                        company = %listing.company,
                        error = %e,
                        "notification delivery failed"
                    );
                    report.failed.push(sink.name().to_string());
                }
            }
        }
        report
    }
}
