//! Enrichment of a single job: prompt, analyzer call, verdict, notification.

use std::sync::Arc;

use tracing::{info, warn};

use jobwatch_ai::{Analyzer, AnalyzerError, PromptBuilder, PromptError, Verdict, VerdictError};
use jobwatch_core::{JobListing, JobPosting};
use jobwatch_notify::NotificationService;

use crate::jobs::{QueuedJob, RetryPolicy};

pub const DEFAULT_REJECTION_THRESHOLD: u8 = 2;

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),
    #[error(transparent)]
    Verdict(#[from] VerdictError),
    #[error(transparent)]
    Prompt(#[from] PromptError),
}

impl ProcessError {
    /// Failures worth another delivery of the same job: malformed or
    /// incomplete model output and transient endpoint trouble.
    pub fn is_recoverable(&self) -> bool {
        match self {
            ProcessError::Analyzer(e) => e.is_transient(),
            ProcessError::Verdict(_) => true,
            ProcessError::Prompt(_) => false,
        }
    }
}

/// Turns a queued posting into a delivered listing.
pub struct JobProcessor {
    analyzer: Arc<dyn Analyzer>,
    prompt: PromptBuilder,
    notifier: NotificationService,
    retry: RetryPolicy,
    rejection_threshold: u8,
}

impl std::fmt::Debug for JobProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobProcessor")
            .field("notifier", &self.notifier)
            .field("retry", &self.retry)
            .field("rejection_threshold", &self.rejection_threshold)
            .finish_non_exhaustive()
    }
}

impl JobProcessor {
    pub fn new(analyzer: Arc<dyn Analyzer>, prompt: PromptBuilder, notifier: NotificationService) -> Self {
        Self {
            analyzer,
            prompt,
            notifier,
            retry: RetryPolicy::default(),
            rejection_threshold: DEFAULT_REJECTION_THRESHOLD,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_rejection_threshold(mut self, threshold: u8) -> Self {
        self.rejection_threshold = threshold;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// One analyzer round trip, no retries.
    pub async fn analyze(&self, posting: &JobPosting) -> Result<JobListing, ProcessError> {
        let prompt = self.prompt.render(posting)?;
        let text = self.analyzer.invoke(&prompt).await?;
        let verdict = Verdict::parse(&text)?;
        Ok(verdict.into_listing(posting, self.rejection_threshold))
    }

    /// `analyze`, retried in place with a fixed delay.
    ///
    /// Returns the last error once the local attempts are used up.
    pub async fn analyze_with_retry(&self, job: &QueuedJob) -> Result<JobListing, ProcessError> {
        let mut attempt = 1;
        loop {
            info!(
                title = %job.title(),
                company = %job.company(),
                attempt,
                delivery = job.delivery_count,
                "processing job"
            );
            match self.analyze(&job.posting).await {
                Ok(listing) => return Ok(listing),
                Err(e) if self.retry.should_retry(attempt) => {
                    warn!(
                        title = %job.title(),
                        company = %job.company(),
                        attempt,
                        error = %e,
                        retry_in_ms = self.retry.delay.as_millis() as u64,
                        "attempt failed, retrying"
                    );
                    tokio::time::sleep(self.retry.delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Analyze (with retries) and notify. Delivery failures are logged by
    /// the notification service and never fail the job.
    pub async fn process(&self, job: &QueuedJob) -> Result<JobListing, ProcessError> {
        let listing = self.analyze_with_retry(job).await?;
        let report = self.notifier.deliver(&listing).await;
        if !report.all_delivered() {
            warn!(
                title = %job.title(),
                company = %job.company(),
                failed = ?report.failed,
                "listing not delivered to every sink"
            );
        }
        Ok(listing)
    }
}
