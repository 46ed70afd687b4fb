//! Notification sinks for analyzed job listings.
//!
//! Sinks are independent: a failure to deliver to one never prevents delivery
//! to the others, and never fails the job that produced the listing.

pub mod mattermost;
pub mod memory;
pub mod service;
pub mod telegram;

use async_trait::async_trait;
use thiserror::Error;

use jobwatch_core::JobListing;

pub use mattermost::{MattermostConfig, MattermostNotifier};
pub use memory::InMemoryNotifier;
pub use service::{DeliveryReport, NotificationService};
pub use telegram::{TelegramConfig, TelegramNotifier};

/// A destination for job listings (chat webhook, bot, ...).
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    /// Short provider name used in logs.
    fn name(&self) -> &str;

    async fn deliver(&self, listing: &JobListing) -> Result<(), NotifyError>;
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid notifier configuration: {0}")]
    Config(String),

    #[error("delivery request failed: {0}")]
    Transport(String),

    #[error("sink answered with status {status}: {body}")]
    Status { status: u16, body: String },
}

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        NotifyError::Transport(err.to_string())
    }
}

pub(crate) async fn check_status(response: reqwest::Response) -> Result<(), NotifyError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(NotifyError::Status {
        status: status.as_u16(),
        body,
    })
}
