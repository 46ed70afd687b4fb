//! Telegram bot sink.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use jobwatch_core::JobListing;

use crate::{Notifier, NotifyError, check_status};

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_id: i64,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    config: TelegramConfig,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig) -> Result<Self, NotifyError> {
        if config.token.trim().is_empty() {
            return Err(NotifyError::Config(
                "telegram bot token must be provided".to_string(),
            ));
        }
        Ok(Self {
            config,
            client: reqwest::Client::new(),
        })
    }

    fn send_message_url(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.config.api_base.trim_end_matches('/'),
            self.config.token
        )
    }

    fn message(listing: &JobListing) -> String {
        format!(
            "New Job Posting\n\nJob Title: {}\nCompany: {}\nURL: {}\n\nDescription:\n{}\n\nJustification:\n{}\n",
            listing.job_title,
            listing.company,
            listing.job_posting_url,
            listing.brief_description,
            listing.match_justification,
        )
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn deliver(&self, listing: &JobListing) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(self.send_message_url())
            .json(&json!({
                "chat_id": self.config.chat_id,
                "text": Self::message(listing),
            }))
            .send()
            .await?;
        check_status(response).await
    }
}
