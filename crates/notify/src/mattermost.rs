//! Mattermost incoming-webhook sink.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use jobwatch_core::JobListing;

use crate::{Notifier, NotifyError, check_status};

#[derive(Debug, Clone, Deserialize)]
pub struct MattermostConfig {
    pub webhook_url: String,
    /// Fallback display name; each post is normally shown under the company name.
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default)]
    pub channel: Option<String>,
    /// Channel for listings that scored at or below the rejection threshold.
    #[serde(default)]
    pub rejection_channel: Option<String>,
}

fn default_username() -> String {
    "Job Notification Bot".to_string()
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    text: String,
    username: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct MattermostNotifier {
    config: MattermostConfig,
    client: reqwest::Client,
}

impl MattermostNotifier {
    pub fn new(config: MattermostConfig) -> Result<Self, NotifyError> {
        if config.webhook_url.trim().is_empty() {
            return Err(NotifyError::Config(
                "mattermost webhook_url must be provided".to_string(),
            ));
        }
        Ok(Self {
            config,
            client: reqwest::Client::new(),
        })
    }

    fn message(listing: &JobListing) -> String {
        format!(
            "# **{title}**\n\n{url}\n\n**Requirements:**\n{requirements}\n\n**Description:**\n{description}\n\n**Justification:**\n{justification}\n\n**Scrape Name:** {scrape_name}\n",
            title = listing.job_title,
            url = listing.job_posting_url,
            requirements = listing.job_requirements,
            description = listing.brief_description,
            justification = listing.match_justification,
            scrape_name = listing.scrape_name,
        )
    }

    fn payload<'a>(&'a self, listing: &'a JobListing) -> WebhookPayload<'a> {
        let username = if listing.company.is_empty() {
            self.config.username.as_str()
        } else {
            listing.company.as_str()
        };
        let channel = match (&self.config.rejection_channel, listing.rejected) {
            (Some(rejection), true) => Some(rejection.as_str()),
            _ => self.config.channel.as_deref(),
        };
        WebhookPayload {
            text: Self::message(listing),
            username,
            icon_url: listing.company_logo_url.as_deref(),
            channel,
        }
    }
}

#[async_trait]
impl Notifier for MattermostNotifier {
    fn name(&self) -> &str {
        "mattermost"
    }

    async fn deliver(&self, listing: &JobListing) -> Result<(), NotifyError> {
        let payload = self.payload(listing);
        debug!(channel = ?payload.channel, title = %listing.job_title, "posting to mattermost");
        let response = self
            .client
            .post(&self.config.webhook_url)
            .json(&payload)
            .send()
            .await?;
        check_status(response).await
    }
}
