//! The data acquisition capability behind a producer unit.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

/// A raw record as returned by a source. Decoded into a posting by the
/// producer.
pub type RawRecord = Map<String, Value>;

/// Search parameters for one producer unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchParams {
    pub site_name: String,
    pub search_term: String,
    pub location: String,
    pub results_wanted: u32,
    #[serde(rename = "hours_old")]
    pub hours_wanted: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    pub fetch_description: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("scrape request failed: {0}")]
    Transport(String),
    #[error("scrape endpoint answered with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("scrape response is not a JSON array of records: {0}")]
    Decode(String),
    #[error("scraper failed: {0}")]
    Other(String),
}

impl From<reqwest::Error> for ScrapeError {
    fn from(err: reqwest::Error) -> Self {
        ScrapeError::Transport(err.to_string())
    }
}

/// Returns raw records for a search. Any fetch engine will do.
#[async_trait]
pub trait Scraper: Send + Sync + 'static {
    async fn fetch(&self, params: &SearchParams) -> Result<Vec<RawRecord>, ScrapeError>;
}

/// Scraper backed by an HTTP search service.
///
/// Issues `GET <endpoint>?site_name=..&search_term=..` and expects a JSON
/// array of objects back.
#[derive(Debug, Clone)]
pub struct HttpScraper {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpScraper {
    pub fn new(endpoint: impl Into<String>, timeout: std::time::Duration) -> Result<Self, ScrapeError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }
}

#[async_trait]
impl Scraper for HttpScraper {
    async fn fetch(&self, params: &SearchParams) -> Result<Vec<RawRecord>, ScrapeError> {
        debug!(endpoint = %self.endpoint, site = %params.site_name, "fetching search results");
        let response = self
            .client
            .get(&self.endpoint)
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScrapeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| ScrapeError::Decode(e.to_string()))?;
        match value {
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(map) => Ok(map),
                    other => Err(ScrapeError::Decode(format!("expected object, got {other}"))),
                })
                .collect(),
            other => Err(ScrapeError::Decode(format!("expected array, got {other}"))),
        }
    }
}

/// Scraper that returns fixed records (tests/dry runs).
#[derive(Debug, Default)]
pub struct StaticScraper {
    records: Vec<RawRecord>,
    failure: Option<String>,
    calls: Mutex<u32>,
}

impl StaticScraper {
    pub fn new(records: Vec<RawRecord>) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }

    /// A scraper whose every fetch fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Number of fetches so far.
    pub fn calls(&self) -> u32 {
        self.calls.lock().map(|c| *c).unwrap_or_default()
    }
}

#[async_trait]
impl Scraper for StaticScraper {
    async fn fetch(&self, _params: &SearchParams) -> Result<Vec<RawRecord>, ScrapeError> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls += 1;
        }
        match &self.failure {
            Some(message) => Err(ScrapeError::Other(message.clone())),
            None => Ok(self.records.clone()),
        }
    }
}
