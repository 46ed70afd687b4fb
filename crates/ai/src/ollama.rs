//! Ollama `/api/generate` client.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::analyzer::{Analyzer, AnalyzerError};

/// Model + sampling parameters for an Ollama endpoint.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub model: String,
    pub endpoint: String,
    pub temperature: f64,
    pub top_k: u32,
    pub top_p: f64,
    pub num_predict: u32,
    pub num_ctx: u32,
    pub timeout: Duration,
}

impl OllamaConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            endpoint: "http://localhost:11434".to_string(),
            temperature: 1.0,
            top_k: 64,
            top_p: 0.95,
            num_predict: 8192,
            num_ctx: 6144,
            timeout: Duration::from_secs(180),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

/// [`Analyzer`] backed by a (local or remote) Ollama server.
///
/// Requests JSON-formatted output (`format: "json"`) without streaming.
#[derive(Debug, Clone)]
pub struct OllamaAnalyzer {
    config: OllamaConfig,
    client: reqwest::Client,
}

impl OllamaAnalyzer {
    pub fn new(config: OllamaConfig) -> Result<Self, AnalyzerError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AnalyzerError::Internal(format!("failed to build http client: {e}")))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.config.endpoint.trim_end_matches('/'))
    }
}

#[async_trait]
impl Analyzer for OllamaAnalyzer {
    async fn invoke(&self, prompt: &str) -> Result<String, AnalyzerError> {
        let payload = json!({
            "model": self.config.model,
            "prompt": prompt,
            "stream": false,
            "format": "json",
            "options": {
                "temperature": self.config.temperature,
                "top_k": self.config.top_k,
                "top_p": self.config.top_p,
                "num_predict": self.config.num_predict,
                "num_ctx": self.config.num_ctx,
            },
        });

        debug!(model = %self.config.model, prompt_len = prompt.len(), "invoking model");

        let response = self
            .client
            .post(self.generate_url())
            .json(&payload)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(AnalyzerError::Unavailable(format!("status {status}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalyzerError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(classify_transport_error)?;

        body.response
            .ok_or_else(|| AnalyzerError::MalformedResponse("missing `response` field".to_string()))
    }
}

fn classify_transport_error(err: reqwest::Error) -> AnalyzerError {
    if err.is_timeout() {
        AnalyzerError::Timeout
    } else if err.is_connect() || err.is_request() {
        AnalyzerError::Unavailable(err.to_string())
    } else if err.is_decode() || err.is_body() {
        AnalyzerError::MalformedResponse(err.to_string())
    } else {
        AnalyzerError::Internal(err.to_string())
    }
}
