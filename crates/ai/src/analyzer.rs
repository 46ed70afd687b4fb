use async_trait::async_trait;
use thiserror::Error;

/// A remote model that turns a prompt into (JSON) text.
///
/// Implementations must classify failures: anything worth retrying is
/// reported through a variant for which [`AnalyzerError::is_transient`] holds.
#[async_trait]
pub trait Analyzer: Send + Sync + 'static {
    async fn invoke(&self, prompt: &str) -> Result<String, AnalyzerError>;
}

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("model call timed out")]
    Timeout,

    /// Endpoint unreachable, overloaded (429) or failing (5xx).
    #[error("model endpoint unavailable: {0}")]
    Unavailable(String),

    /// The endpoint answered, but not with a usable body.
    #[error("malformed model response: {0}")]
    MalformedResponse(String),

    /// The endpoint refused the request (4xx other than 429).
    #[error("model endpoint rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("analyzer error: {0}")]
    Internal(String),
}

impl AnalyzerError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AnalyzerError::Timeout
                | AnalyzerError::Unavailable(_)
                | AnalyzerError::MalformedResponse(_)
        )
    }
}
