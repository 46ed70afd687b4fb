//! Strongly-typed identifiers used across the pipeline.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Canonical URL of a job posting.
///
/// This is the deduplication key: two postings with the same `JobUrl` are the
/// same posting, regardless of which source found them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobUrl(String);

impl JobUrl {
    /// Canonicalize a raw URL.
    ///
    /// Surrounding whitespace and any `#fragment` are dropped; fragments never
    /// identify a different posting.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        let without_fragment = match trimmed.find('#') {
            Some(idx) => &trimmed[..idx],
            None => trimmed,
        };

        if without_fragment.is_empty() {
            return Err(DomainError::invalid_id("JobUrl: empty url"));
        }
        if without_fragment.chars().any(char::is_whitespace) {
            return Err(DomainError::invalid_id(format!(
                "JobUrl: url contains whitespace: {without_fragment:?}"
            )));
        }

        Ok(Self(without_fragment.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for JobUrl {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for JobUrl {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for JobUrl {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<JobUrl> for String {
    fn from(value: JobUrl) -> Self {
        value.0
    }
}

/// Identifier of one enqueue event.
///
/// A requeued job gets a fresh `DeliveryId`, which keeps log lines for the
/// two attempts apart. Uses UUIDv7 (time-ordered).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeliveryId(Uuid);

impl DeliveryId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for DeliveryId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}
