//! The enriched result that is delivered to notification sinks.

use serde::{Deserialize, Serialize};

/// A job posting after analysis.
///
/// Built by a consumer worker from the posting plus the analyzer verdict; the
/// original posting is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobListing {
    pub scrape_site: String,
    pub scrape_name: String,
    pub job_title: String,
    pub company: String,
    pub company_logo_url: Option<String>,
    pub job_posting_url: String,
    pub job_requirements: String,
    pub brief_description: String,
    pub match_justification: String,
    /// Rating label as returned by the analyzer.
    pub rating: String,
    /// `true` when the rating scored at or below the rejection threshold.
    pub rejected: bool,
}
