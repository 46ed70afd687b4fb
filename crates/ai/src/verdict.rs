//! Structured verdicts returned by the model.

use serde_json::Value;
use thiserror::Error;

use jobwatch_core::{JobListing, JobPosting, rating_score};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerdictError {
    /// The model output is not valid JSON.
    #[error("model output is not valid JSON: {0}")]
    Malformed(String),

    /// Valid JSON, but an expected field is absent or null.
    #[error("model output is missing `{0}`")]
    MissingField(&'static str),
}

/// Parsed model verdict for one posting.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub role_requirements: String,
    pub role_summary: String,
    pub rating: String,
    /// Free-form score as emitted by the model (number or text).
    pub score: String,
    pub summary: String,
}

impl Verdict {
    /// Parse the model's JSON text.
    ///
    /// Expected shape:
    /// `{"analysis": {"role_requirements", "role_summary"},
    ///   "overall_match": {"rating", "score", "summary"}}`.
    /// List values are joined with `", "`.
    pub fn parse(text: &str) -> Result<Self, VerdictError> {
        let root: Value =
            serde_json::from_str(text).map_err(|e| VerdictError::Malformed(e.to_string()))?;

        Ok(Self {
            role_requirements: field(&root, "/analysis/role_requirements", "analysis.role_requirements")?,
            role_summary: field(&root, "/analysis/role_summary", "analysis.role_summary")?,
            rating: field(&root, "/overall_match/rating", "overall_match.rating")?,
            score: field(&root, "/overall_match/score", "overall_match.score")?,
            summary: field(&root, "/overall_match/summary", "overall_match.summary")?,
        })
    }

    /// Ordinal score of the rating label.
    pub fn rating_score(&self) -> u8 {
        rating_score(&self.rating)
    }

    pub fn justification(&self) -> String {
        format!("Match: {} - {}\n{}", self.rating, self.score, self.summary)
    }

    /// A posting is rejected when its rating scores at or below `threshold`.
    pub fn is_rejected(&self, threshold: u8) -> bool {
        self.rating_score() <= threshold
    }

    /// Combine the verdict with the posting it was computed for.
    pub fn into_listing(self, posting: &JobPosting, rejection_threshold: u8) -> JobListing {
        let rejected = self.is_rejected(rejection_threshold);
        let justification = self.justification();
        JobListing {
            scrape_site: posting.site.clone().unwrap_or_default(),
            scrape_name: posting.source_name().unwrap_or_default().to_string(),
            job_title: posting.title.clone(),
            company: posting.company.clone(),
            company_logo_url: posting.company_logo.clone(),
            job_posting_url: posting.job_url.to_string(),
            job_requirements: self.role_requirements,
            brief_description: self.role_summary,
            match_justification: justification,
            rating: self.rating,
            rejected,
        }
    }
}

fn field(root: &Value, pointer: &str, name: &'static str) -> Result<String, VerdictError> {
    match root.pointer(pointer) {
        None | Some(Value::Null) => Err(VerdictError::MissingField(name)),
        Some(Value::String(s)) => Ok(s.trim().to_string()),
        Some(Value::Array(items)) => Ok(items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", ")),
        Some(other) => Ok(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobwatch_core::JobUrl;

    const GOOD: &str = r#"{
        "analysis": {
            "role_requirements": ["Rust", "Kafka"],
            "role_summary": "Build streaming systems."
        },
        "overall_match": { "rating": "Strong", "score": 78, "summary": "Solid fit." }
    }"#;

    #[test]
    fn parses_complete_verdict() {
        let verdict = Verdict::parse(GOOD).unwrap();
        assert_eq!(verdict.role_requirements, "Rust, Kafka");
        assert_eq!(verdict.score, "78");
        assert_eq!(verdict.rating_score(), 4);
        assert_eq!(verdict.justification(), "Match: Strong - 78\nSolid fit.");
    }

    #[test]
    fn invalid_json_is_malformed() {
        assert!(matches!(
            Verdict::parse("Sure! Here is the JSON:"),
            Err(VerdictError::Malformed(_))
        ));
    }

    #[test]
    fn absent_or_null_field_is_missing() {
        let missing = r#"{"analysis": {"role_requirements": "x", "role_summary": "y"}}"#;
        assert_eq!(
            Verdict::parse(missing),
            Err(VerdictError::MissingField("overall_match.rating"))
        );

        let null = r#"{"analysis": {"role_requirements": null, "role_summary": "y"}}"#;
        assert_eq!(
            Verdict::parse(null),
            Err(VerdictError::MissingField("analysis.role_requirements"))
        );
    }

    #[test]
    fn rejection_is_inclusive_of_threshold() {
        let mut verdict = Verdict::parse(GOOD).unwrap();
        verdict.rating = "MARGINAL".into();
        assert!(verdict.is_rejected(2));
        verdict.rating = "COMPETITIVE".into();
        assert!(!verdict.is_rejected(2));
        verdict.rating = "gibberish".into();
        assert!(verdict.is_rejected(0));
    }

    #[test]
    fn listing_carries_posting_identity() {
        let mut posting = JobPosting::new(
            JobUrl::parse("https://jobs.example.com/9").unwrap(),
            "Platform Engineer",
            "Initech",
        );
        posting.site = Some("indeed".into());
        posting.source = Some("platform_remote:indeed".into());

        let listing = Verdict::parse(GOOD).unwrap().into_listing(&posting, 2);
        assert_eq!(listing.job_posting_url, "https://jobs.example.com/9");
        assert_eq!(listing.scrape_name, "platform_remote");
        assert_eq!(listing.scrape_site, "indeed");
        assert!(!listing.rejected);
    }
}
