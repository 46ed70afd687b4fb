//! Job postings as scraped from a source.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DomainError, DomainResult};
use crate::id::JobUrl;

/// A single discovered job posting.
///
/// Well-known fields are typed; anything else a source returns is kept in
/// `extra` so prompt rendering and storage see the complete record. A posting
/// is never mutated after it has been enqueued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPosting {
    pub job_url: JobUrl,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub company: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_logo: Option<String>,
    /// When this posting was scraped; stamped by the producer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scrape_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_term: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_location: Option<String>,
    /// `"<producer name>:<site>"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JobPosting {
    pub fn new(job_url: JobUrl, title: impl Into<String>, company: impl Into<String>) -> Self {
        Self {
            job_url,
            title: title.into(),
            company: company.into(),
            site: None,
            location: None,
            description: None,
            company_logo: None,
            scrape_date: None,
            search_term: None,
            search_location: None,
            source: None,
            extra: Map::new(),
        }
    }

    /// Build a posting from a loosely-typed source record.
    ///
    /// Sources disagree on types (numbers as strings, `null` vs. missing), so
    /// known fields are coerced to text and empty values become `None`. A
    /// `scrape_date` supplied by the source is ignored; the producer stamps
    /// its own.
    pub fn from_record(mut record: Map<String, Value>) -> DomainResult<Self> {
        let raw_url = take_text(&mut record, "job_url").ok_or(DomainError::MissingField("job_url"))?;
        let job_url = JobUrl::parse(&raw_url)?;
        record.remove("scrape_date");

        Ok(Self {
            job_url,
            title: take_text(&mut record, "title").unwrap_or_default(),
            company: take_text(&mut record, "company").unwrap_or_default(),
            site: take_text(&mut record, "site"),
            location: take_text(&mut record, "location"),
            description: take_text(&mut record, "description"),
            company_logo: take_text(&mut record, "company_logo"),
            scrape_date: None,
            search_term: take_text(&mut record, "search_term"),
            search_location: take_text(&mut record, "search_location"),
            source: take_text(&mut record, "source"),
            extra: record,
        })
    }

    /// Name of the producer that found this posting (the part of `source`
    /// before the colon).
    pub fn source_name(&self) -> Option<&str> {
        self.source.as_deref().map(|s| s.split(':').next().unwrap_or(s))
    }

    /// Whether the title contains any of `keywords`, ignoring case.
    pub fn title_matches_any<S: AsRef<str>>(&self, keywords: &[S]) -> bool {
        let title = self.title.to_lowercase();
        keywords
            .iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .any(|k| !k.is_empty() && title.contains(&k))
    }

    /// Every field of the posting as `(name, text)` pairs, typed fields first.
    pub fn fields(&self) -> Vec<(String, String)> {
        let mut out = vec![
            ("title".to_string(), self.title.clone()),
            ("company".to_string(), self.company.clone()),
            ("job_url".to_string(), self.job_url.to_string()),
        ];
        let optional = [
            ("site", &self.site),
            ("location", &self.location),
            ("search_term", &self.search_term),
            ("search_location", &self.search_location),
            ("source", &self.source),
            ("description", &self.description),
        ];
        for (name, value) in optional {
            if let Some(v) = value {
                out.push((name.to_string(), v.clone()));
            }
        }
        for (name, value) in &self.extra {
            if let Some(text) = value_text(value) {
                out.push((name.clone(), text));
            }
        }
        out
    }
}

fn take_text(record: &mut Map<String, Value>, key: &str) -> Option<String> {
    record.remove(key).as_ref().and_then(value_text)
}

fn value_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    };
    if text.is_empty() { None } else { Some(text) }
}
