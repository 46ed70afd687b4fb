//! A single producer: one search against one source, with its own store.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use jobwatch_core::{JobPosting, JobUrl};

use super::scraper::{ScrapeError, Scraper, SearchParams};
use crate::jobs::{JobQueue, QueueError, QueuedJob, RecordStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ProducerError {
    #[error("scrape failed: {0}")]
    Scrape(#[from] ScrapeError),
    #[error("record store failed: {0}")]
    Store(#[from] StoreError),
    #[error("enqueue failed: {0}")]
    Queue(#[from] QueueError),
}

/// Counters for one producer run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProducerReport {
    pub unit: String,
    pub fetched: usize,
    /// Records without a usable URL, plus duplicates within the fetch.
    pub discarded: usize,
    /// Dropped by the title blacklist.
    pub filtered: usize,
    pub new: usize,
    pub purged: usize,
}

/// Configuration plus collaborators for one search.
///
/// A unit exclusively owns its store; the orchestrator configuration rejects
/// units that share one.
pub struct ProducerUnit {
    name: String,
    params: SearchParams,
    scraper: Arc<dyn Scraper>,
    store: Arc<dyn RecordStore>,
    blacklist: Vec<String>,
    retention: Option<chrono::Duration>,
}

impl std::fmt::Debug for ProducerUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProducerUnit")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("store", &self.store.location())
            .field("blacklist", &self.blacklist)
            .field("retention", &self.retention)
            .finish()
    }
}

impl ProducerUnit {
    pub fn new(
        name: impl Into<String>,
        params: SearchParams,
        scraper: Arc<dyn Scraper>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            name: name.into(),
            params,
            scraper,
            store,
            blacklist: Vec::new(),
            retention: None,
        }
    }

    /// Case-insensitive title keywords to drop. Empty keeps everything.
    pub fn with_blacklist(mut self, keywords: Vec<String>) -> Self {
        self.blacklist = keywords;
        self
    }

    /// Purge stored records older than `days`; 0 disables purging.
    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention = (days > 0).then(|| chrono::Duration::days(i64::from(days)));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store_location(&self) -> String {
        self.store.location()
    }

    /// Fetch, filter, reconcile against the store, persist and purge.
    ///
    /// Returns the postings not seen before, in fetch order.
    pub async fn collect(
        &self,
        now: DateTime<Utc>,
    ) -> Result<(Vec<JobPosting>, ProducerReport), ProducerError> {
        let mut report = ProducerReport {
            unit: self.name.clone(),
            ..Default::default()
        };

        info!(
            scraper = %self.name,
            site = %self.params.site_name,
            search_term = %self.params.search_term,
            location = %self.params.location,
            results_wanted = self.params.results_wanted,
            "scraping"
        );
        let raw = self.scraper.fetch(&self.params).await?;
        report.fetched = raw.len();

        let mut seen = HashSet::new();
        let mut fetched = Vec::with_capacity(raw.len());
        for record in raw {
            let posting = match JobPosting::from_record(record) {
                Ok(p) => p,
                Err(e) => {
                    warn!(scraper = %self.name, error = %e, "discarding unusable record");
                    report.discarded += 1;
                    continue;
                }
            };
            if !seen.insert(posting.job_url.clone()) {
                report.discarded += 1;
                continue;
            }
            if posting.title_matches_any(self.blacklist.as_slice()) {
                debug!(scraper = %self.name, title = %posting.title, "title blacklisted");
                report.filtered += 1;
                continue;
            }
            fetched.push(self.stamp(posting, now));
        }

        let existing = self.store.load().await?;
        let known: HashSet<&JobUrl> = existing.iter().map(|p| &p.job_url).collect();
        let new: Vec<JobPosting> = fetched
            .into_iter()
            .filter(|p| !known.contains(&p.job_url))
            .collect();
        report.new = new.len();

        if !new.is_empty() || !self.store.exists().await? {
            let mut merged = existing;
            merged.extend(new.iter().cloned());
            self.store.save(&merged).await?;
        }

        if let Some(window) = self.retention {
            let (_, purged) = self.store.purge_older_than(window, now).await?;
            report.purged = purged;
        }

        info!(
            scraper = %self.name,
            fetched = report.fetched,
            filtered = report.filtered,
            new = report.new,
            purged = report.purged,
            store = %self.store.location(),
            "scrape reconciled"
        );
        Ok((new, report))
    }

    /// `collect`, then enqueue every new posting, waiting on backpressure.
    pub async fn run(&self, queue: &JobQueue) -> Result<ProducerReport, ProducerError> {
        let (new, report) = self.collect(Utc::now()).await?;
        for posting in new {
            debug!(scraper = %self.name, title = %posting.title, company = %posting.company, "enqueueing");
            queue.enqueue(QueuedJob::new(posting)).await?;
        }
        Ok(report)
    }

    fn stamp(&self, mut posting: JobPosting, now: DateTime<Utc>) -> JobPosting {
        posting.scrape_date = Some(now);
        posting.search_term = Some(self.params.search_term.clone());
        posting.search_location = Some(self.params.location.clone());
        posting.source = Some(format!("{}:{}", self.name, self.params.site_name));
        if posting.site.is_none() {
            posting.site = Some(self.params.site_name.clone());
        }
        posting
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::InMemoryRecordStore;
    use crate::producers::scraper::{RawRecord, StaticScraper};
    use serde_json::{Value, json};

    fn params() -> SearchParams {
        SearchParams {
            site_name: "linkedin".into(),
            search_term: "rust".into(),
            location: "Singapore".into(),
            results_wanted: 10,
            hours_wanted: 24,
            country: None,
            fetch_description: false,
        }
    }

    fn record(url: &str, title: &str) -> RawRecord {
        match json!({ "job_url": url, "title": title, "company": "Acme" }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn unit(records: Vec<RawRecord>, store: Arc<InMemoryRecordStore>) -> ProducerUnit {
        ProducerUnit::new(
            "backend_sg",
            params(),
            Arc::new(StaticScraper::new(records)),
            store,
        )
    }

    #[tokio::test]
    async fn only_unseen_postings_are_emitted() {
        let store = Arc::new(InMemoryRecordStore::new("u"));
        let unit = unit(
            vec![record("https://x/1", "A"), record("https://x/2", "B")],
            store.clone(),
        );

        let (first, report) = unit.collect(Utc::now()).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(report.new, 2);

        let (second, report) = unit.collect(Utc::now()).await.unwrap();
        assert!(second.is_empty());
        assert_eq!(report.fetched, 2);
        assert_eq!(store.load().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn postings_are_stamped_with_search_metadata() {
        let store = Arc::new(InMemoryRecordStore::new("u"));
        let now = Utc::now();
        let (new, _) = unit(vec![record("https://x/1", "A")], store)
            .collect(now)
            .await
            .unwrap();

        let p = &new[0];
        assert_eq!(p.scrape_date, Some(now));
        assert_eq!(p.source.as_deref(), Some("backend_sg:linkedin"));
        assert_eq!(p.search_term.as_deref(), Some("rust"));
        assert_eq!(p.search_location.as_deref(), Some("Singapore"));
        assert_eq!(p.site.as_deref(), Some("linkedin"));
    }

    #[tokio::test]
    async fn blacklist_duplicates_and_bad_records_are_dropped() {
        let store = Arc::new(InMemoryRecordStore::new("u"));
        let mut bad = record("x", "no url");
        bad.remove("job_url");
        let unit = unit(
            vec![
                record("https://x/1", "Senior Engineer"),
                record("https://x/2", "Engineer"),
                record("https://x/2#dup", "Engineer again"),
                bad,
            ],
            store,
        )
        .with_blacklist(vec!["senior".into()]);

        let (new, report) = unit.collect(Utc::now()).await.unwrap();

        assert_eq!(new.len(), 1);
        assert_eq!(new[0].title, "Engineer");
        assert_eq!(report.filtered, 1);
        assert_eq!(report.discarded, 2);
    }

    #[tokio::test]
    async fn retention_purges_old_records() {
        let now = Utc::now();
        let mut old = JobPosting::new(JobUrl::parse("https://x/old").unwrap(), "Old", "Acme");
        old.scrape_date = Some(now - chrono::Duration::days(30));
        let store = Arc::new(InMemoryRecordStore::with_records("u", vec![old]));

        let (_, report) = unit(vec![record("https://x/1", "A")], store.clone())
            .with_retention_days(7)
            .collect(now)
            .await
            .unwrap();

        assert_eq!(report.purged, 1);
        let stored = store.load().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].job_url.as_str(), "https://x/1");
    }

    #[tokio::test]
    async fn run_enqueues_new_postings_in_fetch_order() {
        let queue = JobQueue::new(10).unwrap();
        let store = Arc::new(InMemoryRecordStore::new("u"));
        let unit = unit(
            vec![record("https://x/1", "A"), record("https://x/2", "B")],
            store,
        );

        unit.run(&queue).await.unwrap();

        let tick = std::time::Duration::from_millis(10);
        assert_eq!(queue.dequeue(tick).await.unwrap().title(), "A");
        assert_eq!(queue.dequeue(tick).await.unwrap().title(), "B");
    }

    #[tokio::test]
    async fn store_is_created_even_when_nothing_is_new() {
        let store = Arc::new(InMemoryRecordStore::new("u"));
        unit(Vec::new(), store.clone()).collect(Utc::now()).await.unwrap();
        assert!(store.exists().await.unwrap());
    }
}
