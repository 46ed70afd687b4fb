//! Durable record stores, one per producer unit, keyed by canonical URL.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;

use jobwatch_core::JobPosting;

/// Persistence for the postings a producer has already seen.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Human-readable location, used in logs and to detect shared stores.
    fn location(&self) -> String;

    async fn exists(&self) -> Result<bool, StoreError>;

    /// All stored records; an absent store loads as empty.
    async fn load(&self) -> Result<Vec<JobPosting>, StoreError>;

    /// Replace the stored records.
    async fn save(&self, records: &[JobPosting]) -> Result<(), StoreError>;

    /// Drop records scraped before `now - max_age`.
    ///
    /// Returns the remaining records and how many were removed. Records
    /// without a scrape date are kept.
    async fn purge_older_than(
        &self,
        max_age: chrono::Duration,
        now: DateTime<Utc>,
    ) -> Result<(Vec<JobPosting>, usize), StoreError> {
        let records = self.load().await?;
        let (remaining, removed) = split_expired(records, now - max_age);
        if removed > 0 {
            self.save(&remaining).await?;
        }
        Ok((remaining, removed))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt record at {path}:{line}: {source}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("storage error: {0}")]
    Storage(String),
}

fn split_expired(records: Vec<JobPosting>, cutoff: DateTime<Utc>) -> (Vec<JobPosting>, usize) {
    let before = records.len();
    let remaining: Vec<_> = records
        .into_iter()
        .filter(|r| r.scrape_date.is_none_or(|d| d >= cutoff))
        .collect();
    let removed = before - remaining.len();
    (remaining, removed)
}

/// One JSON document per line. Saves go through a temp file and a rename so
/// a crash mid-write never leaves a truncated store.
#[derive(Debug, Clone)]
pub struct JsonLinesStore {
    path: PathBuf,
}

impl JsonLinesStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl RecordStore for JsonLinesStore {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    async fn exists(&self) -> Result<bool, StoreError> {
        tokio::fs::try_exists(&self.path)
            .await
            .map_err(|e| self.io_err(e))
    }

    async fn load(&self) -> Result<Vec<JobPosting>, StoreError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_err(e)),
        };

        text.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(idx, line)| {
                serde_json::from_str(line).map_err(|source| StoreError::Corrupt {
                    path: self.path.clone(),
                    line: idx + 1,
                    source,
                })
            })
            .collect()
    }

    async fn save(&self, records: &[JobPosting]) -> Result<(), StoreError> {
        let mut buf = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buf, record)?;
            buf.push(b'\n');
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_err(e))?;
        }

        let tmp = self.temp_path();
        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(|e| self.io_err(e))?;
        file.write_all(&buf).await.map_err(|e| self.io_err(e))?;
        file.sync_all().await.map_err(|e| self.io_err(e))?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_err(e))
    }
}

/// In-memory store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    name: String,
    records: Mutex<Option<Vec<JobPosting>>>,
}

impl InMemoryRecordStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: Mutex::new(None),
        }
    }

    pub fn with_records(name: impl Into<String>, records: Vec<JobPosting>) -> Self {
        Self {
            name: name.into(),
            records: Mutex::new(Some(records)),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<Vec<JobPosting>>>, StoreError> {
        self.records
            .lock()
            .map_err(|_| StoreError::Storage("record store lock poisoned".to_string()))
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    fn location(&self) -> String {
        format!("memory:{}", self.name)
    }

    async fn exists(&self) -> Result<bool, StoreError> {
        Ok(self.lock()?.is_some())
    }

    async fn load(&self) -> Result<Vec<JobPosting>, StoreError> {
        Ok(self.lock()?.clone().unwrap_or_default())
    }

    async fn save(&self, records: &[JobPosting]) -> Result<(), StoreError> {
        *self.lock()? = Some(records.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobwatch_core::JobUrl;

    fn posting(n: u32, scraped: Option<DateTime<Utc>>) -> JobPosting {
        let mut p = JobPosting::new(
            JobUrl::parse(&format!("https://jobs.example.com/{n}")).unwrap(),
            format!("Job {n}"),
            "Acme",
        );
        p.scrape_date = scraped;
        p
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonLinesStore::new(dir.path().join("nothing.jsonl"));
        assert!(!store.exists().await.unwrap());
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_creates_directories_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonLinesStore::new(dir.path().join("nested/db/jobs.jsonl"));
        let records = vec![posting(1, Some(Utc::now())), posting(2, None)];

        store.save(&records).await.unwrap();

        assert!(store.exists().await.unwrap());
        assert_eq!(store.load().await.unwrap(), records);
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn corrupt_line_reports_its_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.jsonl");
        let good = serde_json::to_string(&posting(1, None)).unwrap();
        std::fs::write(&path, format!("{good}\n\n{{not json\n")).unwrap();

        let err = JsonLinesStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { line: 3, .. }));
    }

    #[tokio::test]
    async fn purge_removes_only_expired_dated_records() {
        let now = Utc::now();
        let store = InMemoryRecordStore::with_records(
            "u",
            vec![
                posting(1, Some(now - chrono::Duration::days(10))),
                posting(2, Some(now - chrono::Duration::days(1))),
                posting(3, None),
            ],
        );

        let (remaining, removed) = store
            .purge_older_than(chrono::Duration::days(7), now)
            .await
            .unwrap();

        assert_eq!(removed, 1);
        let urls: Vec<_> = remaining.iter().map(|p| p.job_url.as_str()).collect();
        assert_eq!(urls, ["https://jobs.example.com/2", "https://jobs.example.com/3"]);
        assert_eq!(store.load().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn in_memory_store_exists_after_first_save() {
        let store = InMemoryRecordStore::new("u");
        assert!(!store.exists().await.unwrap());
        store.save(&[]).await.unwrap();
        assert!(store.exists().await.unwrap());
    }
}
