//! Runs every configured producer unit, one after another or concurrently.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{error, info};

use super::unit::{ProducerReport, ProducerUnit};
use crate::jobs::JobQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum ProducerMode {
    Sequential,
    /// All units at once, at most `max_workers` in flight.
    Parallel { max_workers: usize },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("producer units `{first}` and `{second}` share the store {location}")]
    SharedStore {
        location: String,
        first: String,
        second: String,
    },
    #[error("parallel mode needs max_workers >= 1")]
    ZeroWorkers,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitFailure {
    pub unit: String,
    pub error: String,
}

/// Outcome of one orchestrator pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub succeeded: Vec<ProducerReport>,
    pub failed: Vec<UnitFailure>,
}

impl RunSummary {
    pub fn jobs_enqueued(&self) -> usize {
        self.succeeded.iter().map(|r| r.new).sum()
    }
}

/// Feeds the queue from an ordered set of producer units.
///
/// A failing unit is logged and recorded; it never stops the others.
#[derive(Debug)]
pub struct ProducerOrchestrator {
    units: Vec<Arc<ProducerUnit>>,
    mode: ProducerMode,
    queue: Arc<JobQueue>,
}

impl ProducerOrchestrator {
    pub fn new(
        units: Vec<ProducerUnit>,
        mode: ProducerMode,
        queue: Arc<JobQueue>,
    ) -> Result<Self, OrchestratorError> {
        if mode == (ProducerMode::Parallel { max_workers: 0 }) {
            return Err(OrchestratorError::ZeroWorkers);
        }

        let mut owners: HashMap<String, &str> = HashMap::new();
        for unit in &units {
            let location = unit.store_location();
            if let Some(first) = owners.insert(location.clone(), unit.name()) {
                return Err(OrchestratorError::SharedStore {
                    location,
                    first: first.to_string(),
                    second: unit.name().to_string(),
                });
            }
        }

        Ok(Self {
            units: units.into_iter().map(Arc::new).collect(),
            mode,
            queue,
        })
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn mode(&self) -> ProducerMode {
        self.mode
    }

    /// Run every unit once and wait for all of them.
    pub async fn run_all(&self) -> RunSummary {
        let summary = match self.mode {
            ProducerMode::Sequential => self.run_sequential().await,
            ProducerMode::Parallel { max_workers } => self.run_parallel(max_workers).await,
        };
        info!(
            succeeded = summary.succeeded.len(),
            failed = summary.failed.len(),
            enqueued = summary.jobs_enqueued(),
            "all producers completed"
        );
        summary
    }

    async fn run_sequential(&self) -> RunSummary {
        info!(units = self.units.len(), "running producers sequentially");
        let mut summary = RunSummary::default();
        for (idx, unit) in self.units.iter().enumerate() {
            info!(scraper = unit.name(), position = idx + 1, of = self.units.len(), "starting producer");
            let result = unit.run(&self.queue).await.map_err(|e| e.to_string());
            record(&mut summary, unit.name(), result);
        }
        summary
    }

    async fn run_parallel(&self, max_workers: usize) -> RunSummary {
        info!(units = self.units.len(), max_workers, "running producers in parallel");
        let permits = Arc::new(Semaphore::new(max_workers));

        let handles: Vec<_> = self
            .units
            .iter()
            .map(|unit| {
                let name = unit.name().to_string();
                let unit = Arc::clone(unit);
                let queue = Arc::clone(&self.queue);
                let permits = Arc::clone(&permits);
                let handle = tokio::spawn(async move {
                    let _permit = permits.acquire_owned().await;
                    unit.run(&queue).await
                });
                (name, handle)
            })
            .collect();

        let mut summary = RunSummary::default();
        for (name, handle) in handles {
            let result = match handle.await {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(join_err) => Err(format!("producer task failed: {join_err}")),
            };
            record(&mut summary, &name, result);
        }
        summary
    }
}

fn record(summary: &mut RunSummary, unit: &str, result: Result<ProducerReport, String>) {
    match result {
        Ok(report) => summary.succeeded.push(report),
        Err(error) => {
            error!(scraper = unit, error = %error, "producer failed");
            summary.failed.push(UnitFailure {
                unit: unit.to_string(),
                error,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{Value, json};

    use super::*;
    use crate::jobs::InMemoryRecordStore;
    use crate::producers::scraper::{RawRecord, ScrapeError, Scraper, SearchParams, StaticScraper};

    fn params() -> SearchParams {
        SearchParams {
            site_name: "indeed".into(),
            search_term: "rust".into(),
            location: "Remote".into(),
            results_wanted: 5,
            hours_wanted: 12,
            country: Some("usa".into()),
            fetch_description: false,
        }
    }

    fn records(prefix: &str, n: usize) -> Vec<RawRecord> {
        (0..n)
            .map(|i| match json!({ "job_url": format!("https://{prefix}/{i}"), "title": format!("{prefix} {i}") }) {
                Value::Object(map) => map,
                _ => unreachable!(),
            })
            .collect()
    }

    fn unit(name: &str, scraper: Arc<dyn Scraper>) -> ProducerUnit {
        ProducerUnit::new(name, params(), scraper, Arc::new(InMemoryRecordStore::new(name)))
    }

    /// Tracks how many fetches overlap.
    #[derive(Default)]
    struct ConcurrencyGauge {
        current: std::sync::atomic::AtomicUsize,
        peak: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl Scraper for ConcurrencyGauge {
        async fn fetch(&self, _params: &SearchParams) -> Result<Vec<RawRecord>, ScrapeError> {
            use std::sync::atomic::Ordering;
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    #[test]
    fn shared_store_is_rejected() {
        let store = Arc::new(InMemoryRecordStore::new("shared"));
        let a = ProducerUnit::new("a", params(), Arc::new(StaticScraper::default()), store.clone());
        let b = ProducerUnit::new("b", params(), Arc::new(StaticScraper::default()), store);
        let err = ProducerOrchestrator::new(vec![a, b], ProducerMode::Sequential, Arc::default())
            .unwrap_err();
        assert_eq!(
            err,
            OrchestratorError::SharedStore {
                location: "memory:shared".into(),
                first: "a".into(),
                second: "b".into(),
            }
        );
    }

    #[test]
    fn parallel_mode_needs_a_worker() {
        let err = ProducerOrchestrator::new(
            Vec::new(),
            ProducerMode::Parallel { max_workers: 0 },
            Arc::default(),
        )
        .unwrap_err();
        assert_eq!(err, OrchestratorError::ZeroWorkers);
    }

    #[tokio::test]
    async fn sequential_failure_does_not_stop_later_units() {
        let queue: Arc<JobQueue> = Arc::default();
        let orchestrator = ProducerOrchestrator::new(
            vec![
                unit("a", Arc::new(StaticScraper::failing("captcha"))),
                unit("b", Arc::new(StaticScraper::new(records("b", 2)))),
            ],
            ProducerMode::Sequential,
            queue.clone(),
        )
        .unwrap();

        let summary = orchestrator.run_all().await;

        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].unit, "a");
        assert_eq!(summary.succeeded[0].unit, "b");
        assert_eq!(summary.jobs_enqueued(), 2);
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn parallel_failure_is_isolated() {
        let queue: Arc<JobQueue> = Arc::default();
        let orchestrator = ProducerOrchestrator::new(
            vec![
                unit("a", Arc::new(StaticScraper::failing("timeout"))),
                unit("b", Arc::new(StaticScraper::new(records("b", 3)))),
            ],
            ProducerMode::Parallel { max_workers: 2 },
            queue.clone(),
        )
        .unwrap();

        assert_eq!(orchestrator.mode(), ProducerMode::Parallel { max_workers: 2 });
        let summary = orchestrator.run_all().await;

        assert_eq!(
            summary.failed,
            vec![UnitFailure {
                unit: "a".into(),
                error: "scrape failed: scraper failed: timeout".into(),
            }]
        );
        assert_eq!(summary.succeeded.len(), 1);
        assert_eq!(queue.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn parallel_mode_bounds_concurrency() {
        let gauge = Arc::new(ConcurrencyGauge::default());
        let units = (0..5)
            .map(|i| unit(&format!("u{i}"), gauge.clone()))
            .collect();
        let orchestrator = ProducerOrchestrator::new(
            units,
            ProducerMode::Parallel { max_workers: 2 },
            Arc::default(),
        )
        .unwrap();

        let summary = orchestrator.run_all().await;

        assert_eq!(summary.succeeded.len(), 5);
        assert_eq!(gauge.peak.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
