use std::sync::Arc;

use tracing::info;

use jobwatch_ai::{Analyzer, AnalyzerError, OllamaAnalyzer, PromptBuilder, PromptError};
use jobwatch_infra::config::{AppConfig, ConfigError};
use jobwatch_infra::jobs::{JobQueue, JsonLinesStore, QueueError, RecordStore};
use jobwatch_infra::producers::{
    HttpScraper, OrchestratorError, ProducerOrchestrator, ProducerUnit, ScrapeError, Scraper,
};
use jobwatch_infra::scheduler::{Scheduler, SchedulerExit};
use jobwatch_infra::shutdown::ShutdownCoordinator;
use jobwatch_infra::workers::{JobProcessor, PoolError, WorkerPool, WorkerPoolConfig};
use jobwatch_notify::{
    MattermostNotifier, NotificationService, Notifier, NotifyError, TelegramNotifier,
};

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error("analyzer setup failed: {0}")]
    Analyzer(#[from] AnalyzerError),
    #[error("notifier setup failed: {0}")]
    Notify(#[from] NotifyError),
    #[error("scraper setup failed: {0}")]
    Scraper(#[from] ScrapeError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error("expected {expected} scraper/store pairs, got {actual}")]
    UnitCount { expected: usize, actual: usize },
}

/// The external capabilities the pipeline talks to.
pub struct Collaborators {
    pub analyzer: Arc<dyn Analyzer>,
    pub prompt: PromptBuilder,
    pub notifier: NotificationService,
    /// One scraper and store per configured scraper entry, in order.
    pub units: Vec<(Arc<dyn Scraper>, Arc<dyn RecordStore>)>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

impl Collaborators {
    /// Real collaborators: Ollama, HTTP scrapers, JSON-lines stores and the
    /// configured chat sinks. Reads the prompt files once.
    pub fn from_config(config: &AppConfig) -> Result<Self, BuildError> {
        let analysis = &config.match_analysis;
        let analyzer = OllamaAnalyzer::new(analysis.ollama.to_ollama_config())?;
        let prompt = PromptBuilder::from_files(
            &analysis.resume_path,
            analysis.preference_prompt_path.as_deref(),
            analysis.prompt_template_path.as_deref(),
        )?;

        let mut sinks: Vec<Arc<dyn Notifier>> = Vec::new();
        if let Some(mattermost) = &config.push_notification.mattermost {
            sinks.push(Arc::new(MattermostNotifier::new(mattermost.clone())?));
        }
        if let Some(telegram) = &config.push_notification.telegram {
            sinks.push(Arc::new(TelegramNotifier::new(telegram.clone())?));
        }

        let scraping = &config.job_scraper;
        let units = scraping
            .scrapers
            .iter()
            .enumerate()
            .map(|(idx, entry)| {
                let name = entry.resolved_name(idx);
                let scraper: Arc<dyn Scraper> =
                    Arc::new(HttpScraper::new(entry.endpoint.clone(), entry.timeout())?);
                let store: Arc<dyn RecordStore> =
                    Arc::new(JsonLinesStore::new(entry.store_path(&scraping.database, &name)));
                Ok((scraper, store))
            })
            .collect::<Result<Vec<_>, BuildError>>()?;

        Ok(Self {
            analyzer: Arc::new(analyzer),
            prompt,
            notifier: NotificationService::new(sinks),
            units,
        })
    }
}

/// The assembled pipeline, ready to run.
pub struct JobSystem {
    queue: Arc<JobQueue>,
    scheduler: Scheduler,
    processor: Arc<JobProcessor>,
    pool_config: WorkerPoolConfig,
    shutdown: ShutdownCoordinator,
}

impl std::fmt::Debug for JobSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobSystem").finish_non_exhaustive()
    }
}

impl JobSystem {
    pub fn from_config(config: &AppConfig) -> Result<Self, BuildError> {
        Self::new(config, Collaborators::from_config(config)?)
    }

    pub fn new(config: &AppConfig, collaborators: Collaborators) -> Result<Self, BuildError> {
        config.validate()?;

        let scraping = &config.job_scraper;
        if collaborators.units.len() != scraping.scrapers.len() {
            return Err(BuildError::UnitCount {
                expected: scraping.scrapers.len(),
                actual: collaborators.units.len(),
            });
        }

        let queue = Arc::new(JobQueue::new(config.queue.max_size)?);

        let units = scraping
            .scrapers
            .iter()
            .zip(collaborators.units)
            .enumerate()
            .map(|(idx, (entry, (scraper, store)))| {
                ProducerUnit::new(entry.resolved_name(idx), entry.search_params(), scraper, store)
                    .with_blacklist(scraping.scraper_config.title_blacklisted_keywords.clone())
                    .with_retention_days(scraping.database.cleanup_days)
            })
            .collect();
        let orchestrator = ProducerOrchestrator::new(units, config.producer_mode(), queue.clone())?;
        let mode = orchestrator.mode();

        let analysis = &config.match_analysis;
        let processor = JobProcessor::new(
            collaborators.analyzer,
            collaborators.prompt,
            collaborators.notifier,
        )
        .with_retry_policy(analysis.retry_policy())
        .with_rejection_threshold(analysis.rejection_threshold);

        let pool_config = WorkerPoolConfig::default()
            .with_worker_count(analysis.worker_count)
            .with_requeue(analysis.requeue_policy());

        let shutdown = ShutdownCoordinator::new();
        let scheduler = Scheduler::new(
            config.scheduler_config()?,
            orchestrator,
            queue.clone(),
            shutdown.clone(),
        );

        info!(
            scrapers = scraping.scrapers.len(),
            mode = ?mode,
            workers = analysis.worker_count,
            queue_size = config.queue.max_size,
            "job system initialized"
        );

        Ok(Self {
            queue,
            scheduler,
            processor: Arc::new(processor),
            pool_config,
            shutdown,
        })
    }

    /// Handle for requesting shutdown (signals, tests).
    pub fn shutdown_coordinator(&self) -> ShutdownCoordinator {
        self.shutdown.clone()
    }

    pub fn queue(&self) -> Arc<JobQueue> {
        self.queue.clone()
    }

    /// Start the consumers, then drive the scheduling loop until shutdown.
    pub async fn run(self) -> Result<SchedulerExit, BuildError> {
        info!("starting job system");
        let pool = WorkerPool::spawn(self.pool_config, self.queue.clone(), self.processor)?;
        Ok(self.scheduler.run(pool).await)
    }
}
