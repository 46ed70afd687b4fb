//! Configuration loading and representation.
//!
//! A YAML file layered with `JOBWATCH__<SECTION>__<KEY>` environment
//! overrides, deserialized into typed sections and validated before any
//! component is built.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Environment, File, FileFormat};
use serde::Deserialize;

use jobwatch_ai::OllamaConfig;
use jobwatch_notify::{MattermostConfig, TelegramConfig};
use jobwatch_observability::LoggingConfig;

use crate::jobs::{RequeuePolicy, RetryPolicy};
use crate::producers::{ProducerMode, SearchParams};
use crate::scheduler::{BlockedPeriod, BlockedPeriodError, SchedulerConfig};
use crate::workers::DEFAULT_REJECTION_THRESHOLD;

pub const ENV_PREFIX: &str = "JOBWATCH";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("invalid configuration: {0}")]
    BlockedPeriod(#[from] BlockedPeriodError),
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub job_scraper: JobScraperConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub match_analysis: MatchAnalysisConfig,
    #[serde(default)]
    pub push_notification: PushNotificationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobScraperConfig {
    #[serde(default)]
    pub scraper_config: ScraperSettings,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scrapers: Vec<ScraperEntry>,
}

/// Settings shared by every producer unit.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScraperSettings {
    /// Seconds between cycles; unset or 0 loops immediately.
    pub run_interval: Option<u64>,
    pub parallel: bool,
    /// Concurrency cap in parallel mode; defaults to the number of scrapers.
    pub max_workers: Option<usize>,
    /// `"HHMM-HHMM"`, local time.
    pub blocked_period: String,
    pub title_blacklisted_keywords: Vec<String>,
}

impl Default for ScraperSettings {
    fn default() -> Self {
        Self {
            run_interval: None,
            parallel: false,
            max_workers: None,
            blocked_period: "0000-0000".to_string(),
            title_blacklisted_keywords: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Directory holding one store per scraper unless a unit sets its own
    /// `store_path`.
    pub directory: PathBuf,
    /// Retention window in days; 0 keeps records forever.
    pub cleanup_days: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("data"),
            cleanup_days: 0,
        }
    }
}

/// One producer unit.
#[derive(Debug, Clone, Deserialize)]
pub struct ScraperEntry {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub site_name: String,
    #[serde(default)]
    pub search_term: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub results_wanted: u32,
    #[serde(default)]
    pub hours_wanted: u32,
    /// Search service queried by the HTTP scraper.
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub store_path: Option<PathBuf>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default = "default_true")]
    pub fetch_description: bool,
    #[serde(default = "default_scrape_timeout")]
    pub timeout_seconds: u64,
}

fn default_true() -> bool {
    true
}

fn default_scrape_timeout() -> u64 {
    300
}

impl ScraperEntry {
    /// Configured name, or `scraper_<position>` (1-based).
    pub fn resolved_name(&self, index: usize) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("scraper_{}", index + 1),
        }
    }

    pub fn store_path(&self, database: &DatabaseConfig, name: &str) -> PathBuf {
        self.store_path
            .clone()
            .unwrap_or_else(|| database.directory.join(format!("{name}.jsonl")))
    }

    pub fn search_params(&self) -> SearchParams {
        SearchParams {
            site_name: self.site_name.clone(),
            search_term: self.search_term.clone(),
            location: self.location.clone(),
            results_wanted: self.results_wanted,
            hours_wanted: self.hours_wanted,
            country: self.country.clone(),
            fetch_description: self.fetch_description,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub max_size: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_size: crate::jobs::queue::DEFAULT_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchAnalysisConfig {
    pub worker_count: usize,
    /// Analyzer attempts per delivery.
    pub max_retries: u32,
    /// Seconds between local retries.
    pub retry_delay: u64,
    pub max_requeues: u32,
    pub rejection_threshold: u8,
    pub resume_path: PathBuf,
    pub preference_prompt_path: Option<PathBuf>,
    pub prompt_template_path: Option<PathBuf>,
    pub ollama: OllamaSettings,
}

impl Default for MatchAnalysisConfig {
    fn default() -> Self {
        Self {
            worker_count: 1,
            max_retries: 3,
            retry_delay: 5,
            max_requeues: 1,
            rejection_threshold: DEFAULT_REJECTION_THRESHOLD,
            resume_path: PathBuf::from("resume.txt"),
            preference_prompt_path: None,
            prompt_template_path: None,
            ollama: OllamaSettings::default(),
        }
    }
}

impl MatchAnalysisConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.max_retries, Duration::from_secs(self.retry_delay))
    }

    pub fn requeue_policy(&self) -> RequeuePolicy {
        RequeuePolicy {
            max_requeues: self.max_requeues,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OllamaSettings {
    pub model: String,
    pub endpoint: String,
    pub temperature: f64,
    pub top_k: u32,
    pub top_p: f64,
    pub timeout_seconds: u64,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        let defaults = OllamaConfig::new("gemma3:12b");
        Self {
            model: defaults.model,
            endpoint: defaults.endpoint,
            temperature: defaults.temperature,
            top_k: defaults.top_k,
            top_p: defaults.top_p,
            timeout_seconds: defaults.timeout.as_secs(),
        }
    }
}

impl OllamaSettings {
    pub fn to_ollama_config(&self) -> OllamaConfig {
        let mut config = OllamaConfig::new(self.model.clone())
            .with_endpoint(self.endpoint.clone())
            .with_timeout(Duration::from_secs(self.timeout_seconds));
        config.temperature = self.temperature;
        config.top_k = self.top_k;
        config.top_p = self.top_p;
        config
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushNotificationConfig {
    #[serde(default)]
    pub mattermost: Option<MattermostConfig>,
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
}

impl PushNotificationConfig {
    pub fn is_empty(&self) -> bool {
        self.mattermost.is_none() && self.telegram.is_none()
    }
}

impl AppConfig {
    /// Load `path` (YAML) plus environment overrides, then validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config: Self = config::Config::builder()
            .add_source(File::from(path).format(FileFormat::Yaml))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse YAML text plus environment overrides, then validate.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = config::Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let scraping = &self.job_scraper;
        if scraping.scrapers.is_empty() {
            return Err(invalid("job_scraper.scrapers must list at least one scraper"));
        }

        let mut stores: HashMap<PathBuf, String> = HashMap::new();
        for (idx, entry) in scraping.scrapers.iter().enumerate() {
            let name = entry.resolved_name(idx);
            let required = [
                ("site_name", &entry.site_name),
                ("search_term", &entry.search_term),
                ("location", &entry.location),
                ("endpoint", &entry.endpoint),
            ];
            for (field, value) in required {
                if value.trim().is_empty() {
                    return Err(invalid(format!(
                        "missing required field '{field}' in scraper configuration for {name}"
                    )));
                }
            }
            if entry.results_wanted == 0 {
                return Err(invalid(format!("results_wanted must be at least 1 for {name}")));
            }

            let store = entry.store_path(&scraping.database, &name);
            if let Some(owner) = stores.insert(store.clone(), name.clone()) {
                return Err(invalid(format!(
                    "scrapers {owner} and {name} share the store {}",
                    store.display()
                )));
            }
        }

        if scraping.scraper_config.max_workers == Some(0) {
            return Err(invalid("job_scraper.scraper_config.max_workers must be at least 1"));
        }
        self.blocked_period()?;

        if self.queue.max_size == 0 {
            return Err(invalid("queue.max_size must be at least 1"));
        }
        if self.match_analysis.worker_count == 0 {
            return Err(invalid("match_analysis.worker_count must be at least 1"));
        }
        if self.push_notification.is_empty() {
            return Err(invalid("no notification providers configured under push_notification"));
        }
        Ok(())
    }

    pub fn blocked_period(&self) -> Result<BlockedPeriod, BlockedPeriodError> {
        self.job_scraper.scraper_config.blocked_period.parse()
    }

    pub fn producer_mode(&self) -> ProducerMode {
        let settings = &self.job_scraper.scraper_config;
        if settings.parallel {
            ProducerMode::Parallel {
                max_workers: settings
                    .max_workers
                    .unwrap_or(self.job_scraper.scrapers.len())
                    .max(1),
            }
        } else {
            ProducerMode::Sequential
        }
    }

    pub fn scheduler_config(&self) -> Result<SchedulerConfig, ConfigError> {
        Ok(SchedulerConfig {
            run_interval: self
                .job_scraper
                .scraper_config
                .run_interval
                .map(Duration::from_secs),
            blocked_period: self.blocked_period()?,
        })
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}
