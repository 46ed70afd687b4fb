//! Producers: scrape, deduplicate, persist, enqueue.

pub mod manager;
pub mod scraper;
pub mod unit;

pub use manager::{OrchestratorError, ProducerMode, ProducerOrchestrator, RunSummary, UnitFailure};
pub use scraper::{HttpScraper, RawRecord, ScrapeError, Scraper, SearchParams, StaticScraper};
pub use unit::{ProducerError, ProducerReport, ProducerUnit};
