//! End-to-end tests for the pipeline.
//!
//! Tests: Scheduler → ProducerOrchestrator → JobQueue → WorkerPool → Notifier
//!
//! Verifies:
//! - Backpressure holds producers until a worker frees a slot
//! - A requested shutdown drains every accepted job
//! - A second signal abandons the drain
//! - The blocked period and run interval gate producer runs
//! - Repeated blocked cycles are counted, not re-announced

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::NaiveTime;
    use serde_json::{Value, json};

    use jobwatch_ai::{Analyzer, AnalyzerError, PromptBuilder};
    use jobwatch_notify::{InMemoryNotifier, NotificationService};

    use crate::jobs::{InMemoryRecordStore, JobQueue, RetryPolicy};
    use crate::producers::{
        ProducerMode, ProducerOrchestrator, ProducerUnit, RawRecord, SearchParams, StaticScraper,
    };
    use crate::scheduler::{BlockedPeriod, LoopState, Scheduler, SchedulerConfig, SchedulerExit};
    use crate::shutdown::{ShutdownCoordinator, Signal};
    use crate::workers::processor::test_support::ScriptedAnalyzer;
    use crate::workers::{JobProcessor, WorkerPool, WorkerPoolConfig};

    /// Analyzer that never answers.
    struct HangingAnalyzer;

    #[async_trait]
    impl Analyzer for HangingAnalyzer {
        async fn invoke(&self, _prompt: &str) -> Result<String, AnalyzerError> {
            std::future::pending().await
        }
    }

    fn params() -> SearchParams {
        SearchParams {
            site_name: "linkedin".into(),
            search_term: "rust".into(),
            location: "Singapore".into(),
            results_wanted: 10,
            hours_wanted: 24,
            country: None,
            fetch_description: true,
        }
    }

    fn records(urls: &[&str]) -> Vec<RawRecord> {
        urls.iter()
            .map(|url| match json!({ "job_url": url, "title": format!("Job {url}"), "company": "Acme" }) {
                Value::Object(map) => map,
                _ => unreachable!(),
            })
            .collect()
    }

    fn unit(name: &str, scraper: Arc<StaticScraper>) -> ProducerUnit {
        ProducerUnit::new(name, params(), scraper, Arc::new(InMemoryRecordStore::new(name)))
    }

    fn spawn_pool(
        queue: &Arc<JobQueue>,
        analyzer: Arc<dyn Analyzer>,
        sink: Arc<InMemoryNotifier>,
    ) -> crate::workers::WorkerPoolHandle {
        let processor = JobProcessor::new(
            analyzer,
            PromptBuilder::new("resume"),
            NotificationService::default().with_sink(sink),
        )
        .with_retry_policy(RetryPolicy::no_retry());
        WorkerPool::spawn(
            WorkerPoolConfig::default().with_worker_count(2),
            queue.clone(),
            Arc::new(processor),
        )
        .unwrap()
    }

    fn scheduler(
        config: SchedulerConfig,
        scraper: Arc<StaticScraper>,
        queue: &Arc<JobQueue>,
        shutdown: &ShutdownCoordinator,
    ) -> Scheduler {
        let orchestrator = ProducerOrchestrator::new(
            vec![unit("solo", scraper)],
            ProducerMode::Sequential,
            queue.clone(),
        )
        .unwrap();
        Scheduler::new(config, orchestrator, queue.clone(), shutdown.clone())
    }

    #[tokio::test(start_paused = true)]
    async fn backpressure_holds_the_producer_until_a_worker_takes_a_job() {
        let queue = Arc::new(JobQueue::new(2).unwrap());
        let scraper = Arc::new(StaticScraper::new(records(&["https://x/u1", "https://x/u2", "https://x/u3"])));
        let producer = {
            let queue = queue.clone();
            let unit = unit("solo", scraper);
            tokio::spawn(async move { unit.run(&queue).await })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!producer.is_finished());
        assert_eq!(queue.len(), 2);

        let sink = Arc::new(InMemoryNotifier::new("memory"));
        let pool = spawn_pool(&queue, Arc::new(ScriptedAnalyzer::always_ok()), sink.clone());

        let report = producer.await.unwrap().unwrap();
        assert_eq!(report.new, 3);
        queue.await_drained().await;
        let stats = pool.shutdown().await;

        assert_eq!(stats.succeeded, 3);
        assert!(queue.is_empty());
        assert_eq!(queue.stats().acked, 3);
        let titles: Vec<_> = sink.delivered().into_iter().map(|l| l.job_title).collect();
        assert_eq!(titles.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn requested_shutdown_finishes_the_cycle_and_drains() {
        let queue = Arc::new(JobQueue::new(10).unwrap());
        let shutdown = ShutdownCoordinator::new();
        let scraper = Arc::new(StaticScraper::new(records(&["https://x/1", "https://x/2"])));
        let scheduler = scheduler(SchedulerConfig::default(), scraper.clone(), &queue, &shutdown);
        let sink = Arc::new(InMemoryNotifier::new("memory"));
        let pool = spawn_pool(&queue, Arc::new(ScriptedAnalyzer::always_ok()), sink.clone());

        let mut states = scheduler.subscribe_state();
        shutdown.notify(Signal::Terminate);
        let exit = scheduler.run(pool).await;

        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), LoopState::Terminated);
        match exit {
            SchedulerExit::Graceful { cycles, queue: q, pool } => {
                assert_eq!(cycles, 1);
                assert_eq!(q.enqueued, 2);
                assert_eq!(q.pending, 0);
                assert_eq!(pool.succeeded, 2);
            }
            other => panic!("expected graceful exit, got {other:?}"),
        }
        assert_eq!(scheduler.state(), LoopState::Terminated);
        assert_eq!(scraper.calls(), 1);
        assert_eq!(sink.delivered().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn second_signal_abandons_the_drain() {
        let queue = Arc::new(JobQueue::new(10).unwrap());
        let shutdown = ShutdownCoordinator::new();
        let scraper = Arc::new(StaticScraper::new(records(&["https://x/1", "https://x/2", "https://x/3"])));
        let scheduler = Arc::new(scheduler(SchedulerConfig::default(), scraper, &queue, &shutdown));
        let pool = spawn_pool(&queue, Arc::new(HangingAnalyzer), Arc::default());

        let mut states = scheduler.subscribe_state();
        shutdown.notify(Signal::Interrupt);
        let run = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.run(pool).await })
        };

        states.wait_for(|s| *s == LoopState::Terminated).await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(!run.is_finished(), "drain must wait for the stuck jobs");
        assert_eq!(scheduler.state(), LoopState::Terminated);

        shutdown.notify(Signal::Interrupt);
        let exit = run.await.unwrap();

        assert_eq!(exit, SchedulerExit::Forced { cycles: 1, pending: 3 });
        assert_eq!(exit.exit_code(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn blocked_period_skips_producers() {
        let queue = Arc::new(JobQueue::new(10).unwrap());
        let shutdown = ShutdownCoordinator::new();
        let scraper = Arc::new(StaticScraper::new(records(&["https://x/1"])));
        let config = SchedulerConfig {
            run_interval: None,
            blocked_period: "0800-1700".parse::<BlockedPeriod>().unwrap(),
        };
        let scheduler = scheduler(config, scraper.clone(), &queue, &shutdown)
            .with_clock(|| NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        let pool = spawn_pool(&queue, Arc::new(ScriptedAnalyzer::always_ok()), Arc::default());

        shutdown.notify(Signal::Terminate);
        let exit = scheduler.run(pool).await;

        assert_eq!(exit.exit_code(), 0);
        assert_eq!(scraper.calls(), 0);
        assert_eq!(queue.stats().enqueued, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn consecutive_blocked_cycles_are_counted_until_the_window_ends() {
        let queue = Arc::new(JobQueue::new(10).unwrap());
        let shutdown = ShutdownCoordinator::new();
        let scraper = Arc::new(StaticScraper::new(records(&["https://x/1"])));
        let config = SchedulerConfig {
            run_interval: None,
            blocked_period: "0800-1700".parse::<BlockedPeriod>().unwrap(),
        };
        let hour = Arc::new(AtomicU32::new(9));
        let scheduler = {
            let hour = hour.clone();
            scheduler(config, scraper.clone(), &queue, &shutdown).with_clock(move || {
                NaiveTime::from_hms_opt(hour.load(Ordering::SeqCst), 0, 0).unwrap()
            })
        };

        for _ in 0..3 {
            assert!(!scheduler.run_once().await);
        }
        assert_eq!(scheduler.blocked_streak(), 3);
        assert_eq!(scraper.calls(), 0);

        hour.store(18, Ordering::SeqCst);
        assert!(scheduler.run_once().await);
        assert_eq!(scheduler.blocked_streak(), 0);
        assert_eq!(scraper.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_interval_paces_cycles_and_shutdown_cuts_the_wait() {
        let queue = Arc::new(JobQueue::new(10).unwrap());
        let shutdown = ShutdownCoordinator::new();
        let scraper = Arc::new(StaticScraper::new(records(&["https://x/1"])));
        let config = SchedulerConfig {
            run_interval: Some(Duration::from_secs(60)),
            blocked_period: BlockedPeriod::Never,
        };
        let scheduler = Arc::new(scheduler(config, scraper.clone(), &queue, &shutdown));
        let sink = Arc::new(InMemoryNotifier::new("memory"));
        let pool = spawn_pool(&queue, Arc::new(ScriptedAnalyzer::always_ok()), sink.clone());

        let started = tokio::time::Instant::now();
        let run = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.run(pool).await })
        };

        tokio::time::sleep(Duration::from_secs(150)).await;
        shutdown.notify(Signal::Terminate);
        let exit = run.await.unwrap();

        assert!(matches!(exit, SchedulerExit::Graceful { cycles: 3, .. }), "{exit:?}");
        assert_eq!(scraper.calls(), 3);
        // Same posting every cycle: only the first run enqueues it.
        assert_eq!(sink.delivered().len(), 1);
        assert!(started.elapsed() < Duration::from_secs(180));
    }
}
