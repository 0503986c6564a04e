//! Crawler coordinator - main crawl orchestration logic
//!
//! This module ties the crawl together:
//! - Recovering claims orphaned by a crashed run
//! - Initial seeding of every source
//! - Spawning the worker pool, one storage connection per worker
//! - Polling store counts, re-arming revisits and logging progress
//! - Supplemental seeding of sources that are running dry
//! - Raising the stop signal and collecting worker counters

use crate::config::Config;
use crate::crawler::fetcher::{build_http_client, Fetcher};
use crate::crawler::worker::{Worker, WorkerStats};
use crate::now_ts;
use crate::seed::{seed_source, SeedMode};
use crate::state::JobStatus;
use crate::storage::{SqliteStorage, Storage};
use crate::CrawlError;
use reqwest::Client;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cooperative stop flag shared by the coordinator and all workers
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why a crawl ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Stored documents reached the combined target of all sources
    TargetReached,
    /// No source under its target has a pending or in-progress job
    FrontierExhausted,
    /// The stop signal was raised from outside (Ctrl-C)
    Interrupted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::TargetReached => "combined target reached",
            Self::FrontierExhausted => "frontier exhausted",
            Self::Interrupted => "interrupted",
        };
        f.write_str(s)
    }
}

/// Summary of a finished crawl
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub reason: StopReason,
    pub elapsed: Duration,
    /// Documents stored during this run, all sources
    pub documents_added: u64,
    /// Counters of each worker, in worker order
    pub workers: Vec<WorkerStats>,
    /// Merged counters of all workers
    pub totals: WorkerStats,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    db_path: PathBuf,
    client: Client,
    stop: StopSignal,
    handle_interrupt: bool,
}

impl Coordinator {
    /// Creates a coordinator for the database named in the configuration
    pub fn new(config: Config) -> Result<Self, CrawlError> {
        let client = build_http_client(&config.user_agent, config.crawler.request_timeout())?;
        Ok(Self {
            db_path: PathBuf::from(&config.database.path),
            config: Arc::new(config),
            client,
            stop: StopSignal::new(),
            handle_interrupt: true,
        })
    }

    /// Disables the Ctrl-C handler (for embedding and tests)
    pub fn without_interrupt_handler(mut self) -> Self {
        self.handle_interrupt = false;
        self
    }

    /// The signal that stops this crawl when raised
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Runs the crawl to completion
    ///
    /// # Lifecycle
    ///
    /// 1. Release in-progress claims older than `stale-claim-secs`
    /// 2. Seed every source that has no frontier rows yet
    /// 3. Spawn `workers` workers
    /// 4. Every `poll-interval-ms`: re-arm due revisits, check stop
    ///    conditions, log progress, top up lagging sources
    /// 5. Raise the stop signal, wait for workers to finish their current job
    pub async fn run(&self) -> Result<CrawlReport, CrawlError> {
        let started = Instant::now();
        let mut storage = SqliteStorage::new(&self.db_path)?;

        let released = storage.requeue_stale(now_ts(), self.config.crawler.stale_claim_secs as i64)?;
        if released > 0 {
            tracing::warn!("Released {} stale in-progress jobs from a previous run", released);
        }

        for source in &self.config.sources {
            seed_source(&mut storage, &self.client, source, SeedMode::Initial).await?;
        }

        let documents_at_start = storage.count_documents(None)?;
        self.log_banner(&storage)?;

        let interrupt = self.handle_interrupt.then(|| {
            let stop = self.stop.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Interrupt received, finishing in-flight jobs");
                    stop.raise();
                }
            })
        });

        let handles = self.spawn_workers()?;

        let reason = self.poll(&mut storage, started, documents_at_start).await;
        self.stop.raise();

        let mut workers = Vec::with_capacity(handles.len());
        for (id, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(stats) => workers.push(stats),
                Err(e) => tracing::error!("{}", CrawlError::Worker(format!("worker {}: {}", id, e))),
            }
        }

        if let Some(task) = interrupt {
            task.abort();
        }

        let reason = reason?;
        let documents_added = storage
            .count_documents(None)?
            .saturating_sub(documents_at_start);
        let totals = WorkerStats::aggregate(&workers);

        tracing::info!(
            "Crawl finished ({}): {} documents added in {:?}",
            reason,
            documents_added,
            started.elapsed()
        );

        Ok(CrawlReport {
            reason,
            elapsed: started.elapsed(),
            documents_added,
            workers,
            totals,
        })
    }

    fn spawn_workers(&self) -> Result<Vec<tokio::task::JoinHandle<WorkerStats>>, CrawlError> {
        let fetcher = Fetcher::new(self.client.clone(), self.config.clone());
        let mut handles = Vec::new();

        for id in 0..self.config.crawler.workers as usize {
            let storage = match SqliteStorage::new(&self.db_path) {
                Ok(storage) => storage,
                Err(e) => {
                    // Workers already running must not outlive a failed start
                    self.stop.raise();
                    return Err(e);
                }
            };
            let worker = Worker::new(
                id,
                storage,
                fetcher.clone(),
                self.config.clone(),
                self.stop.clone(),
            );
            handles.push(tokio::spawn(worker.run()));
        }

        tracing::info!("Started {} workers", handles.len());
        Ok(handles)
    }

    /// Polls the stores until a stop condition holds
    async fn poll(
        &self,
        storage: &mut SqliteStorage,
        started: Instant,
        documents_at_start: u64,
    ) -> Result<StopReason, CrawlError> {
        let crawler = &self.config.crawler;
        let total_target = self.config.total_target();
        let mut supplemented: HashSet<String> = HashSet::new();
        let mut last_progress = Instant::now();

        loop {
            if self.stop.is_raised() {
                return Ok(StopReason::Interrupted);
            }

            let now = now_ts();
            let rearmed = storage.rearm_revisits(now)?;
            if rearmed > 0 {
                tracing::info!("{} documents due for revisit", rearmed);
            }

            let documents = storage.documents_by_source()?;
            let total: u64 = documents.values().sum();
            if total >= total_target {
                tracing::info!("Combined target reached: {}/{}", total, total_target);
                return Ok(StopReason::TargetReached);
            }

            if self.open_jobs(&*storage, &documents)? == 0 {
                tracing::info!("No pending or in-progress jobs left for sources under target");
                return Ok(StopReason::FrontierExhausted);
            }

            if last_progress.elapsed() >= crawler.progress_interval() {
                self.log_progress(&*storage, &documents, started, documents_at_start)?;
                last_progress = Instant::now();
            }

            self.supplement(storage, &documents, &mut supplemented).await?;

            tokio::time::sleep(crawler.poll_interval()).await;
        }
    }

    /// Pending and in-progress jobs that can still add documents
    ///
    /// Jobs of a source at its target are only ever deferred, and jobs of
    /// sources no longer configured count toward no target, so neither keeps
    /// the run alive.
    fn open_jobs(
        &self,
        storage: &SqliteStorage,
        documents: &BTreeMap<String, u64>,
    ) -> Result<u64, CrawlError> {
        let mut open = 0;
        for source in &self.config.sources {
            if documents.get(&source.name).copied().unwrap_or(0) >= source.target {
                continue;
            }
            for status in [JobStatus::Pending, JobStatus::InProgress] {
                open += storage.count_jobs(Some(&source.name), Some(status))?;
            }
        }
        Ok(open)
    }

    /// Seeds lagging sources again once another source nears its target
    ///
    /// A source is topped up at most once per run, and only while it is under
    /// target with a pending backlog below `supplement-backlog`.
    async fn supplement(
        &self,
        storage: &mut SqliteStorage,
        documents: &BTreeMap<String, u64>,
        supplemented: &mut HashSet<String>,
    ) -> Result<(), CrawlError> {
        let crawler = &self.config.crawler;
        let count = |name: &str| documents.get(name).copied().unwrap_or(0);

        let leader = self.config.sources.iter().find(|s| {
            count(&s.name) as f64 >= crawler.supplement_ratio * s.target as f64
        });
        let Some(leader) = leader else {
            return Ok(());
        };

        for source in &self.config.sources {
            if source.name == leader.name
                || supplemented.contains(&source.name)
                || count(&source.name) >= source.target
            {
                continue;
            }

            let backlog = storage.count_jobs(Some(&source.name), Some(JobStatus::Pending))?;
            if backlog >= crawler.supplement_backlog {
                continue;
            }

            tracing::info!(
                "{} is near its target while {} has {} pending jobs, seeding {} again",
                leader.name,
                source.name,
                backlog,
                source.name
            );
            supplemented.insert(source.name.clone());
            seed_source(storage, &self.client, source, SeedMode::Supplemental).await?;
        }

        Ok(())
    }

    fn log_banner(&self, storage: &SqliteStorage) -> Result<(), CrawlError> {
        let crawler = &self.config.crawler;
        tracing::info!(
            "Crawling with {} workers, {}ms delay, {}s timeout, {} retries",
            crawler.workers,
            crawler.delay_ms,
            crawler.request_timeout_secs,
            crawler.max_retries
        );
        for source in &self.config.sources {
            tracing::info!(
                "  {}: {}/{} documents, {} jobs",
                source.name,
                storage.count_documents(Some(&source.name))?,
                source.target,
                storage.count_jobs(Some(&source.name), None)?
            );
        }
        Ok(())
    }

    fn log_progress(
        &self,
        storage: &SqliteStorage,
        documents: &BTreeMap<String, u64>,
        started: Instant,
        documents_at_start: u64,
    ) -> Result<(), CrawlError> {
        let total: u64 = documents.values().sum();
        let parts: Vec<String> = self
            .config
            .sources
            .iter()
            .map(|s| {
                let current = documents.get(&s.name).copied().unwrap_or(0);
                format!("{} {}/{} ({:.1}%)", s.name, current, s.target, percent(current, s.target))
            })
            .collect();

        let hours = started.elapsed().as_secs_f64() / 3600.0;
        let rate = if hours > 0.0 {
            total.saturating_sub(documents_at_start) as f64 / hours
        } else {
            0.0
        };

        tracing::info!(
            "Progress: {} | total {}/{} | pending {}, done {} | {:.0} docs/hour",
            parts.join(", "),
            total,
            self.config.total_target(),
            storage.count_jobs(None, Some(JobStatus::Pending))?,
            storage.count_jobs(None, Some(JobStatus::Done))?,
            rate
        );
        Ok(())
    }
}

/// `part` as a percentage of `whole`, zero for an empty whole
pub fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

/// Runs a complete crawl with Ctrl-C handling
pub async fn run_crawl(config: Config) -> Result<CrawlReport, CrawlError> {
    Coordinator::new(config)?.run().await
}
