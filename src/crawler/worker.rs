//! Crawl worker loop and per-worker counters
//!
//! A worker owns its own storage connection and loops:
//! claim (via the scheduler) → process (via the fetcher) → pace → repeat,
//! until the shared stop signal is raised. Workers share no in-memory state;
//! their counters are only combined once the pool has shut down.

use crate::config::Config;
use crate::crawler::coordinator::StopSignal;
use crate::crawler::fetcher::{FetchOutcome, Fetcher};
use crate::crawler::scheduler::Scheduler;
use crate::now_ts;
use crate::storage::Storage;
use crate::CrawlError;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Empty claims in a row before the worker switches to the longer idle sleep
const IDLE_ESCALATE_AFTER: u32 = 3;

/// Counter categories kept per source
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Outcome {
    /// New or changed content stored
    New,
    /// 200 with an unchanged digest
    Cached,
    /// 304 Not Modified
    NotModified,
    /// Links added to the frontier
    Links,
    /// Failed attempt that will be retried
    Retry,
    /// Failed attempt that made the job terminal
    Error,
    /// Job postponed because its source was at quota
    Deferred,
}

impl Outcome {
    pub fn all() -> [Self; 7] {
        [
            Self::New,
            Self::Cached,
            Self::NotModified,
            Self::Links,
            Self::Retry,
            Self::Error,
            Self::Deferred,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Cached => "cached",
            Self::NotModified => "not_modified",
            Self::Links => "links",
            Self::Retry => "retry",
            Self::Error => "error",
            Self::Deferred => "deferred",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-local counters of one worker, or of the whole pool once merged
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerStats {
    /// Worker index; `None` for merged totals
    pub worker_id: Option<usize>,
    /// Jobs taken through the fetcher
    pub processed: u64,
    /// Loop iterations that ended in an error
    pub loop_errors: u64,
    counts: BTreeMap<(String, Outcome), u64>,
}

impl WorkerStats {
    pub fn new(worker_id: usize) -> Self {
        Self {
            worker_id: Some(worker_id),
            ..Self::default()
        }
    }

    pub fn add(&mut self, source: &str, outcome: Outcome, n: u64) {
        if n == 0 {
            return;
        }
        *self
            .counts
            .entry((source.to_string(), outcome))
            .or_insert(0) += n;
    }

    /// Records one processed job
    pub fn record(&mut self, source: &str, outcome: &FetchOutcome) {
        self.processed += 1;
        match outcome {
            FetchOutcome::Stored { links } => {
                self.add(source, Outcome::New, 1);
                self.add(source, Outcome::Links, *links as u64);
            }
            FetchOutcome::Unchanged => self.add(source, Outcome::Cached, 1),
            FetchOutcome::NotModified => self.add(source, Outcome::NotModified, 1),
            FetchOutcome::Retry { .. } => self.add(source, Outcome::Retry, 1),
            FetchOutcome::Failed { .. } => self.add(source, Outcome::Error, 1),
            FetchOutcome::Deferred => self.add(source, Outcome::Deferred, 1),
        }
    }

    pub fn get(&self, source: &str, outcome: Outcome) -> u64 {
        self.counts
            .get(&(source.to_string(), outcome))
            .copied()
            .unwrap_or(0)
    }

    /// Sum of one outcome over all sources
    pub fn total(&self, outcome: Outcome) -> u64 {
        self.counts
            .iter()
            .filter(|((_, o), _)| *o == outcome)
            .map(|(_, n)| n)
            .sum()
    }

    /// Sources with at least one counter, sorted
    pub fn sources(&self) -> Vec<&str> {
        let mut sources: Vec<&str> = self.counts.keys().map(|(s, _)| s.as_str()).collect();
        sources.dedup();
        sources
    }

    pub fn merge(&mut self, other: &WorkerStats) {
        self.processed += other.processed;
        self.loop_errors += other.loop_errors;
        for ((source, outcome), n) in &other.counts {
            self.add(source, *outcome, *n);
        }
    }

    /// Combines the counters of a finished pool
    pub fn aggregate<'a>(stats: impl IntoIterator<Item = &'a WorkerStats>) -> WorkerStats {
        let mut total = WorkerStats::default();
        for s in stats {
            total.merge(s);
        }
        total
    }
}

/// One crawl worker
pub struct Worker<S> {
    id: usize,
    storage: S,
    scheduler: Scheduler,
    fetcher: Fetcher,
    config: Arc<Config>,
    stop: StopSignal,
}

impl<S: Storage> Worker<S> {
    pub fn new(
        id: usize,
        storage: S,
        fetcher: Fetcher,
        config: Arc<Config>,
        stop: StopSignal,
    ) -> Self {
        Self {
            id,
            storage,
            scheduler: Scheduler::new(&config),
            fetcher,
            config,
            stop,
        }
    }

    /// Runs until the stop signal is raised and returns this worker's counters
    ///
    /// The signal is checked before each claim, so an in-flight job always
    /// finishes. Errors never end the loop: they are logged and followed by
    /// the long idle sleep.
    pub async fn run(mut self) -> WorkerStats {
        let crawler = self.config.crawler.clone();
        let mut stats = WorkerStats::new(self.id);
        let mut idle_cycles: u32 = 0;

        tracing::debug!("Worker {} started", self.id);

        while !self.stop.is_raised() {
            match self.step(&mut stats).await {
                Ok(true) => {
                    idle_cycles = 0;
                    tokio::time::sleep(crawler.delay()).await;
                }
                Ok(false) => {
                    idle_cycles += 1;
                    let pause = if idle_cycles > IDLE_ESCALATE_AFTER {
                        crawler.idle_backoff()
                    } else {
                        crawler.idle_sleep()
                    };
                    tokio::time::sleep(pause).await;
                }
                Err(e) => {
                    stats.loop_errors += 1;
                    tracing::error!("Worker {} error: {}", self.id, e);
                    tokio::time::sleep(crawler.idle_backoff()).await;
                }
            }
        }

        tracing::debug!(
            "Worker {} stopped after {} jobs ({} errors)",
            self.id,
            stats.processed,
            stats.loop_errors
        );
        stats
    }

    /// Claims and processes at most one job; returns false if none was eligible
    async fn step(&mut self, stats: &mut WorkerStats) -> Result<bool, CrawlError> {
        let job = match self.scheduler.next_job(&mut self.storage, now_ts())? {
            Some(job) => job,
            None => return Ok(false),
        };

        tracing::debug!(
            "Worker {} fetching {} ({}, priority {})",
            self.id,
            job.url_norm,
            job.source,
            job.priority
        );

        let outcome = self.fetcher.process_job(&mut self.storage, &job).await?;
        stats.record(&job.source, &outcome);
        Ok(true)
    }
}
