//! Scheduler for dispatching frontier jobs to workers
//!
//! This module handles:
//! - The quota-aware priority pass over `(tier, source)` buckets
//! - The unconstrained fallback pass that keeps workers from starving
//! - Quota checks against the document store
//!
//! The scheduler holds no frontier state of its own. Every decision is read
//! from the store at dispatch time and every claim is a single atomic update,
//! so any number of workers can share one scheduler description.

use crate::config::Config;
use crate::storage::{ClaimFilter, QueueItem, Storage, StorageResult};

/// A source as the scheduler sees it: a name and its quota
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceQuota {
    pub name: String,
    pub target: u64,
}

/// Dispatch policy derived from the configured sources
///
/// Sources keep their configured order; priority tiers are every priority a
/// job can be enqueued with, ascending.
#[derive(Debug, Clone)]
pub struct Scheduler {
    sources: Vec<SourceQuota>,
    tiers: Vec<i64>,
}

impl Scheduler {
    /// Builds the dispatch policy from the configuration
    pub fn new(config: &Config) -> Self {
        let sources = config
            .sources
            .iter()
            .map(|s| SourceQuota {
                name: s.name.clone(),
                target: s.target,
            })
            .collect();

        let mut tiers: Vec<i64> = config
            .sources
            .iter()
            .flat_map(|s| [s.priority, s.link_priority])
            .collect();
        tiers.sort_unstable();
        tiers.dedup();

        Self { sources, tiers }
    }

    /// Priority tiers in the order the quota-aware pass visits them
    pub fn tiers(&self) -> &[i64] {
        &self.tiers
    }

    /// Returns the quota of a source, if it is configured
    pub fn target_of(&self, source: &str) -> Option<u64> {
        self.sources
            .iter()
            .find(|s| s.name == source)
            .map(|s| s.target)
    }

    /// Returns true if the source already holds at least its target documents
    ///
    /// Unknown sources have no quota and are never considered full.
    pub fn quota_reached<S: Storage>(&self, storage: &S, source: &str) -> StorageResult<bool> {
        match self.target_of(source) {
            Some(target) => Ok(storage.count_documents(Some(source))? >= target),
            None => Ok(false),
        }
    }

    /// Claims the next job to fetch, or `None` if nothing is eligible
    ///
    /// # Dispatch
    ///
    /// 1. For each tier ascending, for each source in configured order, skip
    ///    the source if its quota is met, otherwise claim from the
    ///    `(source, tier)` bucket. The first successful claim wins.
    /// 2. If no bucket yielded a job, claim any pending job ordered by
    ///    `(priority, next_fetch_at)`, ignoring source and quota.
    ///
    /// A job from the fallback pass may belong to a full source; the fetcher
    /// re-checks the quota before any network I/O.
    pub fn next_job<S: Storage>(
        &self,
        storage: &mut S,
        now: i64,
    ) -> StorageResult<Option<QueueItem>> {
        // Quota is per source, not per tier: check each source once per pass
        let mut open = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            if storage.count_documents(Some(&source.name))? >= source.target {
                tracing::trace!("Source {} is at quota, skipping in priority pass", source.name);
            } else {
                open.push(source.name.as_str());
            }
        }

        for &priority in &self.tiers {
            for &source in &open {
                let filter = ClaimFilter::Bucket { source, priority };
                if let Some(job) = storage.claim(filter, now)? {
                    return Ok(Some(job));
                }
            }
        }

        let job = storage.claim(ClaimFilter::Any, now)?;
        if let Some(job) = &job {
            tracing::debug!(
                "Fallback dispatch of {} (source {}, priority {})",
                job.url_norm,
                job.source,
                job.priority
            );
        }
        Ok(job)
    }
}
