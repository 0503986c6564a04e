//! Crawler module for frontier dispatch and page fetching
//!
//! This module contains the core crawling logic, including:
//! - Two-phase quota/priority dispatch over the frontier
//! - Conditional fetching with change detection
//! - Link extraction for link-following sources
//! - The worker loop and the coordinator that runs the pool

mod coordinator;
mod fetcher;
mod links;
mod scheduler;
mod worker;

pub use coordinator::{percent, run_crawl, Coordinator, CrawlReport, StopReason, StopSignal};
pub use fetcher::{build_http_client, content_digest, FetchOutcome, Fetcher};
pub use links::{extract_links, follow_links};
pub use scheduler::{Scheduler, SourceQuota};
pub use worker::{Outcome, Worker, WorkerStats};

use crate::config::Config;
use crate::CrawlError;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Open the store and release stale claims
/// 2. Seed sources that have no frontier yet
/// 3. Run the worker pool until the combined target is reached, the
///    frontier runs dry, or Ctrl-C is pressed
/// 4. Return the per-worker and aggregate counters
pub async fn crawl(config: Config) -> Result<CrawlReport, CrawlError> {
    run_crawl(config).await
}
