//! Frontier seeding
//!
//! Each source declares how its frontier is first populated:
//! - `paginated`: walk a MediaWiki-style listing API page by page
//! - `static`: enqueue a fixed list of URLs
//!
//! Initial seeding is skipped for a source that already has frontier rows,
//! which makes restarts cheap. Supplemental seeding runs the same strategy
//! without that gate; enqueue idempotency absorbs whatever is already known.

mod list;
mod paginated;

pub use list::seed_static;
pub use paginated::seed_paginated;

use crate::config::{SeedConfig, SourceConfig};
use crate::storage::Storage;
use crate::CrawlError;
use reqwest::Client;

/// Why a seeder is being run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedMode {
    /// First population at startup; skipped if the source has any jobs
    Initial,

    /// Top-up for a source that is running out of work
    Supplemental,
}

/// Result of one seeding pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// URLs produced by the strategy
    pub listed: u64,

    /// URLs that were new to the frontier
    pub added: u64,

    /// True if the pass was skipped because the source was already seeded
    pub skipped: bool,
}

/// Seeds one source according to its configured strategy
///
/// Transport and decoding failures of the paginated strategy end the pass
/// early but are not errors: everything enqueued so far stays. Only storage
/// failures are returned.
pub async fn seed_source<S: Storage>(
    storage: &mut S,
    client: &Client,
    source: &SourceConfig,
    mode: SeedMode,
) -> Result<SeedReport, CrawlError> {
    if mode == SeedMode::Initial {
        let existing = storage.count_jobs(Some(&source.name), None)?;
        if existing > 0 {
            tracing::info!(
                "Source {} already seeded ({} jobs), skipping",
                source.name,
                existing
            );
            return Ok(SeedReport {
                skipped: true,
                ..SeedReport::default()
            });
        }
    }

    let report = match &source.seed {
        SeedConfig::Paginated(params) => seed_paginated(storage, client, source, params).await?,
        SeedConfig::Static(list) => seed_static(storage, source, list)?,
    };

    tracing::info!(
        "Seeded {} ({:?}): {} listed, {} new",
        source.name,
        mode,
        report.listed,
        report.added
    );
    Ok(report)
}
