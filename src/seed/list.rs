use crate::config::{SourceConfig, StaticSeed};
use crate::now_ts;
use crate::seed::SeedReport;
use crate::storage::{Storage, StorageError};
use crate::CrawlError;

/// Enqueues a source's literal seed URLs at the source priority
///
/// Unusable URLs are logged and skipped; config validation normally rejects
/// them before a crawl starts.
pub fn seed_static<S: Storage>(
    storage: &mut S,
    source: &SourceConfig,
    seed: &StaticSeed,
) -> Result<SeedReport, CrawlError> {
    let now = now_ts();
    let mut report = SeedReport::default();

    for url in &seed.urls {
        report.listed += 1;
        match storage.enqueue(&source.name, url, source.priority, None, now) {
            Ok(true) => report.added += 1,
            Ok(false) => {}
            Err(StorageError::InvalidUrl(e)) => {
                tracing::warn!("Skipping seed URL {} of {}: {}", url, source.name, e)
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(report)
}
