//! HTTP fetcher implementation
//!
//! This module processes one claimed job end to end:
//! - Re-checks the source quota before any network I/O
//! - Sends one conditional GET built from the stored validators
//! - Detects content changes with a SHA-256 digest of the body
//! - Writes the document store and feeds links back into the frontier
//! - Records the job's outcome in the frontier
//!
//! The fetcher never retries by itself. Every retry decision is a frontier
//! state transition.

use crate::config::{Config, UserAgentConfig};
use crate::crawler::links::follow_links;
use crate::crawler::scheduler::Scheduler;
use crate::now_ts;
use crate::state::JobStatus;
use crate::storage::{DocumentRecord, QueueItem, Storage, Validators};
use crate::CrawlError;
use reqwest::header::{HeaderMap, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::{Client, StatusCode};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

/// What processing a job did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// New or changed content was stored
    Stored {
        /// Links newly added to the frontier
        links: usize,
    },

    /// 200 with the same digest as the stored document
    Unchanged,

    /// 304, the stored document is still current
    NotModified,

    /// Failed attempt, the job will be retried
    Retry { reason: String },

    /// Failed attempt that exhausted the retry budget
    Failed { reason: String },

    /// Source already at quota, job postponed without a request
    Deferred,
}

/// Builds an HTTP client with proper configuration
///
/// The `User-Agent` identifies the crawler and how to reach its operator.
/// Redirects are followed; compressed responses are decoded transparently.
///
/// # Example
///
/// ```no_run
/// use frontier_crawl::config::UserAgentConfig;
/// use frontier_crawl::crawler::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "CorpusBot".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(20)).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Hex SHA-256 digest of a page body
pub fn content_digest(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize())
}

/// Builds `If-None-Match` / `If-Modified-Since` from stored validators
fn conditional_headers(validators: &Validators) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(etag) = validators.etag.as_deref().and_then(|v| v.parse().ok()) {
        headers.insert(IF_NONE_MATCH, etag);
    }
    if let Some(modified) = validators
        .last_modified
        .as_deref()
        .and_then(|v| v.parse().ok())
    {
        headers.insert(IF_MODIFIED_SINCE, modified);
    }
    headers
}

fn header_string(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Fetches claimed jobs and records their outcome
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    config: Arc<Config>,
    scheduler: Scheduler,
}

impl Fetcher {
    pub fn new(client: Client, config: Arc<Config>) -> Self {
        let scheduler = Scheduler::new(&config);
        Self {
            client,
            config,
            scheduler,
        }
    }

    /// Processes a claimed job
    ///
    /// # Request Flow
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | Source at quota | No request, defer by `quota-deferral-secs` |
    /// | HTTP 304 | Touch `fetched_at`, success |
    /// | HTTP 200, new digest | Store content, follow links, success |
    /// | HTTP 200, same digest | Refresh validators only, success |
    /// | Other status | Failure, retry after `retry-delay-secs` |
    /// | Transport error | Failure, retry after `retry-delay-secs` |
    ///
    /// Errors are returned only for storage failures; the job then stays
    /// claimed until stale-claim recovery releases it.
    pub async fn process_job<S: Storage>(
        &self,
        storage: &mut S,
        job: &QueueItem,
    ) -> Result<FetchOutcome, CrawlError> {
        let crawler = &self.config.crawler;

        if self.scheduler.quota_reached(&*storage, &job.source)? {
            tracing::debug!("Source {} at quota, deferring {}", job.source, job.url_norm);
            let now = now_ts();
            if !storage.mark_deferred(&job.url_norm, now, crawler.quota_deferral_secs as i64)? {
                tracing::warn!("Job {} was no longer claimed when deferring", job.url_norm);
            }
            return Ok(FetchOutcome::Deferred);
        }

        let validators = storage.get_validators(&job.url_norm)?.unwrap_or_default();

        let response = self
            .client
            .get(&job.url_norm)
            .headers(conditional_headers(&validators))
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                let reason = if e.is_timeout() {
                    "request timeout".to_string()
                } else {
                    format!("transport error: {}", e)
                };
                return self.record_failure(storage, job, reason);
            }
        };

        let status = response.status();
        let headers = response.headers().clone();

        match status {
            StatusCode::NOT_MODIFIED => {
                let now = now_ts();
                storage.touch_document(&job.url_norm, now)?;
                self.record_success(storage, job, now)?;
                tracing::debug!("Not modified: {}", job.url_norm);
                Ok(FetchOutcome::NotModified)
            }

            StatusCode::OK => {
                let body = match response.text().await {
                    Ok(body) => body,
                    Err(e) => {
                        return self.record_failure(storage, job, format!("body read error: {}", e))
                    }
                };
                self.store_body(storage, job, &validators, &headers, body)
            }

            other => self.record_failure(storage, job, format!("HTTP {}", other.as_u16())),
        }
    }

    /// Stores a 200 body, or only its validators when the digest is unchanged
    fn store_body<S: Storage>(
        &self,
        storage: &mut S,
        job: &QueueItem,
        previous: &Validators,
        headers: &HeaderMap,
        body: String,
    ) -> Result<FetchOutcome, CrawlError> {
        let now = now_ts();
        let digest = content_digest(&body);
        let etag = header_string(headers, ETAG);
        let last_modified = header_string(headers, LAST_MODIFIED);

        if previous.content_hash.as_deref() == Some(digest.as_str()) {
            storage.refresh_validators(
                &job.url_norm,
                etag.as_deref(),
                last_modified.as_deref(),
                now,
            )?;
            self.record_success(storage, job, now)?;
            tracing::debug!("Unchanged: {}", job.url_norm);
            return Ok(FetchOutcome::Unchanged);
        }

        let doc = DocumentRecord {
            url_norm: job.url_norm.clone(),
            url: job.url.clone(),
            source: job.source.clone(),
            fetched_at: now,
            raw_content: Some(body),
            etag,
            last_modified,
            content_hash: Some(digest),
        };
        storage.store_content(&doc)?;

        let links = match (self.config.source(&job.source), doc.raw_content.as_deref()) {
            (Some(source), Some(html)) => follow_links(storage, source, html, &job.url_norm, now)?,
            _ => 0,
        };

        self.record_success(storage, job, now)?;
        tracing::debug!("Stored: {} ({} new links)", job.url_norm, links);
        Ok(FetchOutcome::Stored { links })
    }

    fn record_success<S: Storage>(
        &self,
        storage: &mut S,
        job: &QueueItem,
        now: i64,
    ) -> Result<(), CrawlError> {
        let revisit = self.config.crawler.revisit_interval_secs as i64;
        if !storage.mark_success(&job.url_norm, now, revisit)? {
            tracing::warn!("Job {} was no longer claimed when completing", job.url_norm);
        }
        Ok(())
    }

    fn record_failure<S: Storage>(
        &self,
        storage: &mut S,
        job: &QueueItem,
        reason: String,
    ) -> Result<FetchOutcome, CrawlError> {
        let crawler = &self.config.crawler;
        let status = storage.mark_failure(
            &job.url_norm,
            now_ts(),
            crawler.retry_delay_secs as i64,
            crawler.max_retries,
            &reason,
        )?;

        match status {
            Some(JobStatus::Error) => {
                tracing::error!("Giving up on {}: {}", job.url_norm, reason);
                Ok(FetchOutcome::Failed { reason })
            }
            Some(_) => {
                tracing::warn!(
                    "Fetch failed for {} (attempt {}): {}",
                    job.url_norm,
                    job.attempts + 1,
                    reason
                );
                Ok(FetchOutcome::Retry { reason })
            }
            None => {
                tracing::warn!("Job {} was no longer claimed when failing", job.url_norm);
                Ok(FetchOutcome::Retry { reason })
            }
        }
    }
}
