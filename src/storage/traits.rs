//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::JobStatus;
use crate::storage::{ClaimFilter, DocumentRecord, QueueItem, Validators};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Unknown job status '{0}' in frontier row")]
    UnknownStatus(String),

    #[error("Invalid URL for enqueue: {0}")]
    InvalidUrl(#[from] crate::UrlError),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// All timestamps are unix seconds supplied by the caller. Every write is one
/// atomic statement whose `WHERE` clause carries the expected prior status.
pub trait Storage {
    // ===== Frontier =====

    /// Canonicalizes `url` and inserts a pending job for it
    ///
    /// Returns `false` when the canonical URL is already known; the existing
    /// row keeps its source, priority and status.
    fn enqueue(
        &mut self,
        source: &str,
        url: &str,
        priority: i64,
        next_fetch_at: Option<i64>,
        now: i64,
    ) -> StorageResult<bool>;

    /// Atomically moves one eligible pending job to `in_progress`
    ///
    /// Eligible means `status = pending` and `next_fetch_at <= now`, further
    /// restricted by `filter`. Concurrent callers never receive the same job.
    fn claim(&mut self, filter: ClaimFilter<'_>, now: i64) -> StorageResult<Option<QueueItem>>;

    /// `in_progress -> done`, scheduling a revisit `revisit_secs` from now
    ///
    /// Returns `false` if the job was not in progress.
    fn mark_success(&mut self, url_norm: &str, now: i64, revisit_secs: i64) -> StorageResult<bool>;

    /// Records a failed attempt on an in-progress job
    ///
    /// The job returns to `pending` after `retry_delay_secs`, unless this
    /// failure pushes `attempts` past `max_retries`, in which case it becomes
    /// `error` with `reason` recorded. Returns the resulting status, or `None`
    /// if the job was not in progress.
    fn mark_failure(
        &mut self,
        url_norm: &str,
        now: i64,
        retry_delay_secs: i64,
        max_retries: u32,
        reason: &str,
    ) -> StorageResult<Option<JobStatus>>;

    /// Returns an in-progress job to `pending` without touching `attempts`
    fn mark_deferred(&mut self, url_norm: &str, now: i64, delay_secs: i64) -> StorageResult<bool>;

    /// Releases claims older than `older_than_secs` left behind by a crashed run
    fn requeue_stale(&mut self, now: i64, older_than_secs: i64) -> StorageResult<u64>;

    /// Moves `done` jobs whose revisit time has come back to `pending`
    fn rearm_revisits(&mut self, now: i64) -> StorageResult<u64>;

    /// Gets a job by canonical URL
    fn get_job(&self, url_norm: &str) -> StorageResult<Option<QueueItem>>;

    /// Counts jobs, optionally restricted to a source and/or status
    fn count_jobs(&self, source: Option<&str>, status: Option<JobStatus>) -> StorageResult<u64>;

    /// Job counts grouped by status
    fn jobs_by_status(&self) -> StorageResult<BTreeMap<JobStatus, u64>>;

    /// Job counts grouped by source
    fn jobs_by_source(&self) -> StorageResult<BTreeMap<String, u64>>;

    // ===== Documents =====

    /// Gets a full document, payload included
    fn get_document(&self, url_norm: &str) -> StorageResult<Option<DocumentRecord>>;

    /// Gets only the validators and content hash of a document
    fn get_validators(&self, url_norm: &str) -> StorageResult<Option<Validators>>;

    /// Inserts or overwrites a document with new content
    fn store_content(&mut self, doc: &DocumentRecord) -> StorageResult<()>;

    /// Updates validators and `fetched_at` of an unchanged document
    fn refresh_validators(
        &mut self,
        url_norm: &str,
        etag: Option<&str>,
        last_modified: Option<&str>,
        now: i64,
    ) -> StorageResult<bool>;

    /// Updates only `fetched_at` after a not-modified response
    fn touch_document(&mut self, url_norm: &str, now: i64) -> StorageResult<bool>;

    /// Counts documents, optionally restricted to one source
    fn count_documents(&self, source: Option<&str>) -> StorageResult<u64>;

    /// Document counts grouped by source
    fn documents_by_source(&self) -> StorageResult<BTreeMap<String, u64>>;
}
