//! Storage module for the crawl frontier and fetched documents
//!
//! This module handles all database operations for the crawler:
//! - SQLite database initialization and schema management
//! - The frontier (`queue` table): idempotent enqueue, atomic claim,
//!   completion transitions, crash recovery and revisit re-arming
//! - The document store (`documents` table): cache validators and
//!   content fingerprints for change detection
//!
//! Every mutation is a single SQL statement guarded by a precondition on the
//! row's current status, so workers sharing a database file need no
//! in-process locking.

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::JobStatus;
use crate::CrawlError;

use std::path::Path;

/// Opens (creating if needed) the crawl database at `path`
pub fn open_storage(path: &Path) -> Result<SqliteStorage, CrawlError> {
    SqliteStorage::new(path)
}

/// One frontier row
#[derive(Debug, Clone, PartialEq)]
pub struct QueueItem {
    pub id: i64,
    pub url_norm: String,
    pub url: String,
    pub source: String,
    pub priority: i64,
    pub status: JobStatus,
    pub attempts: u32,
    /// Quota deferrals; never counted against `attempts`
    pub deferrals: u32,
    /// Unix seconds; the job is not dispatched before this
    pub next_fetch_at: i64,
    pub updated_at: i64,
    pub error: Option<String>,
}

/// Which pending jobs a claim may take
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimFilter<'a> {
    /// Only jobs of one source at one priority tier, oldest `next_fetch_at` first
    Bucket { source: &'a str, priority: i64 },

    /// Any pending job, ordered by `(priority, next_fetch_at)`
    Any,
}

/// One fetched document
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    pub url_norm: String,
    pub url: String,
    pub source: String,
    pub fetched_at: i64,
    pub raw_content: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub content_hash: Option<String>,
}

/// Cache validators and fingerprint of a stored document
///
/// Loaded before each fetch instead of the full record so the payload is
/// never read back just to build conditional headers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Validators {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub content_hash: Option<String>,
}
