//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.
//! Each worker opens its own `SqliteStorage` on the shared database file;
//! WAL mode plus a busy timeout lets those connections interleave safely.

use crate::state::JobStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{ClaimFilter, DocumentRecord, QueueItem, Validators};
use crate::url::canonicalize;
use crate::CrawlError;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// How long a connection waits on another connection's write lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

const QUEUE_COLUMNS: &str = "id, url_norm, url, source, priority, status, attempts, deferrals, \
                             next_fetch_at, updated_at, error";

/// Claim restricted to one (source, priority) bucket
const CLAIM_BUCKET_SQL: &str = "
    UPDATE queue
    SET status = 'in_progress', updated_at = ?1
    WHERE url_norm = (
        SELECT url_norm FROM queue
        WHERE status = 'pending' AND next_fetch_at <= ?1 AND source = ?2 AND priority = ?3
        ORDER BY next_fetch_at ASC, id ASC
        LIMIT 1
    )
    AND status = 'pending'
    RETURNING id, url_norm, url, source, priority, status, attempts, deferrals,
              next_fetch_at, updated_at, error";

/// Claim over the whole frontier
const CLAIM_ANY_SQL: &str = "
    UPDATE queue
    SET status = 'in_progress', updated_at = ?1
    WHERE url_norm = (
        SELECT url_norm FROM queue
        WHERE status = 'pending' AND next_fetch_at <= ?1
        ORDER BY priority ASC, next_fetch_at ASC, id ASC
        LIMIT 1
    )
    AND status = 'pending'
    RETURNING id, url_norm, url, source, priority, status, attempts, deferrals,
              next_fetch_at, updated_at, error";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the database at `path` and ensures the schema
    pub fn new(path: &Path) -> Result<Self, CrawlError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, CrawlError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn count(&self, sql: &str, params: impl rusqlite::Params) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(sql, params, |row| row.get(0))?;
        Ok(count as u64)
    }

    fn grouped_counts(&self, sql: &str) -> StorageResult<BTreeMap<String, u64>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?;

        let mut counts = BTreeMap::new();
        for row in rows {
            let (key, count) = row?;
            counts.insert(key, count);
        }
        Ok(counts)
    }
}

fn parse_status(row: &Row<'_>, idx: usize) -> rusqlite::Result<JobStatus> {
    let raw: String = row.get(idx)?;
    JobStatus::from_db_string(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            Box::new(StorageError::UnknownStatus(raw)),
        )
    })
}

fn row_to_queue_item(row: &Row<'_>) -> rusqlite::Result<QueueItem> {
    Ok(QueueItem {
        id: row.get(0)?,
        url_norm: row.get(1)?,
        url: row.get(2)?,
        source: row.get(3)?,
        priority: row.get(4)?,
        status: parse_status(row, 5)?,
        attempts: row.get(6)?,
        deferrals: row.get(7)?,
        next_fetch_at: row.get(8)?,
        updated_at: row.get(9)?,
        error: row.get(10)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Frontier =====

    fn enqueue(
        &mut self,
        source: &str,
        url: &str,
        priority: i64,
        next_fetch_at: Option<i64>,
        now: i64,
    ) -> StorageResult<bool> {
        let url_norm = canonicalize(url)?;
        let inserted = self.conn.execute(
            "INSERT INTO queue (url_norm, url, source, priority, status, attempts, next_fetch_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 'pending', 0, ?5, ?6)
             ON CONFLICT(url_norm) DO NOTHING",
            params![url_norm, url, source, priority, next_fetch_at.unwrap_or(now), now],
        )?;
        Ok(inserted == 1)
    }

    fn claim(&mut self, filter: ClaimFilter<'_>, now: i64) -> StorageResult<Option<QueueItem>> {
        let job = match filter {
            ClaimFilter::Bucket { source, priority } => self
                .conn
                .query_row(CLAIM_BUCKET_SQL, params![now, source, priority], row_to_queue_item)
                .optional()?,
            ClaimFilter::Any => self
                .conn
                .query_row(CLAIM_ANY_SQL, params![now], row_to_queue_item)
                .optional()?,
        };
        Ok(job)
    }

    fn mark_success(&mut self, url_norm: &str, now: i64, revisit_secs: i64) -> StorageResult<bool> {
        let updated = self.conn.execute(
            "UPDATE queue
             SET status = 'done', attempts = 0, error = NULL,
                 next_fetch_at = ?2 + ?3, updated_at = ?2
             WHERE url_norm = ?1 AND status = 'in_progress'",
            params![url_norm, now, revisit_secs],
        )?;
        Ok(updated == 1)
    }

    fn mark_failure(
        &mut self,
        url_norm: &str,
        now: i64,
        retry_delay_secs: i64,
        max_retries: u32,
        reason: &str,
    ) -> StorageResult<Option<JobStatus>> {
        // SET expressions see the pre-update row, so `attempts + 1` is the new count
        let status = self
            .conn
            .query_row(
                "UPDATE queue
                 SET attempts = attempts + 1,
                     status = CASE WHEN attempts + 1 > ?4 THEN 'error' ELSE 'pending' END,
                     next_fetch_at = CASE WHEN attempts + 1 > ?4 THEN next_fetch_at ELSE ?2 + ?3 END,
                     error = CASE WHEN attempts + 1 > ?4 THEN ?5 ELSE NULL END,
                     updated_at = ?2
                 WHERE url_norm = ?1 AND status = 'in_progress'
                 RETURNING status",
                params![url_norm, now, retry_delay_secs, max_retries, reason],
                |row| parse_status(row, 0),
            )
            .optional()?;
        Ok(status)
    }

    fn mark_deferred(&mut self, url_norm: &str, now: i64, delay_secs: i64) -> StorageResult<bool> {
        let updated = self.conn.execute(
            "UPDATE queue
             SET status = 'pending', deferrals = deferrals + 1,
                 next_fetch_at = ?2 + ?3, updated_at = ?2
             WHERE url_norm = ?1 AND status = 'in_progress'",
            params![url_norm, now, delay_secs],
        )?;
        Ok(updated == 1)
    }

    fn requeue_stale(&mut self, now: i64, older_than_secs: i64) -> StorageResult<u64> {
        let updated = self.conn.execute(
            "UPDATE queue SET status = 'pending', updated_at = ?1
             WHERE status = 'in_progress' AND updated_at <= ?1 - ?2",
            params![now, older_than_secs],
        )?;
        Ok(updated as u64)
    }

    fn rearm_revisits(&mut self, now: i64) -> StorageResult<u64> {
        let updated = self.conn.execute(
            "UPDATE queue SET status = 'pending', attempts = 0, updated_at = ?1
             WHERE status = 'done' AND next_fetch_at <= ?1",
            params![now],
        )?;
        Ok(updated as u64)
    }

    fn get_job(&self, url_norm: &str) -> StorageResult<Option<QueueItem>> {
        let sql = format!("SELECT {} FROM queue WHERE url_norm = ?1", QUEUE_COLUMNS);
        let job = self
            .conn
            .query_row(&sql, params![url_norm], row_to_queue_item)
            .optional()?;
        Ok(job)
    }

    fn count_jobs(&self, source: Option<&str>, status: Option<JobStatus>) -> StorageResult<u64> {
        self.count(
            "SELECT COUNT(*) FROM queue
             WHERE (?1 IS NULL OR source = ?1) AND (?2 IS NULL OR status = ?2)",
            params![source, status.map(|s| s.to_db_string())],
        )
    }

    fn jobs_by_status(&self) -> StorageResult<BTreeMap<JobStatus, u64>> {
        let raw = self.grouped_counts("SELECT status, COUNT(*) FROM queue GROUP BY status")?;

        let mut counts = BTreeMap::new();
        for (status, count) in raw {
            let status = JobStatus::from_db_string(&status)
                .ok_or(StorageError::UnknownStatus(status))?;
            counts.insert(status, count);
        }
        Ok(counts)
    }

    fn jobs_by_source(&self) -> StorageResult<BTreeMap<String, u64>> {
        self.grouped_counts("SELECT source, COUNT(*) FROM queue GROUP BY source")
    }

    // ===== Documents =====

    fn get_document(&self, url_norm: &str) -> StorageResult<Option<DocumentRecord>> {
        let doc = self
            .conn
            .query_row(
                "SELECT url_norm, url, source, fetched_at, raw_content, etag, last_modified, content_hash
                 FROM documents WHERE url_norm = ?1",
                params![url_norm],
                |row| {
                    Ok(DocumentRecord {
                        url_norm: row.get(0)?,
                        url: row.get(1)?,
                        source: row.get(2)?,
                        fetched_at: row.get(3)?,
                        raw_content: row.get(4)?,
                        etag: row.get(5)?,
                        last_modified: row.get(6)?,
                        content_hash: row.get(7)?,
                    })
                },
            )
            .optional()?;
        Ok(doc)
    }

    fn get_validators(&self, url_norm: &str) -> StorageResult<Option<Validators>> {
        let validators = self
            .conn
            .query_row(
                "SELECT etag, last_modified, content_hash FROM documents WHERE url_norm = ?1",
                params![url_norm],
                |row| {
                    Ok(Validators {
                        etag: row.get(0)?,
                        last_modified: row.get(1)?,
                        content_hash: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(validators)
    }

    fn store_content(&mut self, doc: &DocumentRecord) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO documents
                 (url_norm, url, source, fetched_at, raw_content, etag, last_modified, content_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(url_norm) DO UPDATE SET
                 url = excluded.url,
                 source = excluded.source,
                 fetched_at = excluded.fetched_at,
                 raw_content = excluded.raw_content,
                 etag = excluded.etag,
                 last_modified = excluded.last_modified,
                 content_hash = excluded.content_hash",
            params![
                doc.url_norm,
                doc.url,
                doc.source,
                doc.fetched_at,
                doc.raw_content,
                doc.etag,
                doc.last_modified,
                doc.content_hash,
            ],
        )?;
        Ok(())
    }

    fn refresh_validators(
        &mut self,
        url_norm: &str,
        etag: Option<&str>,
        last_modified: Option<&str>,
        now: i64,
    ) -> StorageResult<bool> {
        let updated = self.conn.execute(
            "UPDATE documents SET etag = ?2, last_modified = ?3, fetched_at = ?4 WHERE url_norm = ?1",
            params![url_norm, etag, last_modified, now],
        )?;
        Ok(updated == 1)
    }

    fn touch_document(&mut self, url_norm: &str, now: i64) -> StorageResult<bool> {
        let updated = self.conn.execute(
            "UPDATE documents SET fetched_at = ?2 WHERE url_norm = ?1",
            params![url_norm, now],
        )?;
        Ok(updated == 1)
    }

    fn count_documents(&self, source: Option<&str>) -> StorageResult<u64> {
        self.count(
            "SELECT COUNT(*) FROM documents WHERE ?1 IS NULL OR source = ?1",
            params![source],
        )
    }

    fn documents_by_source(&self) -> StorageResult<BTreeMap<String, u64>> {
        self.grouped_counts("SELECT source, COUNT(*) FROM documents GROUP BY source")
    }
}
