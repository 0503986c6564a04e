//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the crawl database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Crawl frontier: one row per canonical URL ever enqueued
CREATE TABLE IF NOT EXISTS queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url_norm TEXT NOT NULL UNIQUE,
    url TEXT NOT NULL,
    source TEXT NOT NULL,
    priority INTEGER NOT NULL DEFAULT 2,
    status TEXT NOT NULL DEFAULT 'pending',
    attempts INTEGER NOT NULL DEFAULT 0,
    deferrals INTEGER NOT NULL DEFAULT 0,
    next_fetch_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    error TEXT
);

CREATE INDEX IF NOT EXISTS idx_queue_status_next ON queue(status, next_fetch_at);
CREATE INDEX IF NOT EXISTS idx_queue_source_status ON queue(source, status);
CREATE INDEX IF NOT EXISTS idx_queue_bucket ON queue(source, priority, status, next_fetch_at);
CREATE INDEX IF NOT EXISTS idx_queue_priority ON queue(priority, status, next_fetch_at);

-- Fetched documents: one row per canonical URL fetched at least once
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url_norm TEXT NOT NULL UNIQUE,
    url TEXT NOT NULL,
    source TEXT NOT NULL,
    fetched_at INTEGER NOT NULL,
    raw_content TEXT,
    etag TEXT,
    last_modified TEXT,
    content_hash TEXT
);

CREATE INDEX IF NOT EXISTS idx_documents_source ON documents(source);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_tables_and_indexes_exist() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for (kind, name) in [
            ("table", "queue"),
            ("table", "documents"),
            ("index", "idx_queue_status_next"),
            ("index", "idx_queue_source_status"),
            ("index", "idx_documents_source"),
        ] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = ?1 AND name = ?2",
                    [kind, name],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "{} {} should exist", kind, name);
        }
    }

    #[test]
    fn test_url_norm_is_unique() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        let insert = "INSERT INTO queue (url_norm, url, source, next_fetch_at, updated_at)
                      VALUES ('https://ex.com/a', 'https://ex.com/a', 'A', 0, 0)";
        conn.execute(insert, []).unwrap();
        assert!(conn.execute(insert, []).is_err());
    }
}
