//! SQLite sink
//!
//! Records every page, including failures, in a `pages` table tied to a row
//! in `runs`, so several crawls can share one database file.

use crate::output::traits::{PageRecord, Sink, SinkError, SinkResult};
use crate::state::RunState;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per crawl
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- One row per crawled URL
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    url TEXT NOT NULL,
    depth INTEGER NOT NULL,
    source TEXT,
    status TEXT NOT NULL,
    http_status INTEGER,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    keywords TEXT NOT NULL,
    error_message TEXT,
    fetched_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_pages_run ON pages(run_id);
CREATE INDEX IF NOT EXISTS idx_pages_status ON pages(status);
CREATE INDEX IF NOT EXISTS idx_pages_url ON pages(url);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

/// Writes page records to SQLite
pub struct SqliteSink {
    conn: Mutex<Connection>,
    run_id: i64,
}

impl SqliteSink {
    /// Opens (or creates) the database at `path` and starts a new run row
    pub fn open(path: &Path, config_hash: &str) -> SinkResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        tracing::debug!("Opened SQLite sink at {}", path.display());
        Self::with_connection(conn, config_hash)
    }

    /// Creates an in-memory database
    pub fn in_memory(config_hash: &str) -> SinkResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::with_connection(conn, config_hash)
    }

    fn with_connection(conn: Connection, config_hash: &str) -> SinkResult<Self> {
        initialize_schema(&conn)?;
        conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![
                Utc::now().to_rfc3339(),
                config_hash,
                RunState::Running.as_str()
            ],
        )?;
        let run_id = conn.last_insert_rowid();

        Ok(Self {
            conn: Mutex::new(conn),
            run_id,
        })
    }

    /// ID of the run row this sink writes under
    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    /// Stamps the run row with its final state
    pub fn finish_run(&self, status: RunState) -> SinkResult<()> {
        self.lock()?.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.as_str(), Utc::now().to_rfc3339(), self.run_id],
        )?;
        Ok(())
    }

    /// Number of pages recorded for this run
    pub fn page_count(&self) -> SinkResult<u64> {
        let count: i64 = self.lock()?.query_row(
            "SELECT COUNT(*) FROM pages WHERE run_id = ?1",
            params![self.run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn lock(&self) -> SinkResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| SinkError::Unavailable(format!("SQLite connection lock poisoned: {}", e)))
    }
}

impl Sink for SqliteSink {
    fn write(&self, record: &PageRecord) -> SinkResult<()> {
        // A lone INSERT in autocommit mode is its own transaction
        self.lock()?.execute(
            "INSERT INTO pages (run_id, url, depth, source, status, http_status,
                                title, description, keywords, error_message, fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                self.run_id,
                record.url.as_str(),
                record.depth,
                record.source.as_ref().map(|u| u.as_str()),
                record.status.to_db_string(),
                record.http_status,
                record.title,
                record.description,
                record.keywords,
                record.error,
                record.fetched_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn flush(&self) -> SinkResult<()> {
        // Every write has already committed; only check the connection is usable
        self.lock()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::{ExtractedPage, FetchCause, FetchError, FrontierEntry};
    use crate::state::PageStatus;
    use url::Url;

    fn entry(path: &str) -> FrontierEntry {
        let seed = FrontierEntry::seed(Url::parse("https://example.com/").unwrap());
        seed.child(Url::parse(&format!("https://example.com{}", path)).unwrap())
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_write_success_and_failure() {
        let sink = SqliteSink::in_memory("abc123").unwrap();

        let page = ExtractedPage {
            title: "A".to_string(),
            ..ExtractedPage::default()
        };
        sink.write(&PageRecord::success(&entry("/a"), 200, &page)).unwrap();

        let failing = entry("/b");
        let error = FetchError::new(&failing.url, FetchCause::Timeout);
        sink.write(&PageRecord::fetch_failed(&failing, &error)).unwrap();
        sink.flush().unwrap();

        assert_eq!(sink.page_count().unwrap(), 2);

        let conn = sink.lock().unwrap();
        let (status, depth, source, error): (String, u32, Option<String>, Option<String>) = conn
            .query_row(
                "SELECT status, depth, source, error_message FROM pages WHERE url = ?1",
                params!["https://example.com/b"],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .unwrap();

        assert_eq!(PageStatus::from_db_string(&status), Some(PageStatus::FetchError));
        assert_eq!(depth, 1);
        assert_eq!(source.as_deref(), Some("https://example.com/"));
        assert_eq!(error.as_deref(), Some("request timed out"));
    }

    #[test]
    fn test_finish_run_updates_status() {
        let sink = SqliteSink::in_memory("abc123").unwrap();
        sink.finish_run(RunState::Cancelled).unwrap();

        let conn = sink.lock().unwrap();
        let (status, finished): (String, Option<String>) = conn
            .query_row(
                "SELECT status, finished_at FROM runs WHERE id = ?1",
                params![sink.run_id()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();

        assert_eq!(status, "cancelled");
        assert!(finished.is_some());
    }

    #[test]
    fn test_runs_share_a_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("crawl.db");

        let first = SqliteSink::open(&path, "h1").unwrap();
        first.write(&PageRecord::worker_fault(&entry("/x"), "boom")).unwrap();
        let first_id = first.run_id();
        drop(first);

        let second = SqliteSink::open(&path, "h2").unwrap();
        assert_ne!(second.run_id(), first_id);
        assert_eq!(second.page_count().unwrap(), 0);
    }
}
