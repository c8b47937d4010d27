//! Storage layer for romhacks.
//!
//! This module provides `SQLite`-based persistent storage for the catalog,
//! the moderation queues, download tracking and the monthly popularity
//! archive. Operations are split by concern across the submodules; all of
//! them are methods on [`Storage`].

mod downloads;
mod entries;
mod feedback;
pub mod migrations;
pub mod schema;
mod submissions;

pub use downloads::{ArchiveSummary, HistoryRow, MonthlyCount};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::catalog::EntryKind;
use crate::error::{Error, Result};
use crate::moderation::SubmissionCounts;

/// Storage shared between request handlers and background tasks.
pub type SharedStorage = Arc<Mutex<Storage>>;

/// Run `f` against shared storage on the blocking thread pool.
///
/// The lock is held until `f` returns. Used for scans and writes that touch
/// many rows, so they do not stall the async workers.
///
/// # Errors
///
/// Returns whatever `f` returns, or [`Error::Internal`] if the blocking task
/// panicked.
pub async fn blocking<T, F>(storage: &SharedStorage, f: F) -> Result<T>
where
    F: FnOnce(&Storage) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let guard = Arc::clone(storage).lock_owned().await;
    tokio::task::spawn_blocking(move || f(&guard))
        .await
        .map_err(|e| Error::internal(format!("storage task failed: {e}")))?
}

/// Storage engine for the catalog and its activity.
///
/// Provides persistent storage using `SQLite` with support for:
/// - Catalog entries of both kinds in one id space
/// - Submission and feedback queues
/// - Download tracking deduplicated by hashed client IP, all-time and per month
/// - Archiving each month's most downloaded entries
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        // WAL lets the page handlers read while a download is being recorded
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Wrap the storage for sharing across tasks.
    #[must_use]
    pub fn into_shared(self) -> SharedStorage {
        Arc::new(Mutex::new(self))
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_in_memory(&self) -> bool {
        self.path.to_string_lossy() == ":memory:"
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let count_kind = |kind: EntryKind| -> Result<i64> {
            Ok(self.conn.query_row(
                "SELECT COUNT(*) FROM entries WHERE kind = ?1",
                [kind.as_str()],
                |row| row.get(0),
            )?)
        };
        let count_all = |table: &str| -> Result<i64> {
            Ok(self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?)
        };

        let db_size_bytes = if self.is_in_memory() {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            romhacks: count_kind(EntryKind::Romhack)?,
            ports: count_kind(EntryKind::Port)?,
            submissions: self.submission_counts()?,
            feedback: count_all("feedback")?,
            total_downloads: count_all("downloads")?,
            monthly_download_rows: count_all("monthly_downloads")?,
            archived_months: self.archived_months()?.len(),
            schema_version: migrations::get_schema_version(&self.conn)?,
            db_size_bytes,
        })
    }

    /// Write a compacted copy of the database to `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if `target` already exists or the copy fails.
    pub fn backup_to(&self, target: impl AsRef<Path>) -> Result<()> {
        let target = target.as_ref();
        if target.exists() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("backup target {} already exists", target.display()),
            )));
        }

        self.conn
            .execute("VACUUM INTO ?1", [target.to_string_lossy().as_ref()])?;
        info!("Backed up database to {}", target.display());
        Ok(())
    }

    /// Check the schema and database integrity.
    ///
    /// Returns a list of problems; an empty list means the database is healthy.
    ///
    /// # Errors
    ///
    /// Returns an error if the checks themselves cannot run.
    pub fn verify_schema(&self) -> Result<Vec<String>> {
        let mut issues = Vec::new();

        for (table, required) in schema::REQUIRED_COLUMNS {
            let mut stmt = self
                .conn
                .prepare("SELECT name FROM pragma_table_info(?1)")?;
            let columns = stmt
                .query_map([table], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            if columns.is_empty() {
                issues.push(format!("table {table} is missing"));
                continue;
            }
            for column in *required {
                if !columns.iter().any(|c| c == column) {
                    issues.push(format!("column {table}.{column} is missing"));
                }
            }
        }

        let version = migrations::get_schema_version(&self.conn)?;
        if version != migrations::CURRENT_VERSION {
            issues.push(format!(
                "schema version is {version}, expected {}",
                migrations::CURRENT_VERSION
            ));
        }

        let integrity: String = self
            .conn
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        if integrity != "ok" {
            issues.push(format!("integrity check failed: {integrity}"));
        }

        Ok(issues)
    }
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    /// Number of ROM hack entries.
    pub romhacks: i64,
    /// Number of port entries.
    pub ports: i64,
    /// Submissions per status.
    pub submissions: SubmissionCounts,
    /// Number of feedback reports.
    pub feedback: i64,
    /// Distinct (entry, client) download pairs, all-time.
    pub total_downloads: i64,
    /// Rows in the monthly download table, across all months.
    pub monthly_download_rows: i64,
    /// Number of months in the popularity archive.
    pub archived_months: usize,
    /// Schema version recorded in the database.
    pub schema_version: i32,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

/// Format a timestamp the way it is stored.
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse a stored timestamp.
///
/// Accepts RFC 3339 and `SQLite`'s `CURRENT_TIMESTAMP` format.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// Encode a string list as JSON text.
pub(crate) fn encode_list(items: &[String]) -> Result<String> {
    Ok(serde_json::to_string(items)?)
}

/// Decode a list column.
///
/// JSON arrays are the normal form; older rows may hold one item per line.
pub(crate) fn decode_list(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Vec::new();
    };
    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(items) => items,
        Err(_) => raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
    }
}

/// Treat blank text as absent.
pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
