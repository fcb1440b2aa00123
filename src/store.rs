//! SQLite persistence: student summaries and the optional message log.
//!
//! Two tables, one write primitive each. Summaries are upserted by email —
//! the primary key guarantees at most one row per student, and the upsert is
//! atomic at the row level. The message log is append-only and is never read
//! back by the chat pipeline; it exists as an audit trail.
//!
//! The schema is applied at connect time from `migrations/001_schema.sql`.

use std::path::Path;

use chrono::{SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{info, trace};

/// Bootstrap schema applied on connect.
const SCHEMA_SQL: &str = include_str!("../migrations/001_schema.sql");

/// Errors from store operations.
///
/// A read failure on the chat path is degraded to "no summary" by the
/// caller; the distinction between "no row" (`Ok(None)`) and "storage
/// unavailable" (`Err`) is kept at this layer so that policy stays a
/// caller decision.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Message author role for the log table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    /// Inbound student message.
    User,
    /// Mentor reply.
    Assistant,
}

impl MessageRole {
    /// Returns the string representation stored in SQLite.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A stored summary row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRecord {
    /// Student identifier.
    pub email: String,
    /// Current summary text.
    pub summary: String,
    /// ISO-8601 timestamp of the last upsert.
    pub updated_at: String,
}

/// Gateway to the summaries table and the message log.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Debug, Clone)]
pub struct SummaryStore {
    db: SqlitePool,
}

impl SummaryStore {
    /// Wrap an existing pool. The schema must already be applied.
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Open (creating if missing) the database file and apply the schema.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the file cannot be opened or the
    /// schema fails to apply.
    pub async fn connect(path: &Path) -> Result<Self, StoreError> {
        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let db = SqlitePoolOptions::new().connect_with(opts).await?;
        sqlx::raw_sql(SCHEMA_SQL).execute(&db).await?;
        info!(path = %path.display(), "summary store opened");
        Ok(Self { db })
    }

    /// Fetch the current summary for a student.
    ///
    /// Returns `Ok(None)` when the student has no summary yet.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] when storage is unavailable.
    pub async fn summary(&self, email: &str) -> Result<Option<String>, StoreError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT summary FROM student_summaries WHERE email = ?1")
                .bind(email)
                .fetch_optional(&self.db)
                .await?;
        Ok(row.map(|(summary,)| summary))
    }

    /// Fetch the full summary row, including its update timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] when storage is unavailable.
    pub async fn summary_record(&self, email: &str) -> Result<Option<SummaryRecord>, StoreError> {
        let row: Option<(String, String, String)> = sqlx::query_as(
            "SELECT email, summary, updated_at FROM student_summaries WHERE email = ?1",
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(|(email, summary, updated_at)| SummaryRecord {
            email,
            summary,
            updated_at,
        }))
    }

    /// Overwrite the stored summary for a student, stamping `updated_at`.
    ///
    /// Last writer wins: there is no concurrency token. Callers that need
    /// ordering serialize through
    /// [`SummaryUpdater`](crate::pipeline::summary::SummaryUpdater).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] when the write fails.
    pub async fn upsert_summary(&self, email: &str, summary: &str) -> Result<(), StoreError> {
        // RFC 3339 with milliseconds: lexicographic order is time order.
        let updated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        sqlx::query(
            "INSERT INTO student_summaries (email, summary, updated_at) \
             VALUES (?1, ?2, ?3) \
             ON CONFLICT(email) DO UPDATE \
             SET summary = excluded.summary, updated_at = excluded.updated_at",
        )
        .bind(email)
        .bind(summary)
        .bind(updated_at)
        .execute(&self.db)
        .await?;
        trace!(email, "summary upserted");
        Ok(())
    }

    /// Liveness probe for the health endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] when the backend does not answer.
    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }

    /// Returns a reference to the underlying pool (test fixtures).
    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }
}

/// Append-only message log, gated by `logging.log_messages`.
#[derive(Debug, Clone)]
pub struct MessageLog {
    db: SqlitePool,
}

impl MessageLog {
    /// Wrap an existing pool. The schema must already be applied.
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Append one role-tagged message.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] when the insert fails.
    pub async fn append(
        &self,
        email: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO message_log (email, role, content) VALUES (?1, ?2, ?3)")
            .bind(email)
            .bind(role.as_str())
            .bind(content)
            .execute(&self.db)
            .await?;
        trace!(email, role = role.as_str(), "message logged");
        Ok(())
    }

    /// Count logged messages for a student (used by tests and admin checks).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] when the query fails.
    pub async fn count_for(&self, email: &str) -> Result<u64, StoreError> {
        let row: (i64,) = sqlx::query_as("SELECT count(*) FROM message_log WHERE email = ?1")
            .bind(email)
            .fetch_one(&self.db)
            .await?;
        // count(*) is always non-negative, safe to cast.
        Ok(row.0.cast_unsigned())
    }
}
