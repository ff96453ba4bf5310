//! SQLite ledger implementation

use async_trait::async_trait;
use feed_relay_domain::{Ledger, LedgerError, LedgerRecord};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::path::Path;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// SQLite-backed ledger
pub struct SqliteLedger {
    pool: SqlitePool,
}

impl SqliteLedger {
    /// Open (or create) the ledger database at `db_path`
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let db_path = db_path.as_ref();

        // Create parent directories if needed
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| LedgerError::Database(format!("Failed to create directory: {}", e)))?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await
            .map_err(|e| LedgerError::Database(e.to_string()))?;

        let ledger = Self { pool };
        ledger.run_migrations().await?;

        Ok(ledger)
    }

    #[cfg(test)]
    pub(crate) async fn in_memory() -> Result<Self, LedgerError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| LedgerError::Database(e.to_string()))?;

        let ledger = Self { pool };
        ledger.run_migrations().await?;

        Ok(ledger)
    }

    async fn run_migrations(&self) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ledger (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_uri TEXT NOT NULL UNIQUE,
                posted INTEGER NOT NULL DEFAULT 0,
                first_seen_at TEXT NOT NULL,
                posted_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| LedgerError::Database(e.to_string()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_ledger_posted ON ledger(posted)")
            .execute(&self.pool)
            .await
            .map_err(|e| LedgerError::Database(e.to_string()))?;

        Ok(())
    }

    async fn list_by_posted(&self, posted: bool) -> Result<Vec<String>, LedgerError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT source_uri FROM ledger WHERE posted = ? ORDER BY id")
                .bind(posted)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| LedgerError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(|(uri,)| uri).collect())
    }
}

fn format_time(at: OffsetDateTime) -> Result<String, LedgerError> {
    at.format(&Rfc3339)
        .map_err(|e| LedgerError::Serialization(e.to_string()))
}

fn parse_time(value: &str) -> Result<OffsetDateTime, LedgerError> {
    OffsetDateTime::parse(value, &Rfc3339).map_err(|e| LedgerError::Serialization(e.to_string()))
}

#[async_trait]
impl Ledger for SqliteLedger {
    async fn init(&self) -> Result<(), LedgerError> {
        self.run_migrations().await
    }

    async fn is_posted(&self, source_uri: &str) -> Result<bool, LedgerError> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM ledger WHERE source_uri = ? AND posted = 1")
                .bind(source_uri)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| LedgerError::Database(e.to_string()))?;

        Ok(count.0 > 0)
    }

    async fn list_posted(&self) -> Result<Vec<String>, LedgerError> {
        self.list_by_posted(true).await
    }

    async fn list_unposted(&self) -> Result<Vec<String>, LedgerError> {
        self.list_by_posted(false).await
    }

    async fn record_observed(&self, source_uri: &str, at: OffsetDateTime) -> Result<(), LedgerError> {
        let seen_at = format_time(at)?;

        sqlx::query(
            r#"
            INSERT INTO ledger (source_uri, posted, first_seen_at)
            VALUES (?, 0, ?)
            ON CONFLICT(source_uri) DO NOTHING
            "#,
        )
        .bind(source_uri)
        .bind(&seen_at)
        .execute(&self.pool)
        .await
        .map_err(|e| LedgerError::Database(e.to_string()))?;

        tracing::debug!(source_uri, "Recorded observation");
        Ok(())
    }

    async fn upsert_posted(&self, source_uri: &str, at: OffsetDateTime) -> Result<(), LedgerError> {
        let posted_at = format_time(at)?;

        sqlx::query(
            r#"
            INSERT INTO ledger (source_uri, posted, first_seen_at, posted_at)
            VALUES (?, 1, ?, ?)
            ON CONFLICT(source_uri) DO UPDATE SET
                posted = 1,
                posted_at = COALESCE(ledger.posted_at, excluded.posted_at)
            "#,
        )
        .bind(source_uri)
        .bind(&posted_at)
        .bind(&posted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| LedgerError::Database(e.to_string()))?;

        tracing::debug!(source_uri, "Marked posted");
        Ok(())
    }

    async fn get(&self, source_uri: &str) -> Result<Option<LedgerRecord>, LedgerError> {
        let row: Option<(String, bool, String, Option<String>)> = sqlx::query_as(
            "SELECT source_uri, posted, first_seen_at, posted_at FROM ledger WHERE source_uri = ?",
        )
        .bind(source_uri)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| LedgerError::Database(e.to_string()))?;

        match row {
            Some((source_uri, posted, first_seen_at, posted_at)) => Ok(Some(LedgerRecord {
                source_uri,
                posted,
                first_seen_at: parse_time(&first_seen_at)?,
                posted_at: posted_at.as_deref().map(parse_time).transpose()?,
            })),
            None => Ok(None),
        }
    }
}
