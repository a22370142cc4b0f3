//! Thread title sync against the relational `"Thread"` table.
//!
//! Implements `ThreadTitleSync` from `chatkeep-core` using sqlx's `Any`
//! driver: Postgres in production, SQLite accepted for local runs and tests.
//! A connection is opened per call and dropped on every exit path; calls
//! happen once per session end, so no pool is kept.

use chatkeep_core::chat::title_sync::ThreadTitleSync;
use chatkeep_types::config::ThreadDbConfig;
use chatkeep_types::error::SyncError;
use sqlx::AnyConnection;
use sqlx::{Connection, Row};

const UPDATE_TITLE_SQL: &str = r#"UPDATE "Thread" SET name = $1 WHERE id = $2"#;

const RECENT_THREADS_SQL: &str =
    r#"SELECT id, name FROM "Thread" ORDER BY "updatedAt" DESC LIMIT $1"#;

/// One row of the recent threads listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadRow {
    pub id: String,
    pub name: Option<String>,
}

/// sqlx-backed thread title sync.
///
/// Does not derive Debug: the connection URL may embed a password.
pub struct SqlThreadTitleSync {
    url: String,
}

impl SqlThreadTitleSync {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Build from config, or `None` when no thread database is configured.
    pub fn from_config(config: &ThreadDbConfig) -> Option<Self> {
        config.connection_url().map(Self::new)
    }

    async fn connect(&self) -> Result<AnyConnection, SyncError> {
        sqlx::any::install_default_drivers();
        AnyConnection::connect(&self.url)
            .await
            .map_err(|e| SyncError::Connection(e.to_string()))
    }

    /// Most recently updated threads, newest first.
    pub async fn recent_threads(&self, limit: u32) -> Result<Vec<ThreadRow>, SyncError> {
        let mut conn = self.connect().await?;

        let rows = sqlx::query(RECENT_THREADS_SQL)
            .bind(i64::from(limit))
            .fetch_all(&mut conn)
            .await
            .map_err(|e| SyncError::Query(e.to_string()))?;

        let threads = rows
            .iter()
            .map(|row| {
                Ok(ThreadRow {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| SyncError::Query(e.to_string()))?;

        if let Err(e) = conn.close().await {
            tracing::debug!(error = %e, "Error closing thread database connection");
        }
        Ok(threads)
    }
}

impl ThreadTitleSync for SqlThreadTitleSync {
    async fn update_title(&self, session_id: &str, title: &str) -> Result<(), SyncError> {
        let mut conn = self.connect().await?;
        let mut tx = conn
            .begin()
            .await
            .map_err(|e| SyncError::Query(e.to_string()))?;

        let result = sqlx::query(UPDATE_TITLE_SQL)
            .bind(title)
            .bind(session_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| SyncError::Query(e.to_string()))?;

        // Dropping the transaction without commit rolls it back.
        if result.rows_affected() == 0 {
            return Err(SyncError::ThreadNotFound(session_id.to_string()));
        }

        tx.commit()
            .await
            .map_err(|e| SyncError::Query(e.to_string()))?;

        if let Err(e) = conn.close().await {
            tracing::debug!(error = %e, "Error closing thread database connection");
        }

        tracing::info!(session_id, title, "Thread title updated");
        Ok(())
    }
}
