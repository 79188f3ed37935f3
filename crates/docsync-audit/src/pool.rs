//! Database connection pool management for the audit trail.
//!
//! Mirrors `docsync-catalog::pool::DatabasePool`: same WAL/migration
//! shape, separate schema. The audit log is typically pointed at its
//! own SQLite file but can share the catalog's if a deployment prefers
//! a single file.

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use thiserror::Error;

/// Errors that can occur while establishing or migrating the audit pool.
#[derive(Debug, Error)]
pub enum AuditStoreError {
    #[error("failed to connect to audit database: {0}")]
    ConnectionFailed(String),

    #[error("failed to run audit migrations: {0}")]
    MigrationFailed(String),
}

/// Manages a pool of SQLite connections for audit log persistence.
pub struct AuditPool {
    pool: SqlitePool,
}

impl AuditPool {
    /// Creates a new audit pool connected to the specified file.
    pub async fn new(db_path: &Path, max_connections: u32) -> Result<Self, AuditStoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AuditStoreError::ConnectionFailed(format!(
                    "Failed to create audit database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| {
                AuditStoreError::ConnectionFailed(format!(
                    "Failed to connect to audit database at {}: {}",
                    db_path.display(),
                    e
                ))
            })?;

        Self::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Creates an in-memory audit pool, typically for tests.
    pub async fn in_memory() -> Result<Self, AuditStoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| {
                AuditStoreError::ConnectionFailed(format!(
                    "Failed to create in-memory audit database: {e}"
                ))
            })?;

        Self::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Wraps an already-open pool (e.g. the catalog's, for deployments that
    /// share one SQLite file between catalog and audit tables), running the
    /// audit migration against it.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, AuditStoreError> {
        Self::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Returns a reference to the underlying SQLite connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<(), AuditStoreError> {
        let migration_sql = include_str!("../migrations/20260203_audit.sql");
        sqlx::raw_sql(migration_sql)
            .execute(pool)
            .await
            .map_err(|e| AuditStoreError::MigrationFailed(format!("{e}")))?;
        Ok(())
    }
}
