//! Shared catalog/audit/telemetry wiring used by every subcommand.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use docsync_audit::{AuditLog, AuditPool};
use docsync_catalog::{DatabasePool, SqliteCatalogRepository};
use docsync_core::config::Config;
use docsync_core::ports::ICatalogRepository;
use docsync_telemetry::MetricsRegistry;
use sqlx::SqlitePool;

/// Resolves the catalog database path, honoring `DOCSYNC_DB_PATH` over the
/// loaded config's `catalog.db_path`.
fn db_path(config: &Config) -> PathBuf {
    std::env::var("DOCSYNC_DB_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| config.catalog.db_path.clone())
}

/// Resolves the catalog max-connections setting, honoring
/// `DOCSYNC_DB_MAX_CONNECTIONS` over the loaded config.
fn max_connections(config: &Config) -> u32 {
    std::env::var("DOCSYNC_DB_MAX_CONNECTIONS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(config.catalog.max_connections)
}

/// Loads the on-disk config (or defaults), then opens the catalog pool and
/// wraps it in a `SqliteCatalogRepository`. Also returns the raw `SqlitePool`
/// so callers can share the file with the audit log.
pub async fn open_catalog(
    config_path: Option<&str>,
) -> Result<(Config, Arc<dyn ICatalogRepository>, SqlitePool)> {
    let config = match config_path {
        Some(path) => Config::load(&PathBuf::from(path)).context("failed to load config file")?,
        None => Config::load_or_default(&Config::default_path()),
    };

    let path = db_path(&config);
    let db_pool = DatabasePool::new(&path, max_connections(&config))
        .await
        .with_context(|| format!("failed to open catalog database at {}", path.display()))?;

    let sqlite_pool = db_pool.pool().clone();
    let catalog: Arc<dyn ICatalogRepository> = Arc::new(SqliteCatalogRepository::new(db_pool));

    Ok((config, catalog, sqlite_pool))
}

/// Opens an `AuditLog` sharing the catalog's own SQLite file. Audit writes
/// are best-effort; a missing or unreadable audit table never blocks a run.
pub async fn open_audit(pool: &SqlitePool) -> Arc<AuditLog> {
    match AuditPool::from_pool(pool.clone()).await {
        Ok(audit_pool) => Arc::new(AuditLog::new(audit_pool.pool().clone())),
        Err(e) => {
            tracing::warn!(error = %e, "failed to initialize audit log, auditing disabled for this run");
            Arc::new(AuditLog::new(pool.clone()))
        }
    }
}

/// Builds a fresh `MetricsRegistry` for this invocation. The CLI is a
/// one-shot process, so metrics are recorded and encoded to stdout/JSON
/// rather than scraped; nothing is lost by not running the `/metrics`
/// server here.
pub fn open_metrics() -> Arc<MetricsRegistry> {
    Arc::new(MetricsRegistry::new().expect("metrics registry uses static registrations"))
}
