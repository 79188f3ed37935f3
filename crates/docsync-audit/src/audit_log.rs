//! `AuditLog` - high-level audit logging service.
//!
//! Wraps a `SqlitePool` holding the `audit_log` table with convenience
//! methods for each type of auditable engine event. All write methods are
//! non-fatal: errors in audit persistence are logged via `tracing::warn!`
//! but never propagated, so a dying audit trail never aborts a sync run.

use chrono::{DateTime, Utc};
use serde_json::{json, Value as JsonValue};
use sqlx::SqlitePool;

use crate::event::{AuditEvent, AuditEventKind};

/// High-level audit logger backed by the audit SQLite pool.
pub struct AuditLog {
    pool: SqlitePool,
}

impl AuditLog {
    /// Creates a new `AuditLog` writing to the given pool's `audit_log` table.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist one event, swallowing errors with a tracing warning.
    async fn record(
        &self,
        kb_name: &str,
        sync_run_id: Option<i64>,
        kind: AuditEventKind,
        details: JsonValue,
    ) {
        let occurred_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO audit_log (kb_name, sync_run_id, event_kind, details, occurred_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(kb_name)
        .bind(sync_run_id)
        .bind(kind.to_string())
        .bind(details.to_string())
        .bind(occurred_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            tracing::warn!(error = %e, kb_name, %kind, "failed to write audit log entry");
        }
    }

    // ------------------------------------------------------------------
    // Sync / scan run lifecycle
    // ------------------------------------------------------------------

    pub async fn log_sync_started(&self, kb_name: &str, sync_run_id: i64) {
        self.record(kb_name, Some(sync_run_id), AuditEventKind::SyncStarted, json!({}))
            .await;
    }

    pub async fn log_sync_completed(
        &self,
        kb_name: &str,
        sync_run_id: i64,
        files_new: u32,
        files_modified: u32,
        files_deleted: u32,
        files_unchanged: u32,
        files_error: u32,
        duration_ms: u64,
    ) {
        self.record(
            kb_name,
            Some(sync_run_id),
            AuditEventKind::SyncCompleted,
            json!({
                "files_new": files_new,
                "files_modified": files_modified,
                "files_deleted": files_deleted,
                "files_unchanged": files_unchanged,
                "files_error": files_error,
                "duration_ms": duration_ms,
            }),
        )
        .await;
    }

    pub async fn log_sync_failed(&self, kb_name: &str, sync_run_id: i64, message: &str) {
        self.record(
            kb_name,
            Some(sync_run_id),
            AuditEventKind::SyncFailed,
            json!({ "message": message }),
        )
        .await;
    }

    pub async fn log_scan_started(&self, kb_name: &str, sync_run_id: i64) {
        self.record(kb_name, Some(sync_run_id), AuditEventKind::ScanStarted, json!({}))
            .await;
    }

    pub async fn log_scan_completed(
        &self,
        kb_name: &str,
        sync_run_id: i64,
        files_scanned: u32,
        files_scan_error: u32,
        duration_ms: u64,
    ) {
        self.record(
            kb_name,
            Some(sync_run_id),
            AuditEventKind::ScanCompleted,
            json!({
                "files_scanned": files_scanned,
                "files_scan_error": files_scan_error,
                "duration_ms": duration_ms,
            }),
        )
        .await;
    }

    pub async fn log_scan_failed(&self, kb_name: &str, sync_run_id: i64, message: &str) {
        self.record(
            kb_name,
            Some(sync_run_id),
            AuditEventKind::ScanFailed,
            json!({ "message": message }),
        )
        .await;
    }

    // ------------------------------------------------------------------
    // Per-file events
    // ------------------------------------------------------------------

    pub async fn log_file_uploaded(
        &self,
        kb_name: &str,
        sync_run_id: i64,
        original_uri: &str,
        rag_uri: &str,
        size_bytes: u64,
    ) {
        self.record(
            kb_name,
            Some(sync_run_id),
            AuditEventKind::FileUploaded,
            json!({
                "original_uri": original_uri,
                "rag_uri": rag_uri,
                "size_bytes": size_bytes,
            }),
        )
        .await;
    }

    pub async fn log_file_updated(
        &self,
        kb_name: &str,
        sync_run_id: i64,
        original_uri: &str,
        rag_uri: &str,
        size_bytes: u64,
    ) {
        self.record(
            kb_name,
            Some(sync_run_id),
            AuditEventKind::FileUpdated,
            json!({
                "original_uri": original_uri,
                "rag_uri": rag_uri,
                "size_bytes": size_bytes,
            }),
        )
        .await;
    }

    pub async fn log_file_deleted(&self, kb_name: &str, sync_run_id: i64, original_uri: &str) {
        self.record(
            kb_name,
            Some(sync_run_id),
            AuditEventKind::FileDeleted,
            json!({ "original_uri": original_uri }),
        )
        .await;
    }

    pub async fn log_file_error(
        &self,
        kb_name: &str,
        sync_run_id: i64,
        original_uri: &str,
        reason: &str,
        message: &str,
    ) {
        self.record(
            kb_name,
            Some(sync_run_id),
            AuditEventKind::FileError,
            json!({
                "original_uri": original_uri,
                "reason": reason,
                "message": message,
            }),
        )
        .await;
    }

    // ------------------------------------------------------------------
    // Delta tokens and the schema bridge
    // ------------------------------------------------------------------

    pub async fn log_delta_token_refreshed(&self, kb_name: &str, source_id: &str, drive_id: &str) {
        self.record(
            kb_name,
            None,
            AuditEventKind::DeltaTokenRefreshed,
            json!({ "source_id": source_id, "drive_id": drive_id }),
        )
        .await;
    }

    pub async fn log_delta_token_cleared(
        &self,
        kb_name: &str,
        source_id: &str,
        drive_id: &str,
        reason: &str,
    ) {
        self.record(
            kb_name,
            None,
            AuditEventKind::DeltaTokenCleared,
            json!({ "source_id": source_id, "drive_id": drive_id, "reason": reason }),
        )
        .await;
    }

    pub async fn log_schema_bridge_resolved(
        &self,
        multi_kb_name: &str,
        compatible_kb_id: i64,
        created_placeholder: bool,
    ) {
        self.record(
            multi_kb_name,
            None,
            AuditEventKind::SchemaBridgeResolved,
            json!({
                "compatible_kb_id": compatible_kb_id,
                "created_placeholder": created_placeholder,
            }),
        )
        .await;
    }

    // ------------------------------------------------------------------
    // Queries, for `status`/`info`/explain tooling
    // ------------------------------------------------------------------

    /// Events for one KB since a timestamp, newest first, capped at `limit`.
    pub async fn query_since(
        &self,
        kb_name: &str,
        since: DateTime<Utc>,
        limit: u32,
    ) -> anyhow::Result<Vec<AuditEvent>> {
        let rows: Vec<(i64, String, Option<i64>, String, String, String)> = sqlx::query_as(
            "SELECT id, kb_name, sync_run_id, event_kind, details, occurred_at
             FROM audit_log
             WHERE kb_name = ? AND occurred_at >= ?
             ORDER BY occurred_at DESC, id DESC
             LIMIT ?",
        )
        .bind(kb_name)
        .bind(since.to_rfc3339())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, kb_name, sync_run_id, event_kind, details, occurred_at)| {
                let kind = AuditEventKind::parse(&event_kind)
                    .ok_or_else(|| anyhow::anyhow!("unknown audit event kind: {event_kind}"))?;
                Ok(AuditEvent {
                    id,
                    kb_name,
                    sync_run_id,
                    kind,
                    details: serde_json::from_str(&details)?,
                    occurred_at: DateTime::parse_from_rfc3339(&occurred_at)?.with_timezone(&Utc),
                })
            })
            .collect()
    }
}
