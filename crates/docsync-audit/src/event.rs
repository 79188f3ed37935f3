//! Audit event taxonomy.
//!
//! Distinct from `docsync_core::domain::FileRecord`: a `FileRecord` is the
//! catalog's authoritative statement about one URI's latest state, while an
//! `AuditEvent` is an append-only log entry about something the engine did.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// The kind of engine-level event being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    SyncStarted,
    SyncCompleted,
    SyncFailed,
    ScanStarted,
    ScanCompleted,
    ScanFailed,
    FileUploaded,
    FileUpdated,
    FileDeleted,
    FileError,
    DeltaTokenRefreshed,
    DeltaTokenCleared,
    SchemaBridgeResolved,
}

impl fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuditEventKind::SyncStarted => "sync_started",
            AuditEventKind::SyncCompleted => "sync_completed",
            AuditEventKind::SyncFailed => "sync_failed",
            AuditEventKind::ScanStarted => "scan_started",
            AuditEventKind::ScanCompleted => "scan_completed",
            AuditEventKind::ScanFailed => "scan_failed",
            AuditEventKind::FileUploaded => "file_uploaded",
            AuditEventKind::FileUpdated => "file_updated",
            AuditEventKind::FileDeleted => "file_deleted",
            AuditEventKind::FileError => "file_error",
            AuditEventKind::DeltaTokenRefreshed => "delta_token_refreshed",
            AuditEventKind::DeltaTokenCleared => "delta_token_cleared",
            AuditEventKind::SchemaBridgeResolved => "schema_bridge_resolved",
        };
        write!(f, "{s}")
    }
}

impl AuditEventKind {
    /// Parses the `TEXT` value stored in `audit_log.event_kind` back into a kind.
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "sync_started" => AuditEventKind::SyncStarted,
            "sync_completed" => AuditEventKind::SyncCompleted,
            "sync_failed" => AuditEventKind::SyncFailed,
            "scan_started" => AuditEventKind::ScanStarted,
            "scan_completed" => AuditEventKind::ScanCompleted,
            "scan_failed" => AuditEventKind::ScanFailed,
            "file_uploaded" => AuditEventKind::FileUploaded,
            "file_updated" => AuditEventKind::FileUpdated,
            "file_deleted" => AuditEventKind::FileDeleted,
            "file_error" => AuditEventKind::FileError,
            "delta_token_refreshed" => AuditEventKind::DeltaTokenRefreshed,
            "delta_token_cleared" => AuditEventKind::DeltaTokenCleared,
            "schema_bridge_resolved" => AuditEventKind::SchemaBridgeResolved,
            _ => return None,
        })
    }
}

/// One row of the audit trail, as read back for `status`/`info`/explain tooling.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub id: i64,
    pub kb_name: String,
    pub sync_run_id: Option<i64>,
    pub kind: AuditEventKind,
    pub details: JsonValue,
    pub occurred_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_display_and_parse_round_trip() {
        for kind in [
            AuditEventKind::SyncStarted,
            AuditEventKind::SyncCompleted,
            AuditEventKind::SyncFailed,
            AuditEventKind::ScanStarted,
            AuditEventKind::ScanCompleted,
            AuditEventKind::ScanFailed,
            AuditEventKind::FileUploaded,
            AuditEventKind::FileUpdated,
            AuditEventKind::FileDeleted,
            AuditEventKind::FileError,
            AuditEventKind::DeltaTokenRefreshed,
            AuditEventKind::DeltaTokenCleared,
            AuditEventKind::SchemaBridgeResolved,
        ] {
            let s = kind.to_string();
            assert_eq!(AuditEventKind::parse(&s), Some(kind));
        }
    }

    #[test]
    fn parse_rejects_unknown_kind() {
        assert_eq!(AuditEventKind::parse("not_a_kind"), None);
    }
}
