//! File record entity: the per-file outcome of one sync run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::newtypes::{FileContentHash, FileRecordId, OriginalUri, RagUri, SyncRunId, UuidFilename};

/// Classification/outcome of a file within a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileRecordStatus {
    New,
    Modified,
    Unchanged,
    Deleted,
    Error,
    Scanned,
    ScanError,
}

impl FileRecordStatus {
    #[must_use]
    pub const fn is_error(self) -> bool {
        matches!(self, Self::Error | Self::ScanError)
    }

    /// Whether this status represents a "live" (non-deleted) file for the
    /// purposes of classifying a future run's listing against it.
    #[must_use]
    pub const fn is_live(self) -> bool {
        !matches!(self, Self::Deleted)
    }
}

impl std::fmt::Display for FileRecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::New => "new",
            Self::Modified => "modified",
            Self::Unchanged => "unchanged",
            Self::Deleted => "deleted",
            Self::Error => "error",
            Self::Scanned => "scanned",
            Self::ScanError => "scan_error",
        };
        write!(f, "{s}")
    }
}

/// The per-file outcome recorded for one URI within one sync run.
///
/// `rag_uri` and `uuid_filename` are always non-null, even on error rows
/// (the error sentinel form is `"<kb-name>/error-<unix-ts>"` for `rag_uri`
/// and the empty string for `uuid_filename` when no UUID was ever assigned).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileRecordId,
    pub sync_run_id: SyncRunId,
    pub original_uri: OriginalUri,
    pub rag_uri: RagUri,
    pub file_hash: FileContentHash,
    pub uuid_filename: String,
    pub upload_time: DateTime<Utc>,
    pub file_size: u64,
    pub status: FileRecordStatus,
    pub error_message: Option<String>,

    // Source-tagging fields, populated from the source adapter's descriptor.
    pub source_id: Option<String>,
    pub source_type: Option<String>,
    pub source_path: Option<String>,
    pub content_type: Option<String>,
    pub source_metadata: Option<JsonValue>,
    pub source_created_at: Option<DateTime<Utc>>,
    pub source_modified_at: Option<DateTime<Utc>>,
    pub tags: Option<JsonValue>,
}

impl FileRecord {
    /// The stable UUID-based filename, if one was ever assigned (empty on
    /// rows that errored before acquiring a real RAG identity).
    #[must_use]
    pub fn uuid_filename(&self) -> Option<&str> {
        if self.uuid_filename.is_empty() {
            None
        } else {
            Some(&self.uuid_filename)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::newtypes::{FileRecordId as FrId, OriginalUri as Uri, RagUri as Rag, SyncRunId as RunId};
    use chrono::TimeZone;

    fn record(status: FileRecordStatus, uuid_filename: &str) -> FileRecord {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        FileRecord {
            id: FrId::new(1),
            sync_run_id: RunId::new(1),
            original_uri: Uri::new("/docs/a.txt".to_string()).unwrap(),
            rag_uri: Rag::new("kb/uuid.txt".to_string()).unwrap(),
            file_hash: FileContentHash::empty(),
            uuid_filename: uuid_filename.to_string(),
            upload_time: now,
            file_size: 0,
            status,
            error_message: None,
            source_id: None,
            source_type: None,
            source_path: None,
            content_type: None,
            source_metadata: None,
            source_created_at: None,
            source_modified_at: None,
            tags: None,
        }
    }

    #[test]
    fn is_error_covers_both_scan_and_sync_error() {
        assert!(record(FileRecordStatus::Error, "x").status.is_error());
        assert!(record(FileRecordStatus::ScanError, "x").status.is_error());
        assert!(!record(FileRecordStatus::New, "x").status.is_error());
    }

    #[test]
    fn is_live_false_only_for_deleted() {
        assert!(!record(FileRecordStatus::Deleted, "x").status.is_live());
        assert!(record(FileRecordStatus::Unchanged, "x").status.is_live());
    }

    #[test]
    fn empty_uuid_filename_reads_as_none() {
        assert_eq!(record(FileRecordStatus::Error, "").uuid_filename(), None);
        assert_eq!(
            record(FileRecordStatus::New, "abc.txt").uuid_filename(),
            Some("abc.txt")
        );
    }
}
