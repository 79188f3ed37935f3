//! Sync-run entities and lifecycle states

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::errors::DomainError;
use super::newtypes::{KbId, SyncRunId};

/// Lifecycle state of a single-source `SyncRun`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncRunStatus {
    Running,
    Completed,
    Failed,
    ScanRunning,
    ScanCompleted,
    ScanFailed,
}

impl SyncRunStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running | Self::ScanRunning)
    }

    #[must_use]
    pub const fn is_scan(self) -> bool {
        matches!(self, Self::ScanRunning | Self::ScanCompleted | Self::ScanFailed)
    }

    /// # Errors
    /// Returns `DomainError::InvalidState` if `self` is already terminal.
    pub fn transition_to(self, next: Self) -> Result<Self, DomainError> {
        if self.is_terminal() {
            return Err(DomainError::InvalidState {
                from: format!("{self:?}"),
                to: format!("{next:?}"),
            });
        }
        Ok(next)
    }
}

impl std::fmt::Display for SyncRunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::ScanRunning => "scan_running",
            Self::ScanCompleted => "scan_completed",
            Self::ScanFailed => "scan_failed",
        };
        write!(f, "{s}")
    }
}

/// How a multi-source KB's sources are driven within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    Parallel,
    Sequential,
    Selective,
    Incremental,
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Parallel => "parallel",
            Self::Sequential => "sequential",
            Self::Selective => "selective",
            Self::Incremental => "incremental",
        };
        write!(f, "{s}")
    }
}

/// Running tallies for a sync run. Must only increase during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCounters {
    pub total: u64,
    pub new: u64,
    pub modified: u64,
    pub deleted: u64,
    pub errors: u64,
}

impl SyncCounters {
    #[must_use]
    pub fn unchanged(&self) -> u64 {
        self.total
            .saturating_sub(self.new)
            .saturating_sub(self.modified)
            .saturating_sub(self.deleted)
            .saturating_sub(self.errors)
    }
}

/// A sync run against a single-source `KnowledgeBase` (directly, or as the
/// per-source run underlying a multi-source sync via the schema bridge).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRun {
    pub id: SyncRunId,
    pub knowledge_base_id: KbId,
    /// The originating multi-source KB id when this run was fanned out by
    /// the Multi-Source Driver; `None` for a plain single-source run.
    pub multi_source_kb_id: Option<KbId>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: SyncRunStatus,
    pub counters: SyncCounters,
    pub error_message: Option<String>,
}

/// A sync run against a `MultiSourceKnowledgeBase`, aggregating the
/// per-source `SyncRun`s the driver launched underneath it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiSourceSyncRun {
    pub id: SyncRunId,
    pub multi_source_kb_id: KbId,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: SyncRunStatus,
    pub counters: SyncCounters,
    pub sync_mode: SyncMode,
    pub sources_processed: Vec<String>,
    pub source_stats: JsonValue,
    pub error_message: Option<String>,
}
