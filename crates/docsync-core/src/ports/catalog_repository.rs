//! Catalog Repository port: the engine's view of the durable catalog

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{
    DeltaToken, FileRecord, KbId, KbName, KnowledgeBase, MultiSourceKnowledgeBase, SourceId,
    SyncCounters, SyncRun, SyncRunId, SyncRunStatus,
};

/// Errors surfaced by a catalog repository implementation.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog unavailable: {0}")]
    Unavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
}

/// The engine's view of the durable catalog: knowledge bases, sync runs,
/// file records, and delta-sync tokens.
///
/// Implementations own their own connection pool and must make per-file
/// inserts and the terminal sync-run update/final-batch-insert transactional
/// as described in the Sync-Run Orchestrator's contract.
#[async_trait]
pub trait ICatalogRepository: Send + Sync {
    // -- Knowledge bases --------------------------------------------------

    async fn get_knowledge_base(&self, name: &KbName) -> Result<Option<KnowledgeBase>, CatalogError>;

    async fn get_multi_source_knowledge_base(
        &self,
        name: &KbName,
    ) -> Result<Option<MultiSourceKnowledgeBase>, CatalogError>;

    /// Finds the lowest-id single-source KB whose name matches
    /// `"<prefix>%"`, used by the multi-source driver's schema bridge.
    async fn find_compatible_kb_by_prefix(
        &self,
        prefix: &str,
    ) -> Result<Option<KnowledgeBase>, CatalogError>;

    /// Creates the placeholder single-source KB used when no compatible KB
    /// is found for a multi-source KB's schema bridge.
    async fn create_placeholder_kb(
        &self,
        name: &KbName,
        rag_type: &str,
        rag_config: &serde_json::Value,
        multi_source_kb_id: KbId,
    ) -> Result<KnowledgeBase, CatalogError>;

    // -- Sync runs ----------------------------------------------------------

    /// `multi_source_kb_id` carries the originating multi-source KB id
    /// through the schema bridge when this run was fanned out by the
    /// Multi-Source Driver; `None` for a plain single-source run.
    async fn create_sync_run(
        &self,
        kb_id: KbId,
        status: SyncRunStatus,
        multi_source_kb_id: Option<KbId>,
    ) -> Result<SyncRunId, CatalogError>;

    async fn update_sync_run(
        &self,
        sync_run_id: SyncRunId,
        counters: SyncCounters,
        end_time: Option<DateTime<Utc>>,
        status: SyncRunStatus,
        error_message: Option<String>,
    ) -> Result<(), CatalogError>;

    async fn get_sync_run(&self, sync_run_id: SyncRunId) -> Result<Option<SyncRun>, CatalogError>;

    /// Most recent sync runs for a KB, most recent first.
    async fn recent_sync_runs(
        &self,
        kb_id: KbId,
        limit: u32,
    ) -> Result<Vec<SyncRun>, CatalogError>;

    // -- File records ---------------------------------------------------

    async fn insert_file_record(&self, record: &FileRecord) -> Result<(), CatalogError>;

    /// For each URI ever seen under this KB, the most recent `FileRecord`
    /// (by the owning sync run's `start_time`).
    async fn latest_records_by_kb(
        &self,
        kb_name: &KbName,
    ) -> Result<HashMap<String, FileRecord>, CatalogError>;

    /// All records for one URI within a KB, most recent first.
    async fn records_by_uri(
        &self,
        kb_id: KbId,
        original_uri: &str,
    ) -> Result<Vec<FileRecord>, CatalogError>;

    // -- Delta tokens -----------------------------------------------------

    async fn get_delta_token(
        &self,
        source_id: &SourceId,
        drive_id: &str,
    ) -> Result<Option<DeltaToken>, CatalogError>;

    async fn save_delta_token(
        &self,
        source_id: &SourceId,
        source_type: &str,
        drive_id: &str,
        token: &DeltaToken,
    ) -> Result<(), CatalogError>;

    async fn clear_delta_token(
        &self,
        source_id: &SourceId,
        drive_id: &str,
    ) -> Result<(), CatalogError>;
}
