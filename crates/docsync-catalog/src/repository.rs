//! SQLite implementation of `ICatalogRepository`
//!
//! # Type Mapping
//!
//! | Domain type            | Column type | Notes                                        |
//! |-------------------------|-------------|-----------------------------------------------|
//! | `KbId`/`SyncRunId`/...  | INTEGER     | AUTOINCREMENT row id                          |
//! | `KbName`/`SourceId`     | TEXT        | validated at the domain layer                 |
//! | `DateTime<Utc>`         | TEXT        | RFC 3339                                      |
//! | `JsonValue`             | TEXT        | `serde_json` round trip                       |
//! | `FileRecordStatus` etc. | TEXT        | lowercase snake_case via `Display`/`FromStr`  |

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use docsync_core::domain::{
    DeltaToken, FileContentHash, FileRecord, FileRecordId, FileRecordStatus, KbId, KbName,
    KnowledgeBase, MultiSourceKnowledgeBase, OriginalUri, RagUri, SourceDefinition, SourceId,
    SyncCounters, SyncRun, SyncRunId, SyncRunStatus,
};
use docsync_core::ports::{CatalogError, ICatalogRepository};

use crate::pool::DatabasePool;

/// SQLite-backed implementation of the catalog repository port.
pub struct SqliteCatalogRepository {
    pool: DatabasePool,
}

impl SqliteCatalogRepository {
    #[must_use]
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, CatalogError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CatalogError::Unavailable(format!("invalid timestamp {s}: {e}")))
}

fn parse_optional_datetime(s: Option<String>) -> Result<Option<DateTime<Utc>>, CatalogError> {
    s.map(|s| parse_datetime(&s)).transpose()
}

fn parse_optional_json(s: Option<String>) -> Option<JsonValue> {
    s.and_then(|s| serde_json::from_str(&s).ok())
}

fn knowledge_base_from_row(row: &SqliteRow) -> Result<KnowledgeBase, CatalogError> {
    let id: i64 = row.get("id");
    let name: String = row.get("name");
    let source_config: String = row.get("source_config");
    let rag_config: String = row.get("rag_config");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(KnowledgeBase {
        id: KbId::new(id),
        name: KbName::new(name)
            .map_err(|e| CatalogError::Unavailable(format!("corrupt kb name: {e}")))?,
        source_type: row.get("source_type_tag"),
        source_config: serde_json::from_str(&source_config)
            .map_err(|e| CatalogError::Unavailable(format!("corrupt source_config: {e}")))?,
        rag_type: row.get("rag_type_tag"),
        rag_config: serde_json::from_str(&rag_config)
            .map_err(|e| CatalogError::Unavailable(format!("corrupt rag_config: {e}")))?,
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}

fn sync_run_from_row(row: &SqliteRow) -> Result<SyncRun, CatalogError> {
    let id: i64 = row.get("id");
    let kb_id: i64 = row.get("knowledge_base_id");
    let multi_source_kb_id: Option<i64> = row.get("multi_source_kb_id");
    let start_time: String = row.get("start_time");
    let end_time: Option<String> = row.get("end_time");
    let status: String = row.get("status");

    Ok(SyncRun {
        id: SyncRunId::new(id),
        knowledge_base_id: KbId::new(kb_id),
        multi_source_kb_id: multi_source_kb_id.map(KbId::new),
        start_time: parse_datetime(&start_time)?,
        end_time: parse_optional_datetime(end_time)?,
        status: status_from_str(&status)?,
        counters: SyncCounters {
            total: row.get::<i64, _>("total_files") as u64,
            new: row.get::<i64, _>("new_files") as u64,
            modified: row.get::<i64, _>("modified_files") as u64,
            deleted: row.get::<i64, _>("deleted_files") as u64,
            errors: row.get::<i64, _>("error_files") as u64,
        },
        error_message: row.get("error_message"),
    })
}

fn file_record_from_row(row: &SqliteRow) -> Result<FileRecord, CatalogError> {
    let id: i64 = row.get("id");
    let sync_run_id: i64 = row.get("sync_run_id");
    let original_uri: String = row.get("original_uri");
    let rag_uri: String = row.get("rag_uri");
    let file_hash: String = row.get("file_hash");
    let upload_time: String = row.get("upload_time");
    let status: String = row.get("status");
    let source_created_at: Option<String> = row.get("source_created_at");
    let source_modified_at: Option<String> = row.get("source_modified_at");
    let source_metadata: Option<String> = row.get("source_metadata");
    let tags: Option<String> = row.get("tags");

    Ok(FileRecord {
        id: FileRecordId::new(id),
        sync_run_id: SyncRunId::new(sync_run_id),
        original_uri: OriginalUri::new(original_uri)
            .map_err(|e| CatalogError::Unavailable(format!("corrupt original_uri: {e}")))?,
        rag_uri: RagUri::new(rag_uri)
            .map_err(|e| CatalogError::Unavailable(format!("corrupt rag_uri: {e}")))?,
        file_hash: FileContentHash::new(file_hash)
            .map_err(|e| CatalogError::Unavailable(format!("corrupt file_hash: {e}")))?,
        uuid_filename: row.get("uuid_filename"),
        upload_time: parse_datetime(&upload_time)?,
        file_size: row.get::<i64, _>("file_size") as u64,
        status: file_record_status_from_str(&status)?,
        error_message: row.get("error_message"),
        source_id: row.get("source_id"),
        source_type: row.get("source_type"),
        source_path: row.get("source_path"),
        content_type: row.get("content_type"),
        source_metadata: parse_optional_json(source_metadata),
        source_created_at: parse_optional_datetime(source_created_at)?,
        source_modified_at: parse_optional_datetime(source_modified_at)?,
        tags: parse_optional_json(tags),
    })
}

fn status_from_str(s: &str) -> Result<SyncRunStatus, CatalogError> {
    match s {
        "running" => Ok(SyncRunStatus::Running),
        "completed" => Ok(SyncRunStatus::Completed),
        "failed" => Ok(SyncRunStatus::Failed),
        "scan_running" => Ok(SyncRunStatus::ScanRunning),
        "scan_completed" => Ok(SyncRunStatus::ScanCompleted),
        "scan_failed" => Ok(SyncRunStatus::ScanFailed),
        other => Err(CatalogError::Unavailable(format!(
            "unknown sync_run status: {other}"
        ))),
    }
}

fn file_record_status_from_str(s: &str) -> Result<FileRecordStatus, CatalogError> {
    match s {
        "new" => Ok(FileRecordStatus::New),
        "modified" => Ok(FileRecordStatus::Modified),
        "unchanged" => Ok(FileRecordStatus::Unchanged),
        "deleted" => Ok(FileRecordStatus::Deleted),
        "error" => Ok(FileRecordStatus::Error),
        "scanned" => Ok(FileRecordStatus::Scanned),
        "scan_error" => Ok(FileRecordStatus::ScanError),
        other => Err(CatalogError::Unavailable(format!(
            "unknown file_record status: {other}"
        ))),
    }
}

#[async_trait]
impl ICatalogRepository for SqliteCatalogRepository {
    async fn get_knowledge_base(
        &self,
        name: &KbName,
    ) -> Result<Option<KnowledgeBase>, CatalogError> {
        let row = sqlx::query("SELECT * FROM knowledge_base WHERE name = ?")
            .bind(name.as_str())
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| CatalogError::Unavailable(e.to_string()))?;

        row.as_ref().map(knowledge_base_from_row).transpose()
    }

    async fn get_multi_source_knowledge_base(
        &self,
        name: &KbName,
    ) -> Result<Option<MultiSourceKnowledgeBase>, CatalogError> {
        let kb_row = sqlx::query("SELECT * FROM multi_source_knowledge_base WHERE name = ?")
            .bind(name.as_str())
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| CatalogError::Unavailable(e.to_string()))?;

        let Some(kb_row) = kb_row else {
            return Ok(None);
        };

        let id: i64 = kb_row.get("id");
        let rag_config: String = kb_row.get("rag_config");
        let file_organization: String = kb_row.get("file_organization");
        let sync_strategy: String = kb_row.get("sync_strategy");
        let created_at: String = kb_row.get("created_at");
        let updated_at: String = kb_row.get("updated_at");

        let source_rows =
            sqlx::query("SELECT * FROM source_definition WHERE multi_source_kb_id = ? ORDER BY id")
                .bind(id)
                .fetch_all(self.pool.pool())
                .await
                .map_err(|e| CatalogError::Unavailable(e.to_string()))?;

        let mut sources = Vec::with_capacity(source_rows.len());
        for row in &source_rows {
            let source_config: String = row.get("source_config");
            let metadata: Option<String> = row.get("metadata");
            sources.push(SourceDefinition {
                id: KbId::new(row.get("id")),
                multi_source_kb_id: KbId::new(row.get("multi_source_kb_id")),
                source_id: SourceId::new(row.get("source_id"))
                    .map_err(|e| CatalogError::Unavailable(format!("corrupt source_id: {e}")))?,
                source_type: row.get("source_type_tag"),
                source_config: serde_json::from_str(&source_config).map_err(|e| {
                    CatalogError::Unavailable(format!("corrupt source_config: {e}"))
                })?,
                enabled: row.get::<i64, _>("enabled") != 0,
                metadata: parse_optional_json(metadata),
            });
        }

        Ok(Some(MultiSourceKnowledgeBase {
            id: KbId::new(id),
            name: KbName::new(kb_row.get("name"))
                .map_err(|e| CatalogError::Unavailable(format!("corrupt kb name: {e}")))?,
            rag_type: kb_row.get("rag_type_tag"),
            rag_config: serde_json::from_str(&rag_config)
                .map_err(|e| CatalogError::Unavailable(format!("corrupt rag_config: {e}")))?,
            file_organization: serde_json::from_str(&file_organization).map_err(|e| {
                CatalogError::Unavailable(format!("corrupt file_organization: {e}"))
            })?,
            sync_strategy: serde_json::from_str(&sync_strategy)
                .map_err(|e| CatalogError::Unavailable(format!("corrupt sync_strategy: {e}")))?,
            sources,
            created_at: parse_datetime(&created_at)?,
            updated_at: parse_datetime(&updated_at)?,
        }))
    }

    async fn find_compatible_kb_by_prefix(
        &self,
        prefix: &str,
    ) -> Result<Option<KnowledgeBase>, CatalogError> {
        let like_pattern = format!("{prefix}%");
        let row = sqlx::query("SELECT * FROM knowledge_base WHERE name LIKE ? ORDER BY id LIMIT 1")
            .bind(like_pattern)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| CatalogError::Unavailable(e.to_string()))?;

        row.as_ref().map(knowledge_base_from_row).transpose()
    }

    async fn create_placeholder_kb(
        &self,
        name: &KbName,
        rag_type: &str,
        rag_config: &JsonValue,
        multi_source_kb_id: KbId,
    ) -> Result<KnowledgeBase, CatalogError> {
        let now = Utc::now().to_rfc3339();
        let source_config =
            serde_json::json!({ "multi_source_kb_id": multi_source_kb_id.as_i64() });
        let rag_config_str = serde_json::to_string(rag_config)
            .map_err(|e| CatalogError::Unavailable(e.to_string()))?;

        sqlx::query(
            "INSERT INTO knowledge_base
                (name, source_type_tag, source_config, rag_type_tag, rag_config, created_at, updated_at)
             VALUES (?, 'multi_source_placeholder', ?, ?, ?, ?, ?)",
        )
        .bind(name.as_str())
        .bind(source_config.to_string())
        .bind(rag_type)
        .bind(rag_config_str)
        .bind(&now)
        .bind(&now)
        .execute(self.pool.pool())
        .await
        .map_err(|e| CatalogError::ConstraintViolation(e.to_string()))?;

        self.get_knowledge_base(name)
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("placeholder kb {name} vanished")))
    }

    async fn create_sync_run(
        &self,
        kb_id: KbId,
        status: SyncRunStatus,
        multi_source_kb_id: Option<KbId>,
    ) -> Result<SyncRunId, CatalogError> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO sync_run (knowledge_base_id, multi_source_kb_id, start_time, status) VALUES (?, ?, ?, ?)",
        )
        .bind(kb_id.as_i64())
        .bind(multi_source_kb_id.map(|id| id.as_i64()))
        .bind(now)
        .bind(status.to_string())
        .execute(self.pool.pool())
        .await
        .map_err(|e| CatalogError::ConstraintViolation(e.to_string()))?;

        Ok(SyncRunId::new(result.last_insert_rowid()))
    }

    async fn update_sync_run(
        &self,
        sync_run_id: SyncRunId,
        counters: SyncCounters,
        end_time: Option<DateTime<Utc>>,
        status: SyncRunStatus,
        error_message: Option<String>,
    ) -> Result<(), CatalogError> {
        sqlx::query(
            "UPDATE sync_run
             SET total_files = ?, new_files = ?, modified_files = ?, deleted_files = ?,
                 error_files = ?, end_time = ?, status = ?, error_message = ?
             WHERE id = ?",
        )
        .bind(counters.total as i64)
        .bind(counters.new as i64)
        .bind(counters.modified as i64)
        .bind(counters.deleted as i64)
        .bind(counters.errors as i64)
        .bind(end_time.map(|t| t.to_rfc3339()))
        .bind(status.to_string())
        .bind(error_message)
        .bind(sync_run_id.as_i64())
        .execute(self.pool.pool())
        .await
        .map_err(|e| CatalogError::Unavailable(e.to_string()))?;

        Ok(())
    }

    async fn get_sync_run(&self, sync_run_id: SyncRunId) -> Result<Option<SyncRun>, CatalogError> {
        let row = sqlx::query("SELECT * FROM sync_run WHERE id = ?")
            .bind(sync_run_id.as_i64())
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| CatalogError::Unavailable(e.to_string()))?;

        row.as_ref().map(sync_run_from_row).transpose()
    }

    async fn recent_sync_runs(
        &self,
        kb_id: KbId,
        limit: u32,
    ) -> Result<Vec<SyncRun>, CatalogError> {
        let rows = sqlx::query(
            "SELECT * FROM sync_run WHERE knowledge_base_id = ? ORDER BY start_time DESC LIMIT ?",
        )
        .bind(kb_id.as_i64())
        .bind(i64::from(limit))
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| CatalogError::Unavailable(e.to_string()))?;

        rows.iter().map(sync_run_from_row).collect()
    }

    async fn insert_file_record(&self, record: &FileRecord) -> Result<(), CatalogError> {
        sqlx::query(
            "INSERT INTO file_record
                (sync_run_id, original_uri, rag_uri, file_hash, uuid_filename, upload_time,
                 file_size, status, error_message, source_id, source_type, source_path,
                 content_type, source_metadata, source_created_at, source_modified_at, tags)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.sync_run_id.as_i64())
        .bind(record.original_uri.as_str())
        .bind(record.rag_uri.as_str())
        .bind(record.file_hash.as_str())
        .bind(&record.uuid_filename)
        .bind(record.upload_time.to_rfc3339())
        .bind(record.file_size as i64)
        .bind(record.status.to_string())
        .bind(&record.error_message)
        .bind(&record.source_id)
        .bind(&record.source_type)
        .bind(&record.source_path)
        .bind(&record.content_type)
        .bind(record.source_metadata.as_ref().map(ToString::to_string))
        .bind(record.source_created_at.map(|t| t.to_rfc3339()))
        .bind(record.source_modified_at.map(|t| t.to_rfc3339()))
        .bind(record.tags.as_ref().map(ToString::to_string))
        .execute(self.pool.pool())
        .await
        .map_err(|e| CatalogError::ConstraintViolation(e.to_string()))?;

        Ok(())
    }

    async fn latest_records_by_kb(
        &self,
        kb_name: &KbName,
    ) -> Result<HashMap<String, FileRecord>, CatalogError> {
        let rows = sqlx::query(
            "SELECT fr.* FROM file_record fr
             JOIN sync_run sr ON sr.id = fr.sync_run_id
             JOIN knowledge_base kb ON kb.id = sr.knowledge_base_id
             WHERE kb.name = ?
             ORDER BY sr.start_time ASC, fr.id ASC",
        )
        .bind(kb_name.as_str())
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| CatalogError::Unavailable(e.to_string()))?;

        let mut latest = HashMap::new();
        for row in &rows {
            let record = file_record_from_row(row)?;
            latest.insert(record.original_uri.as_str().to_string(), record);
        }
        Ok(latest)
    }

    async fn records_by_uri(
        &self,
        kb_id: KbId,
        original_uri: &str,
    ) -> Result<Vec<FileRecord>, CatalogError> {
        let rows = sqlx::query(
            "SELECT fr.* FROM file_record fr
             JOIN sync_run sr ON sr.id = fr.sync_run_id
             WHERE sr.knowledge_base_id = ? AND fr.original_uri = ?
             ORDER BY fr.upload_time DESC",
        )
        .bind(kb_id.as_i64())
        .bind(original_uri)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| CatalogError::Unavailable(e.to_string()))?;

        rows.iter().map(file_record_from_row).collect()
    }

    async fn get_delta_token(
        &self,
        source_id: &SourceId,
        drive_id: &str,
    ) -> Result<Option<DeltaToken>, CatalogError> {
        let row = sqlx::query(
            "SELECT delta_token FROM delta_sync_tokens WHERE source_id = ? AND drive_id = ?",
        )
        .bind(source_id.as_str())
        .bind(drive_id)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(|e| CatalogError::Unavailable(e.to_string()))?;

        row.map(|r| {
            let token: String = r.get("delta_token");
            DeltaToken::new(token)
                .map_err(|e| CatalogError::Unavailable(format!("corrupt delta token: {e}")))
        })
        .transpose()
    }

    async fn save_delta_token(
        &self,
        source_id: &SourceId,
        source_type: &str,
        drive_id: &str,
        token: &DeltaToken,
    ) -> Result<(), CatalogError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO delta_sync_tokens (source_id, source_type, drive_id, delta_token, last_sync_time)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(source_id, drive_id) DO UPDATE SET
                delta_token = excluded.delta_token,
                source_type = excluded.source_type,
                last_sync_time = excluded.last_sync_time",
        )
        .bind(source_id.as_str())
        .bind(source_type)
        .bind(drive_id)
        .bind(token.as_str())
        .bind(now)
        .execute(self.pool.pool())
        .await
        .map_err(|e| CatalogError::ConstraintViolation(e.to_string()))?;

        Ok(())
    }

    async fn clear_delta_token(
        &self,
        source_id: &SourceId,
        drive_id: &str,
    ) -> Result<(), CatalogError> {
        sqlx::query("DELETE FROM delta_sync_tokens WHERE source_id = ? AND drive_id = ?")
            .bind(source_id.as_str())
            .bind(drive_id)
            .execute(self.pool.pool())
            .await
            .map_err(|e| CatalogError::Unavailable(e.to_string()))?;

        Ok(())
    }
}
