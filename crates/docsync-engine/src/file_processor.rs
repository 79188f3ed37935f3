//! File Processor: turns one `Classification` into a `FileRecord` by
//! talking to the source and RAG adapters.
//!
//! Hash computation runs on the blocking thread pool since content can be
//! large; everything else stays on the async runtime.

use std::sync::Arc;

use chrono::Utc;
use docsync_core::domain::newtypes::{FileContentHash, FileRecordId, OriginalUri, RagUri};
use docsync_core::domain::{FileRecord, FileRecordStatus, KbName, SyncRunId};
use docsync_core::ports::{FileDescriptor, IRagAdapter, ISourceAdapter, RagError, SourceError};

use crate::change_detector::{ChangeType, Classification};
use crate::retry::{is_rag_transient, is_source_transient, with_retry};
use docsync_core::config::RetryConfig;
use docsync_telemetry::MetricsRegistry;

async fn timed_rag_call<F, Fut, T>(
    metrics: Option<&Arc<MetricsRegistry>>,
    operation: &str,
    call: F,
) -> Result<T, RagError>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, RagError>>,
{
    let start = std::time::Instant::now();
    let result = call().await;
    if let Some(metrics) = metrics {
        let status = if result.is_ok() { "success" } else { "failure" };
        metrics.record_rag_call(operation, status, start.elapsed().as_secs_f64());
    }
    result
}

/// What `process` did to a `FileRecord`'s identity, for the orchestrator's
/// counters. Maps directly onto `FileRecordStatus`, but kept distinct since
/// a tentative modification can still resolve to `unchanged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    New,
    Modified,
    Unchanged,
    Deleted,
    Error,
    Scanned,
    ScanError,
}

impl From<ProcessOutcome> for FileRecordStatus {
    fn from(outcome: ProcessOutcome) -> Self {
        match outcome {
            ProcessOutcome::New => Self::New,
            ProcessOutcome::Modified => Self::Modified,
            ProcessOutcome::Unchanged => Self::Unchanged,
            ProcessOutcome::Deleted => Self::Deleted,
            ProcessOutcome::Error => Self::Error,
            ProcessOutcome::Scanned => Self::Scanned,
            ProcessOutcome::ScanError => Self::ScanError,
        }
    }
}

fn extension_of(uri: &str) -> String {
    uri.rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_string())
        .unwrap_or_default()
}

async fn hash_content(content: Vec<u8>) -> FileContentHash {
    tokio::task::spawn_blocking(move || FileContentHash::from_bytes(&content))
        .await
        .expect("hash computation task panicked")
}

fn error_record(
    kb_name: &KbName,
    sync_run_id: SyncRunId,
    original_uri: &str,
    reason: &str,
) -> FileRecord {
    error_record_with_status(kb_name, sync_run_id, original_uri, reason, FileRecordStatus::Error)
}

fn error_record_with_status(
    kb_name: &KbName,
    sync_run_id: SyncRunId,
    original_uri: &str,
    reason: &str,
    status: FileRecordStatus,
) -> FileRecord {
    FileRecord {
        id: FileRecordId::new(0),
        sync_run_id,
        original_uri: OriginalUri::new(original_uri.to_string())
            .unwrap_or_else(|_| OriginalUri::new(format!("unknown/{original_uri}")).expect("non-empty fallback")),
        rag_uri: RagUri::error_sentinel(kb_name.as_str(), Utc::now().timestamp()),
        file_hash: FileContentHash::empty(),
        uuid_filename: String::new(),
        upload_time: Utc::now(),
        file_size: 0,
        status,
        error_message: Some(reason.to_string()),
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

fn base_record_from_descriptor(
    sync_run_id: SyncRunId,
    original_uri: &str,
    descriptor: &FileDescriptor,
) -> FileRecord {
    FileRecord {
        id: FileRecordId::new(0),
        sync_run_id,
        original_uri: OriginalUri::new(original_uri.to_string())
            .unwrap_or_else(|_| OriginalUri::new(format!("unknown/{original_uri}")).expect("non-empty fallback")),
        rag_uri: RagUri::new(format!("pending/{original_uri}")).expect("non-empty placeholder"),
        file_hash: FileContentHash::empty(),
        uuid_filename: String::new(),
        upload_time: Utc::now(),
        file_size: descriptor.size,
        status: FileRecordStatus::Unchanged,
        error_message: None,
        source_id: None,
        source_type: None,
        source_path: descriptor.source_path.clone(),
        content_type: descriptor.content_type.clone(),
        source_metadata: descriptor.metadata.clone(),
        source_created_at: descriptor.source_created_at,
        source_modified_at: descriptor.source_modified_at,
        tags: None,
    }
}

/// Processes one classification, performing whatever source/RAG calls its
/// `ChangeType` requires, and returns the `FileRecord` to insert.
///
/// Never returns `Err`: every failure is folded into an `error`-status
/// `FileRecord` per the per-file error contract, so a single URI's failure
/// never aborts the run.
pub async fn process(
    kb_name: &KbName,
    sync_run_id: SyncRunId,
    classification: &Classification,
    source: &Arc<dyn ISourceAdapter>,
    rag: &Arc<dyn IRagAdapter>,
    retry: &RetryConfig,
    metrics: Option<&Arc<MetricsRegistry>>,
) -> (FileRecord, ProcessOutcome) {
    match classification.change_type {
        ChangeType::Deleted => process_deleted(kb_name, sync_run_id, classification, rag, metrics).await,
        ChangeType::New => process_new(kb_name, sync_run_id, classification, source, rag, retry, metrics).await,
        ChangeType::ModifiedConfirmed => {
            process_modified(kb_name, sync_run_id, classification, source, rag, retry, false, metrics).await
        }
        ChangeType::ModifiedTentative => {
            process_modified(kb_name, sync_run_id, classification, source, rag, retry, true, metrics).await
        }
        ChangeType::Unchanged => process_unchanged(sync_run_id, classification),
    }
}

fn process_unchanged(sync_run_id: SyncRunId, classification: &Classification) -> (FileRecord, ProcessOutcome) {
    let existing = classification
        .existing_record
        .as_ref()
        .expect("unchanged classification always carries its prior record");
    let descriptor = classification
        .descriptor
        .as_ref()
        .expect("unchanged classification always carries a descriptor");
    let mut record = base_record_from_descriptor(sync_run_id, &classification.original_uri, descriptor);
    record.rag_uri = existing.rag_uri.clone();
    record.uuid_filename = existing.uuid_filename.clone();
    record.file_hash = existing.file_hash.clone();
    record.status = FileRecordStatus::Unchanged;
    (record, ProcessOutcome::Unchanged)
}

async fn process_deleted(
    kb_name: &KbName,
    sync_run_id: SyncRunId,
    classification: &Classification,
    rag: &Arc<dyn IRagAdapter>,
    metrics: Option<&Arc<MetricsRegistry>>,
) -> (FileRecord, ProcessOutcome) {
    let existing = classification
        .existing_record
        .as_ref()
        .expect("deleted classification always carries its prior record");

    if let Err(err) = timed_rag_call(metrics, "delete", || rag.delete(existing.rag_uri.as_str())).await {
        return (
            error_record(kb_name, sync_run_id, &classification.original_uri, &format!("rag delete failed: {err}")),
            ProcessOutcome::Error,
        );
    }

    let mut record = existing.clone();
    record.id = FileRecordId::new(0);
    record.sync_run_id = sync_run_id;
    record.file_hash = FileContentHash::empty();
    record.upload_time = Utc::now();
    record.status = FileRecordStatus::Deleted;
    record.error_message = None;
    (record, ProcessOutcome::Deleted)
}

async fn process_new(
    kb_name: &KbName,
    sync_run_id: SyncRunId,
    classification: &Classification,
    source: &Arc<dyn ISourceAdapter>,
    rag: &Arc<dyn IRagAdapter>,
    retry: &RetryConfig,
    metrics: Option<&Arc<MetricsRegistry>>,
) -> (FileRecord, ProcessOutcome) {
    let descriptor = classification
        .descriptor
        .as_ref()
        .expect("new classification always carries a descriptor");

    let fetched = match fetch_with_retry(source, &classification.original_uri, retry).await {
        Ok(f) => f,
        Err(err) => {
            return (
                error_record(kb_name, sync_run_id, &classification.original_uri, &format!("fetch failed: {err}")),
                ProcessOutcome::Error,
            );
        }
    };

    let hash = hash_content(fetched.content.clone()).await;
    let uuid_filename = classification
        .existing_record
        .as_ref()
        .map(|r| r.uuid_filename.clone())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| {
            docsync_core::domain::newtypes::UuidFilename::generate(&extension_of(&classification.original_uri))
                .as_str()
                .to_string()
        });

    let rag_uri = match timed_rag_call(metrics, "upload", || {
        with_retry(retry, "rag_upload", is_rag_transient, || {
            rag.upload(&fetched.content, &uuid_filename, descriptor.metadata.as_ref())
        })
    })
    .await
    {
        Ok(uri) => uri,
        Err(err) => {
            return (
                error_record(kb_name, sync_run_id, &classification.original_uri, &format!("rag upload failed: {err}")),
                ProcessOutcome::Error,
            );
        }
    };

    let mut record = base_record_from_descriptor(sync_run_id, &classification.original_uri, descriptor);
    record.rag_uri = RagUri::new(rag_uri).unwrap_or_else(|_| RagUri::error_sentinel(kb_name.as_str(), Utc::now().timestamp()));
    record.uuid_filename = uuid_filename;
    record.file_hash = hash;
    record.file_size = fetched.size;
    record.status = FileRecordStatus::New;
    (record, ProcessOutcome::New)
}

async fn process_modified(
    kb_name: &KbName,
    sync_run_id: SyncRunId,
    classification: &Classification,
    source: &Arc<dyn ISourceAdapter>,
    rag: &Arc<dyn IRagAdapter>,
    retry: &RetryConfig,
    tentative: bool,
    metrics: Option<&Arc<MetricsRegistry>>,
) -> (FileRecord, ProcessOutcome) {
    let descriptor = classification
        .descriptor
        .as_ref()
        .expect("modified classification always carries a descriptor");
    let existing = classification
        .existing_record
        .as_ref()
        .expect("modified classification always carries its prior record");

    let fetched = match fetch_with_retry(source, &classification.original_uri, retry).await {
        Ok(f) => f,
        Err(err) => {
            return (
                error_record(kb_name, sync_run_id, &classification.original_uri, &format!("fetch failed: {err}")),
                ProcessOutcome::Error,
            );
        }
    };

    let hash = hash_content(fetched.content.clone()).await;

    if tentative && hash == existing.file_hash {
        let mut record = base_record_from_descriptor(sync_run_id, &classification.original_uri, descriptor);
        record.rag_uri = existing.rag_uri.clone();
        record.uuid_filename = existing.uuid_filename.clone();
        record.file_hash = hash;
        record.file_size = fetched.size;
        record.status = FileRecordStatus::Unchanged;
        return (record, ProcessOutcome::Unchanged);
    }

    if let Err(err) = timed_rag_call(metrics, "update", || {
        with_retry(retry, "rag_update", is_rag_transient, || {
            rag.update(existing.rag_uri.as_str(), &fetched.content, descriptor.metadata.as_ref())
        })
    })
    .await
    {
        return (
            error_record(kb_name, sync_run_id, &classification.original_uri, &format!("rag update failed: {err}")),
            ProcessOutcome::Error,
        );
    }

    let mut record = base_record_from_descriptor(sync_run_id, &classification.original_uri, descriptor);
    record.rag_uri = existing.rag_uri.clone();
    record.uuid_filename = existing.uuid_filename.clone();
    record.file_hash = hash;
    record.file_size = fetched.size;
    record.status = FileRecordStatus::Modified;
    (record, ProcessOutcome::Modified)
}

/// Scan-mode counterpart to `process`: runs the same fetch/hash pre-filters
/// but never calls the RAG adapter, and always resolves to `scanned` or
/// `scan_error` rather than the ordinary new/modified/unchanged/deleted
/// taxonomy (the distinction that matters for a scan is "did this read
/// succeed", not "what changed").
pub async fn process_scan(
    kb_name: &KbName,
    sync_run_id: SyncRunId,
    classification: &Classification,
    source: &Arc<dyn ISourceAdapter>,
    retry: &RetryConfig,
) -> (FileRecord, ProcessOutcome) {
    match classification.change_type {
        ChangeType::Deleted => {
            let existing = classification
                .existing_record
                .as_ref()
                .expect("deleted classification always carries its prior record");
            let mut record = existing.clone();
            record.id = FileRecordId::new(0);
            record.sync_run_id = sync_run_id;
            record.upload_time = Utc::now();
            record.status = FileRecordStatus::Scanned;
            record.error_message = None;
            (record, ProcessOutcome::Scanned)
        }
        ChangeType::Unchanged => {
            let existing = classification
                .existing_record
                .as_ref()
                .expect("unchanged classification always carries its prior record");
            let descriptor = classification
                .descriptor
                .as_ref()
                .expect("unchanged classification always carries a descriptor");
            let mut record = base_record_from_descriptor(sync_run_id, &classification.original_uri, descriptor);
            record.rag_uri = existing.rag_uri.clone();
            record.uuid_filename = existing.uuid_filename.clone();
            record.file_hash = existing.file_hash.clone();
            record.status = FileRecordStatus::Scanned;
            (record, ProcessOutcome::Scanned)
        }
        ChangeType::New | ChangeType::ModifiedConfirmed | ChangeType::ModifiedTentative => {
            let descriptor = classification
                .descriptor
                .as_ref()
                .expect("non-deleted classification always carries a descriptor");

            let fetched = match fetch_with_retry(source, &classification.original_uri, retry).await {
                Ok(f) => f,
                Err(err) => {
                    return (
                        error_record_with_status(
                            kb_name,
                            sync_run_id,
                            &classification.original_uri,
                            &format!("fetch failed: {err}"),
                            FileRecordStatus::ScanError,
                        ),
                        ProcessOutcome::ScanError,
                    );
                }
            };

            let hash = hash_content(fetched.content).await;
            let mut record = base_record_from_descriptor(sync_run_id, &classification.original_uri, descriptor);
            record.file_hash = hash;
            record.file_size = fetched.size;
            record.status = FileRecordStatus::Scanned;

            if let Some(existing) = &classification.existing_record {
                record.rag_uri = existing.rag_uri.clone();
                record.uuid_filename = existing.uuid_filename.clone();
            } else {
                let uuid_filename =
                    docsync_core::domain::newtypes::UuidFilename::generate(&extension_of(&classification.original_uri));
                record.uuid_filename = uuid_filename.as_str().to_string();
                record.rag_uri = RagUri::new(format!("scan-pending/{}", classification.original_uri))
                    .unwrap_or_else(|_| RagUri::error_sentinel(kb_name.as_str(), Utc::now().timestamp()));
            }
            (record, ProcessOutcome::Scanned)
        }
    }
}

async fn fetch_with_retry(
    source: &Arc<dyn ISourceAdapter>,
    original_uri: &str,
    retry: &RetryConfig,
) -> Result<docsync_core::ports::FetchedFile, SourceError> {
    with_retry(retry, "source_fetch", is_source_transient, || source.fetch(original_uri)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use docsync_core::domain::newtypes::{FileRecordId as FrId, SyncRunId as RunId};
    use docsync_core::ports::{DeltaEntry, FetchedFile, RagArtifact};
    use std::sync::Mutex;

    struct StubSource {
        content: Vec<u8>,
    }

    #[async_trait]
    impl ISourceAdapter for StubSource {
        async fn list(&self) -> Result<Vec<FileDescriptor>, SourceError> {
            Ok(vec![])
        }
        async fn delta_list(
            &self,
            _token: Option<&docsync_core::domain::DeltaToken>,
        ) -> Result<Option<(Vec<DeltaEntry>, docsync_core::domain::DeltaToken)>, SourceError> {
            Ok(None)
        }
        async fn fetch(&self, _original_uri: &str) -> Result<FetchedFile, SourceError> {
            Ok(FetchedFile {
                content: self.content.clone(),
                size: self.content.len() as u64,
                content_type: Some("text/plain".to_string()),
                source_modified_at: None,
            })
        }
    }

    struct StubRag {
        uploads: Mutex<u32>,
        updates: Mutex<u32>,
        deletes: Mutex<u32>,
    }

    impl StubRag {
        fn new() -> Self {
            Self { uploads: Mutex::new(0), updates: Mutex::new(0), deletes: Mutex::new(0) }
        }
    }

    #[async_trait]
    impl IRagAdapter for StubRag {
        async fn upload(&self, _content: &[u8], filename: &str, _metadata: Option<&serde_json::Value>) -> Result<String, RagError> {
            *self.uploads.lock().unwrap() += 1;
            Ok(format!("kb/{filename}"))
        }
        async fn update(&self, _rag_uri: &str, _content: &[u8], _metadata: Option<&serde_json::Value>) -> Result<(), RagError> {
            *self.updates.lock().unwrap() += 1;
            Ok(())
        }
        async fn delete(&self, _rag_uri: &str) -> Result<(), RagError> {
            *self.deletes.lock().unwrap() += 1;
            Ok(())
        }
        async fn list(&self, _prefix: Option<&str>) -> Result<Vec<RagArtifact>, RagError> {
            Ok(vec![])
        }
        async fn get(&self, _rag_uri: &str) -> Result<Option<RagArtifact>, RagError> {
            Ok(None)
        }
    }

    fn retry_cfg() -> RetryConfig {
        RetryConfig { max_attempts: 2, base_delay_ms: 1 }
    }

    fn descriptor(uri: &str, size: u64) -> FileDescriptor {
        FileDescriptor {
            original_uri: uri.to_string(),
            size,
            content_type: None,
            source_created_at: None,
            source_modified_at: None,
            source_path: None,
            metadata: None,
        }
    }

    fn classification(change_type: ChangeType, descriptor: Option<FileDescriptor>, existing: Option<FileRecord>) -> Classification {
        Classification {
            original_uri: "a.txt".to_string(),
            change_type,
            descriptor,
            existing_record: existing,
        }
    }

    fn prior_record(status: FileRecordStatus, hash: FileContentHash) -> FileRecord {
        FileRecord {
            id: FrId::new(1),
            sync_run_id: RunId::new(1),
            original_uri: OriginalUri::new("a.txt".to_string()).unwrap(),
            rag_uri: RagUri::new("kb/existing-uuid.txt".to_string()).unwrap(),
            file_hash: hash,
            uuid_filename: "existing-uuid.txt".to_string(),
            upload_time: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            file_size: 5,
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

    #[tokio::test]
    async fn new_file_uploads_and_assigns_fresh_uuid() {
        let source: Arc<dyn ISourceAdapter> = Arc::new(StubSource { content: b"hello".to_vec() });
        let rag: Arc<dyn IRagAdapter> = Arc::new(StubRag::new());
        let kb = KbName::new("kb".to_string()).unwrap();
        let c = classification(ChangeType::New, Some(descriptor("a.txt", 5)), None);

        let (record, outcome) = process(&kb, RunId::new(1), &c, &source, &rag, &retry_cfg(), None).await;
        assert_eq!(outcome, ProcessOutcome::New);
        assert_eq!(record.status, FileRecordStatus::New);
        assert!(!record.uuid_filename.is_empty());
        assert_eq!(record.file_hash, FileContentHash::from_bytes(b"hello"));
    }

    #[tokio::test]
    async fn upload_records_rag_call_duration_metric() {
        let source: Arc<dyn ISourceAdapter> = Arc::new(StubSource { content: b"hello".to_vec() });
        let rag: Arc<dyn IRagAdapter> = Arc::new(StubRag::new());
        let kb = KbName::new("kb".to_string()).unwrap();
        let c = classification(ChangeType::New, Some(descriptor("a.txt", 5)), None);
        let metrics = Arc::new(MetricsRegistry::new().unwrap());

        let (_, outcome) = process(&kb, RunId::new(1), &c, &source, &rag, &retry_cfg(), Some(&metrics)).await;
        assert_eq!(outcome, ProcessOutcome::New);

        let output = metrics.encode().unwrap();
        assert!(output.contains("docsync_rag_call_duration_seconds"));
        assert!(output.contains("operation=\"upload\""));
    }

    #[tokio::test]
    async fn restoration_reuses_prior_uuid_filename() {
        let source: Arc<dyn ISourceAdapter> = Arc::new(StubSource { content: b"hello".to_vec() });
        let rag: Arc<dyn IRagAdapter> = Arc::new(StubRag::new());
        let kb = KbName::new("kb".to_string()).unwrap();
        let prior = prior_record(FileRecordStatus::Deleted, FileContentHash::empty());
        let c = classification(ChangeType::New, Some(descriptor("a.txt", 5)), Some(prior));

        let (record, _) = process(&kb, RunId::new(1), &c, &source, &rag, &retry_cfg(), None).await;
        assert_eq!(record.uuid_filename, "existing-uuid.txt");
    }

    #[tokio::test]
    async fn tentative_modification_downgrades_to_unchanged_on_hash_match() {
        let source: Arc<dyn ISourceAdapter> = Arc::new(StubSource { content: b"hello".to_vec() });
        let rag: Arc<dyn IRagAdapter> = Arc::new(StubRag::new());
        let kb = KbName::new("kb".to_string()).unwrap();
        let prior = prior_record(FileRecordStatus::Unchanged, FileContentHash::from_bytes(b"hello"));
        let c = classification(ChangeType::ModifiedTentative, Some(descriptor("a.txt", 5)), Some(prior));

        let (record, outcome) = process(&kb, RunId::new(1), &c, &source, &rag, &retry_cfg(), None).await;
        assert_eq!(outcome, ProcessOutcome::Unchanged);
        assert_eq!(record.status, FileRecordStatus::Unchanged);
    }

    #[tokio::test]
    async fn confirmed_modification_calls_update_and_keeps_rag_uri() {
        let source: Arc<dyn ISourceAdapter> = Arc::new(StubSource { content: b"world".to_vec() });
        let rag: Arc<dyn IRagAdapter> = Arc::new(StubRag::new());
        let kb = KbName::new("kb".to_string()).unwrap();
        let prior = prior_record(FileRecordStatus::Unchanged, FileContentHash::from_bytes(b"hello"));
        let c = classification(ChangeType::ModifiedConfirmed, Some(descriptor("a.txt", 5)), Some(prior));

        let (record, outcome) = process(&kb, RunId::new(1), &c, &source, &rag, &retry_cfg(), None).await;
        assert_eq!(outcome, ProcessOutcome::Modified);
        assert_eq!(record.rag_uri.as_str(), "kb/existing-uuid.txt");
        assert_eq!(record.file_hash, FileContentHash::from_bytes(b"world"));
    }

    #[tokio::test]
    async fn deletion_empties_hash_and_calls_delete() {
        let source: Arc<dyn ISourceAdapter> = Arc::new(StubSource { content: vec![] });
        let rag: Arc<dyn IRagAdapter> = Arc::new(StubRag::new());
        let kb = KbName::new("kb".to_string()).unwrap();
        let prior = prior_record(FileRecordStatus::Unchanged, FileContentHash::from_bytes(b"hello"));
        let c = classification(ChangeType::Deleted, None, Some(prior));

        let (record, outcome) = process(&kb, RunId::new(1), &c, &source, &rag, &retry_cfg(), None).await;
        assert_eq!(outcome, ProcessOutcome::Deleted);
        assert!(record.file_hash.is_empty());
        assert_eq!(record.rag_uri.as_str(), "kb/existing-uuid.txt");
    }

    struct FailingSource;

    #[async_trait]
    impl ISourceAdapter for FailingSource {
        async fn list(&self) -> Result<Vec<FileDescriptor>, SourceError> {
            Ok(vec![])
        }
        async fn delta_list(
            &self,
            _token: Option<&docsync_core::domain::DeltaToken>,
        ) -> Result<Option<(Vec<DeltaEntry>, docsync_core::domain::DeltaToken)>, SourceError> {
            Ok(None)
        }
        async fn fetch(&self, _original_uri: &str) -> Result<FetchedFile, SourceError> {
            Err(SourceError::NotFound("gone".to_string()))
        }
    }

    #[tokio::test]
    async fn fetch_failure_produces_error_sentinel_record() {
        let source: Arc<dyn ISourceAdapter> = Arc::new(FailingSource);
        let rag: Arc<dyn IRagAdapter> = Arc::new(StubRag::new());
        let kb = KbName::new("kb".to_string()).unwrap();
        let c = classification(ChangeType::New, Some(descriptor("a.txt", 5)), None);

        let (record, outcome) = process(&kb, RunId::new(1), &c, &source, &rag, &retry_cfg(), None).await;
        assert_eq!(outcome, ProcessOutcome::Error);
        assert_eq!(record.status, FileRecordStatus::Error);
        assert!(record.rag_uri.is_error_sentinel());
        assert!(record.uuid_filename.is_empty());
        assert!(record.file_hash.is_empty());
        assert!(record.error_message.is_some());
    }

    #[tokio::test]
    async fn scan_of_new_file_never_calls_rag_and_is_marked_scanned() {
        let source: Arc<dyn ISourceAdapter> = Arc::new(StubSource { content: b"hello".to_vec() });
        let kb = KbName::new("kb".to_string()).unwrap();
        let c = classification(ChangeType::New, Some(descriptor("a.txt", 5)), None);

        let (record, outcome) = process_scan(&kb, RunId::new(1), &c, &source, &retry_cfg()).await;
        assert_eq!(outcome, ProcessOutcome::Scanned);
        assert_eq!(record.status, FileRecordStatus::Scanned);
        assert!(record.rag_uri.as_str().starts_with("scan-pending/"));
    }

    #[tokio::test]
    async fn scan_fetch_failure_is_scan_error_not_error() {
        let source: Arc<dyn ISourceAdapter> = Arc::new(FailingSource);
        let kb = KbName::new("kb".to_string()).unwrap();
        let c = classification(ChangeType::New, Some(descriptor("a.txt", 5)), None);

        let (record, outcome) = process_scan(&kb, RunId::new(1), &c, &source, &retry_cfg()).await;
        assert_eq!(outcome, ProcessOutcome::ScanError);
        assert_eq!(record.status, FileRecordStatus::ScanError);
    }

    #[tokio::test]
    async fn scan_of_deleted_file_does_not_call_rag_delete() {
        let source: Arc<dyn ISourceAdapter> = Arc::new(StubSource { content: vec![] });
        let kb = KbName::new("kb".to_string()).unwrap();
        let prior = prior_record(FileRecordStatus::Unchanged, FileContentHash::from_bytes(b"hello"));
        let c = classification(ChangeType::Deleted, None, Some(prior));

        let (record, outcome) = process_scan(&kb, RunId::new(1), &c, &source, &retry_cfg()).await;
        assert_eq!(outcome, ProcessOutcome::Scanned);
        assert_eq!(record.status, FileRecordStatus::Scanned);
    }
}
