//! Sync-Run Orchestrator: drives one source through
//! `INIT → LISTING → CLASSIFYING → PROCESSING → FINALIZING → (DONE | FAILED)`.
//!
//! A single orchestrator run targets one source within one KB. The
//! multi-source driver fans these out per `SourceDefinition` and aggregates
//! the results.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;

use docsync_core::config::{OrchestratorConfig, RetryConfig};
use docsync_core::domain::{
    DeltaToken, FileRecord, KbId, KbName, SourceId, SyncCounters, SyncRunId, SyncRunStatus,
};
use docsync_core::ports::{
    DeltaEntry, FileDescriptor, ICatalogRepository, IRagAdapter, ISourceAdapter, SourceError,
};
use docsync_audit::AuditLog;
use docsync_telemetry::MetricsRegistry;

use crate::change_detector::{classify, ChangeType, Classification};
use crate::error::EngineError;
use crate::file_processor::{process, process_scan, ProcessOutcome};

/// Sentinel used for the `drive_id` component of delta-token keys. The
/// simplified `ISourceAdapter` model has no concept of multiple drives
/// per source, so every source uses this single logical drive.
pub const DEFAULT_DRIVE_ID: &str = "default";

/// Whether a run mutates the RAG backend (`Sync`) or only reads and records
/// (`Scan`, per §4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Sync,
    Scan,
}

/// What one orchestrator run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub sync_run_id: SyncRunId,
    pub counters: SyncCounters,
    pub status: SyncRunStatus,
    pub error_message: Option<String>,
}

/// Dependencies for one source's orchestration. Cloned cheaply (all `Arc`).
#[derive(Clone)]
pub struct SourceRunContext {
    pub catalog: Arc<dyn ICatalogRepository>,
    pub source: Arc<dyn ISourceAdapter>,
    pub rag: Arc<dyn IRagAdapter>,
    pub kb_id: KbId,
    pub kb_name: KbName,
    pub source_id: SourceId,
    pub source_type: String,
    /// The originating multi-source KB id, carried through the schema
    /// bridge onto `sync_run.multi_source_kb_id` (§4.9). `None` for a
    /// single-source run.
    pub multi_source_kb_id: Option<KbId>,
    /// Structured audit trail (§10.4). Absent in tests with no backing store.
    pub audit: Option<Arc<AuditLog>>,
    /// Prometheus counters/histograms (§10.5). Purely observational.
    pub metrics: Option<Arc<MetricsRegistry>>,
}

fn run_kind(mode: RunMode) -> &'static str {
    match mode {
        RunMode::Sync => "sync",
        RunMode::Scan => "scan",
    }
}

/// Runs one source's sync (or scan) to completion.
pub async fn run(
    ctx: &SourceRunContext,
    config: &OrchestratorConfig,
    retry: &RetryConfig,
    mode: RunMode,
    cancellation: CancellationToken,
) -> Result<RunOutcome, EngineError> {
    let initial_status = match mode {
        RunMode::Sync => SyncRunStatus::Running,
        RunMode::Scan => SyncRunStatus::ScanRunning,
    };
    let sync_run_id = ctx.catalog.create_sync_run(ctx.kb_id, initial_status, ctx.multi_source_kb_id).await?;

    if let Some(audit) = &ctx.audit {
        match mode {
            RunMode::Sync => audit.log_sync_started(ctx.kb_name.as_str(), sync_run_id.as_i64()).await,
            RunMode::Scan => audit.log_scan_started(ctx.kb_name.as_str(), sync_run_id.as_i64()).await,
        }
    }
    let started_at = Utc::now();

    match run_inner(ctx, config, retry, mode, sync_run_id, &cancellation).await {
        Ok(counters) => {
            let status = match mode {
                RunMode::Sync => SyncRunStatus::Completed,
                RunMode::Scan => SyncRunStatus::ScanCompleted,
            };
            ctx.catalog
                .update_sync_run(sync_run_id, counters, Some(Utc::now()), status, None)
                .await?;
            let duration_ms = (Utc::now() - started_at).num_milliseconds().max(0) as u64;
            if let Some(audit) = &ctx.audit {
                match mode {
                    RunMode::Sync => {
                        audit
                            .log_sync_completed(
                                ctx.kb_name.as_str(),
                                sync_run_id.as_i64(),
                                counters.new as u32,
                                counters.modified as u32,
                                counters.deleted as u32,
                                counters.unchanged() as u32,
                                counters.errors as u32,
                                duration_ms,
                            )
                            .await
                    }
                    RunMode::Scan => {
                        audit
                            .log_scan_completed(
                                ctx.kb_name.as_str(),
                                sync_run_id.as_i64(),
                                counters.total as u32,
                                counters.errors as u32,
                                duration_ms,
                            )
                            .await
                    }
                }
            }
            if let Some(metrics) = &ctx.metrics {
                metrics.record_run(run_kind(mode), "completed");
            }
            Ok(RunOutcome { sync_run_id, counters, status, error_message: None })
        }
        Err(err) => {
            let status = match mode {
                RunMode::Sync => SyncRunStatus::Failed,
                RunMode::Scan => SyncRunStatus::ScanFailed,
            };
            let message = err.to_string();
            // Best-effort: a failure finalizing the run must not mask the
            // original error.
            let _ = ctx
                .catalog
                .update_sync_run(sync_run_id, SyncCounters::default(), Some(Utc::now()), status, Some(message.clone()))
                .await;
            if let Some(audit) = &ctx.audit {
                match mode {
                    RunMode::Sync => audit.log_sync_failed(ctx.kb_name.as_str(), sync_run_id.as_i64(), &message).await,
                    RunMode::Scan => audit.log_scan_failed(ctx.kb_name.as_str(), sync_run_id.as_i64(), &message).await,
                }
            }
            if let Some(metrics) = &ctx.metrics {
                metrics.record_run(run_kind(mode), "failed");
            }
            Err(err)
        }
    }
}

async fn run_inner(
    ctx: &SourceRunContext,
    config: &OrchestratorConfig,
    retry: &RetryConfig,
    mode: RunMode,
    sync_run_id: SyncRunId,
    cancellation: &CancellationToken,
) -> Result<SyncCounters, EngineError> {
    if cancellation.is_cancelled() {
        return Err(EngineError::Cancelled);
    }

    let (listing, new_token, token_cleared) = resolve_listing(ctx).await?;
    let latest = ctx.catalog.latest_records_by_kb(&ctx.kb_name).await?;
    let classifications = classify(&listing, &latest);

    if cancellation.is_cancelled() {
        return Err(EngineError::Cancelled);
    }

    let counters = run_worker_pool(ctx, config, retry, mode, sync_run_id, classifications, cancellation.clone()).await?;

    if cancellation.is_cancelled() {
        return Err(EngineError::Cancelled);
    }

    match (mode, new_token) {
        (RunMode::Sync, Some(token)) => {
            ctx.catalog
                .save_delta_token(&ctx.source_id, &ctx.source_type, DEFAULT_DRIVE_ID, &token)
                .await?;
            if let Some(audit) = &ctx.audit {
                audit
                    .log_delta_token_refreshed(ctx.kb_name.as_str(), ctx.source_id.as_str(), DEFAULT_DRIVE_ID)
                    .await;
            }
            if let Some(metrics) = &ctx.metrics {
                metrics.record_delta_token_event("refreshed");
            }
        }
        (RunMode::Sync, None) if token_cleared => {
            // Already cleared during listing; nothing further to persist.
            if let Some(audit) = &ctx.audit {
                audit
                    .log_delta_token_cleared(ctx.kb_name.as_str(), ctx.source_id.as_str(), DEFAULT_DRIVE_ID, "token_invalid")
                    .await;
            }
            if let Some(metrics) = &ctx.metrics {
                metrics.record_delta_token_event("cleared");
            }
        }
        _ => {}
    }

    Ok(counters)
}

/// Resolves the listing to classify, honoring the delta-token contract in
/// §4.7: use `DeltaList` when a token exists, clear it on `TokenInvalid` and
/// fall back to a full `List`, merging delta entries onto the prior live set
/// so that URIs the delta payload didn't mention are not misclassified as
/// deleted.
async fn resolve_listing(
    ctx: &SourceRunContext,
) -> Result<(Vec<FileDescriptor>, Option<DeltaToken>, bool), EngineError> {
    let existing_token = ctx.catalog.get_delta_token(&ctx.source_id, DEFAULT_DRIVE_ID).await?;

    let Some(token) = existing_token else {
        let listing = ctx.source.list().await?;
        return Ok((listing, None, false));
    };

    match ctx.source.delta_list(Some(&token)).await {
        Ok(Some((entries, new_token))) => {
            let latest = ctx.catalog.latest_records_by_kb(&ctx.kb_name).await?;
            let listing = merge_delta_onto_latest(&latest, entries);
            Ok((listing, Some(new_token), false))
        }
        Ok(None) => {
            let listing = ctx.source.list().await?;
            Ok((listing, None, false))
        }
        Err(SourceError::TokenInvalid(_)) => {
            ctx.catalog.clear_delta_token(&ctx.source_id, DEFAULT_DRIVE_ID).await?;
            let listing = ctx.source.list().await?;
            Ok((listing, None, true))
        }
        Err(err) => Err(err.into()),
    }
}

fn merge_delta_onto_latest(
    latest: &HashMap<String, FileRecord>,
    entries: Vec<DeltaEntry>,
) -> Vec<FileDescriptor> {
    let mut merged: HashMap<String, FileDescriptor> = latest
        .iter()
        .filter(|(_, record)| record.status.is_live())
        .map(|(uri, record)| {
            (
                uri.clone(),
                FileDescriptor {
                    original_uri: uri.clone(),
                    size: record.file_size,
                    content_type: record.content_type.clone(),
                    source_created_at: record.source_created_at,
                    source_modified_at: record.source_modified_at,
                    source_path: record.source_path.clone(),
                    metadata: record.source_metadata.clone(),
                },
            )
        })
        .collect();

    for entry in entries {
        match entry {
            DeltaEntry::Present(descriptor) => {
                merged.insert(descriptor.original_uri.clone(), descriptor);
            }
            DeltaEntry::Tombstone { original_uri } => {
                merged.remove(&original_uri);
            }
        }
    }

    merged.into_values().collect()
}

#[allow(clippy::too_many_arguments)]
async fn run_worker_pool(
    ctx: &SourceRunContext,
    config: &OrchestratorConfig,
    retry: &RetryConfig,
    mode: RunMode,
    sync_run_id: SyncRunId,
    classifications: Vec<Classification>,
    cancellation: CancellationToken,
) -> Result<SyncCounters, EngineError> {
    let total = AtomicU64::new(0);
    let new_count = AtomicU64::new(0);
    let modified = AtomicU64::new(0);
    let deleted = AtomicU64::new(0);
    let errors = AtomicU64::new(0);

    let (tx, rx) = tokio::sync::mpsc::channel::<Classification>(config.classification_queue_capacity as usize);
    let rx = Arc::new(AsyncMutex::new(rx));

    let feeder = {
        let tx = tx.clone();
        let cancellation = cancellation.clone();
        tokio::spawn(async move {
            for c in classifications {
                if cancellation.is_cancelled() {
                    break;
                }
                if tx.send(c).await.is_err() {
                    break;
                }
            }
        })
    };
    drop(tx);

    let timeout = Duration::from_secs(config.file_operation_timeout_secs);
    let grace = Duration::from_secs(config.cancellation_grace_secs);

    let mut workers = Vec::with_capacity(config.worker_concurrency as usize);
    for _ in 0..config.worker_concurrency {
        let rx = Arc::clone(&rx);
        let ctx = ctx.clone();
        let retry = retry.clone();
        let cancellation = cancellation.clone();
        let total = &total;
        let new_count = &new_count;
        let modified = &modified;
        let deleted = &deleted;
        let errors = &errors;

        workers.push(async move {
            loop {
                let next = { rx.lock().await.recv().await };
                let Some(classification) = next else { break };

                let op = async {
                    match mode {
                        RunMode::Sync => process(&ctx.kb_name, sync_run_id, &classification, &ctx.source, &ctx.rag, &retry, ctx.metrics.as_ref()).await,
                        RunMode::Scan => process_scan(&ctx.kb_name, sync_run_id, &classification, &ctx.source, &retry).await,
                    }
                };

                let deadline = if cancellation.is_cancelled() { grace } else { timeout };
                let (record, outcome) = match tokio::time::timeout(deadline, op).await {
                    Ok(result) => result,
                    Err(_) => continue,
                };

                if let Err(e) = ctx.catalog.insert_file_record(&record).await {
                    tracing::warn!(error = %e, uri = %classification.original_uri, "failed to insert file record");
                    errors.fetch_add(1, Ordering::Relaxed);
                    total.fetch_add(1, Ordering::Relaxed);
                    continue;
                }

                total.fetch_add(1, Ordering::Relaxed);
                match outcome {
                    ProcessOutcome::New | ProcessOutcome::Scanned if classification.change_type == ChangeType::New => {
                        new_count.fetch_add(1, Ordering::Relaxed);
                    }
                    ProcessOutcome::Modified => {
                        modified.fetch_add(1, Ordering::Relaxed);
                    }
                    ProcessOutcome::Deleted => {
                        deleted.fetch_add(1, Ordering::Relaxed);
                    }
                    ProcessOutcome::Error | ProcessOutcome::ScanError => {
                        errors.fetch_add(1, Ordering::Relaxed);
                    }
                    _ => {}
                }

                if let Some(metrics) = &ctx.metrics {
                    metrics.record_file_processed(classification_label(outcome, classification.change_type));
                }
                if let Some(audit) = &ctx.audit {
                    log_file_event(audit, &ctx.kb_name, sync_run_id, &classification.original_uri, &record, outcome).await;
                }
            }
        });
    }

    futures::future::join_all(workers).await;
    let _ = feeder.await;

    if cancellation.is_cancelled() {
        return Err(EngineError::Cancelled);
    }

    Ok(SyncCounters {
        total: total.load(Ordering::Relaxed),
        new: new_count.load(Ordering::Relaxed),
        modified: modified.load(Ordering::Relaxed),
        deleted: deleted.load(Ordering::Relaxed),
        errors: errors.load(Ordering::Relaxed),
    })
}

fn classification_label(outcome: ProcessOutcome, change_type: ChangeType) -> &'static str {
    match outcome {
        ProcessOutcome::New if change_type == ChangeType::New => "new",
        ProcessOutcome::New => "restored",
        ProcessOutcome::Modified => "modified",
        ProcessOutcome::Unchanged => "unchanged",
        ProcessOutcome::Deleted => "deleted",
        ProcessOutcome::Error => "error",
        ProcessOutcome::Scanned => "scanned",
        ProcessOutcome::ScanError => "scan_error",
    }
}

async fn log_file_event(
    audit: &AuditLog,
    kb_name: &KbName,
    sync_run_id: SyncRunId,
    original_uri: &str,
    record: &FileRecord,
    outcome: ProcessOutcome,
) {
    match outcome {
        ProcessOutcome::New => {
            audit
                .log_file_uploaded(kb_name.as_str(), sync_run_id.as_i64(), original_uri, record.rag_uri.as_str(), record.file_size)
                .await;
        }
        ProcessOutcome::Modified => {
            audit
                .log_file_updated(kb_name.as_str(), sync_run_id.as_i64(), original_uri, record.rag_uri.as_str(), record.file_size)
                .await;
        }
        ProcessOutcome::Deleted => {
            audit.log_file_deleted(kb_name.as_str(), sync_run_id.as_i64(), original_uri).await;
        }
        ProcessOutcome::Error | ProcessOutcome::ScanError => {
            let reason = record.error_message.as_deref().unwrap_or("unknown");
            audit
                .log_file_error(kb_name.as_str(), sync_run_id.as_i64(), original_uri, "processing_error", reason)
                .await;
        }
        ProcessOutcome::Unchanged | ProcessOutcome::Scanned => {}
    }
}
