//! Multi-Source Driver: fans a multi-source KB's sync out across its
//! enabled `SourceDefinition`s and aggregates the per-source runs.
//!
//! The schema bridge (§4.9) resolves a compatible single-source KB id so
//! that per-source sync runs still satisfy the catalog's `sync_run` FK,
//! which only ever references the single-source KB table.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use docsync_core::domain::{
    KbId, KbName, KnowledgeBase, MultiSourceKnowledgeBase, MultiSourceSyncRun, SourceDefinition,
    SourceId, SyncCounters, SyncMode, SyncRunId, SyncRunStatus,
};
use docsync_core::config::{OrchestratorConfig, RetryConfig};
use docsync_core::ports::{ICatalogRepository, IRagAdapter};
use docsync_audit::AuditLog;
use docsync_telemetry::MetricsRegistry;

use crate::error::EngineError;
use crate::orchestrator::{self, RunMode, SourceRunContext};

/// Resolves the single-source KB id the multi-source KB's per-source runs
/// are written against, creating a placeholder KB if no compatible one
/// exists yet. See §4.9 for the exact search/creation rules.
pub async fn resolve_compatible_kb(
    catalog: &Arc<dyn ICatalogRepository>,
    multi_kb: &MultiSourceKnowledgeBase,
) -> Result<KnowledgeBase, EngineError> {
    let prefix = multi_kb.name.compatible_prefix();
    if let Some(kb) = catalog.find_compatible_kb_by_prefix(&prefix).await? {
        return Ok(kb);
    }

    let placeholder_name = KbName::new(multi_kb.name.placeholder_name())
        .map_err(|e| EngineError::SchemaBridge(e.to_string()))?;
    let kb = catalog
        .create_placeholder_kb(&placeholder_name, &multi_kb.rag_type, &multi_kb.rag_config, multi_kb.id)
        .await?;
    Ok(kb)
}

/// One source's run result, named by `source_id` for the driver's
/// aggregated stats map.
struct SourceRunResult {
    source_id: String,
    outcome: Result<orchestrator::RunOutcome, EngineError>,
}

/// Runs every enabled source of `multi_kb` per `sync_mode`, building
/// adapters via the `docsync-sources`/`docsync-rag` factories, and
/// aggregates the results into a `MultiSourceSyncRun`.
///
/// `selected` restricts execution to the named source ids when `sync_mode`
/// is `Selective`; ignored otherwise.
#[allow(clippy::too_many_arguments)]
pub async fn run_multi_source(
    catalog: Arc<dyn ICatalogRepository>,
    multi_kb: &MultiSourceKnowledgeBase,
    sync_mode: SyncMode,
    selected: &[SourceId],
    config: &OrchestratorConfig,
    retry: &RetryConfig,
    mode: RunMode,
    cancellation: CancellationToken,
    audit: Option<Arc<AuditLog>>,
    metrics: Option<Arc<MetricsRegistry>>,
) -> Result<MultiSourceSyncRun, EngineError> {
    let start_time = Utc::now();
    let already_existed = catalog.find_compatible_kb_by_prefix(&multi_kb.name.compatible_prefix()).await?.is_some();
    let compatible_kb = resolve_compatible_kb(&catalog, multi_kb).await?;
    if let Some(audit) = &audit {
        audit
            .log_schema_bridge_resolved(multi_kb.name.as_str(), compatible_kb.id.as_i64(), !already_existed)
            .await;
    }
    let rag: Arc<dyn IRagAdapter> = docsync_rag::build_rag_adapter(&compatible_kb.rag_type, &compatible_kb.rag_config)
        .map_err(EngineError::Other)?;

    let sources: Vec<&SourceDefinition> = if matches!(sync_mode, SyncMode::Selective) {
        multi_kb
            .resolve_selection(selected)
            .map_err(|e| EngineError::SchemaBridge(e.to_string()))?
    } else {
        multi_kb.enabled_sources()
    };

    let results = match sync_mode {
        SyncMode::Sequential => {
            let mut results = Vec::with_capacity(sources.len());
            for source in sources {
                results.push(
                    run_one_source(
                        Arc::clone(&catalog),
                        &compatible_kb,
                        multi_kb.id,
                        Arc::clone(&rag),
                        source,
                        config,
                        retry,
                        mode,
                        cancellation.clone(),
                        audit.clone(),
                        metrics.clone(),
                    )
                    .await,
                );
            }
            results
        }
        SyncMode::Parallel | SyncMode::Selective | SyncMode::Incremental => {
            let futures = sources.into_iter().map(|source| {
                run_one_source(
                    Arc::clone(&catalog),
                    &compatible_kb,
                    multi_kb.id,
                    Arc::clone(&rag),
                    source,
                    config,
                    retry,
                    mode,
                    cancellation.clone(),
                    audit.clone(),
                    metrics.clone(),
                )
            });
            futures::future::join_all(futures).await
        }
    };

    Ok(aggregate(multi_kb.id, sync_mode, start_time, results))
}

#[allow(clippy::too_many_arguments)]
async fn run_one_source(
    catalog: Arc<dyn ICatalogRepository>,
    compatible_kb: &KnowledgeBase,
    multi_source_kb_id: KbId,
    rag: Arc<dyn IRagAdapter>,
    source: &SourceDefinition,
    config: &OrchestratorConfig,
    retry: &RetryConfig,
    mode: RunMode,
    cancellation: CancellationToken,
    audit: Option<Arc<AuditLog>>,
    metrics: Option<Arc<MetricsRegistry>>,
) -> SourceRunResult {
    let source_id = source.source_id.as_str().to_string();

    let adapter = match docsync_sources::build_source_adapter(&source.source_type, &source.source_config) {
        Ok(adapter) => adapter,
        Err(e) => {
            return SourceRunResult { source_id, outcome: Err(EngineError::Other(e)) };
        }
    };

    let ctx = SourceRunContext {
        catalog,
        source: adapter,
        rag,
        kb_id: compatible_kb.id,
        kb_name: compatible_kb.name.clone(),
        source_id: source.source_id.clone(),
        source_type: source.source_type.clone(),
        multi_source_kb_id: Some(multi_source_kb_id),
        audit,
        metrics,
    };

    let outcome = orchestrator::run(&ctx, config, retry, mode, cancellation).await;
    SourceRunResult { source_id, outcome }
}

fn aggregate(
    multi_source_kb_id: KbId,
    sync_mode: SyncMode,
    start_time: chrono::DateTime<Utc>,
    results: Vec<SourceRunResult>,
) -> MultiSourceSyncRun {
    let mut counters = SyncCounters::default();
    let mut sources_processed = Vec::with_capacity(results.len());
    let mut per_source_stats: HashMap<String, serde_json::Value> = HashMap::new();
    let mut failed = false;
    let mut first_error: Option<String> = None;

    for result in results {
        sources_processed.push(result.source_id.clone());
        match result.outcome {
            Ok(outcome) => {
                counters.total += outcome.counters.total;
                counters.new += outcome.counters.new;
                counters.modified += outcome.counters.modified;
                counters.deleted += outcome.counters.deleted;
                counters.errors += outcome.counters.errors;
                per_source_stats.insert(
                    result.source_id,
                    serde_json::json!({
                        "status": outcome.status.to_string(),
                        "counters": outcome.counters,
                    }),
                );
            }
            Err(e) => {
                failed = true;
                let message = e.to_string();
                per_source_stats.insert(result.source_id, serde_json::json!({ "status": "failed", "error": message }));
                if first_error.is_none() {
                    first_error = Some(message);
                }
            }
        }
    }

    let status = if failed {
        if matches!(sync_mode, SyncMode::Sequential) {
            SyncRunStatus::Failed
        } else {
            // Parallel/selective: other sources may have succeeded; the
            // multi-source run as a whole is still reported failed so the
            // caller investigates, but successful sources' data is durable.
            SyncRunStatus::Failed
        }
    } else {
        SyncRunStatus::Completed
    };

    MultiSourceSyncRun {
        id: SyncRunId::new(0),
        multi_source_kb_id,
        start_time,
        end_time: Some(Utc::now()),
        status,
        counters,
        sync_mode,
        sources_processed,
        source_stats: serde_json::Value::Object(per_source_stats.into_iter().collect()),
        error_message: first_error,
    }
}
