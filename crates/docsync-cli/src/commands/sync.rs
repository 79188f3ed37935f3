//! Sync command - run one sync against a single-source knowledge base
//!
//! 1. Loads the knowledge base's stored source/RAG config from the catalog
//! 2. Builds the source and RAG adapters for it
//! 3. Drives `docsync_engine::run` in `RunMode::Sync` to completion

use anyhow::{Context, Result};
use clap::Args;
use docsync_core::config::OrchestratorConfig;
use docsync_core::domain::newtypes::{KbName, SourceId};
use docsync_engine::{run, RunMode, SourceRunContext};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::common::{open_audit, open_catalog, open_metrics};
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Name of the knowledge base to sync
    #[arg(long)]
    pub kb_name: String,

    /// Force a full sync, clearing any stored delta token first
    #[arg(long)]
    pub full: bool,
}

impl SyncCommand {
    pub async fn execute(&self, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json));

        let (config, catalog, sqlite_pool) = open_catalog(None).await?;
        let kb_name = KbName::new(self.kb_name.clone()).context("invalid --kb-name")?;

        let kb = catalog
            .get_knowledge_base(&kb_name)
            .await
            .context("failed to query knowledge base")?;
        let kb = match kb {
            Some(kb) => kb,
            None => {
                formatter.error(&format!("no such knowledge base: {}", self.kb_name));
                return Ok(());
            }
        };

        let source_id =
            SourceId::new(kb.name.as_str().to_string()).context("invalid kb name as source id")?;

        if self.full {
            catalog
                .clear_delta_token(&source_id, docsync_engine::DEFAULT_DRIVE_ID)
                .await
                .context("failed to clear delta token")?;
            formatter.info("cleared delta token, next sync will use a full listing");
        }

        let source = docsync_sources::build_source_adapter(&kb.source_type, &kb.source_config)
            .context("failed to build source adapter")?;
        let rag = docsync_rag::build_rag_adapter(&kb.rag_type, &kb.rag_config)
            .context("failed to build RAG adapter")?;

        let ctx = SourceRunContext {
            catalog: catalog.clone(),
            source,
            rag,
            kb_id: kb.id,
            kb_name: kb.name.clone(),
            source_id,
            source_type: kb.source_type.clone(),
            multi_source_kb_id: None,
            audit: Some(open_audit(&sqlite_pool).await),
            metrics: Some(open_metrics()),
        };

        info!(kb_name = %self.kb_name, "starting sync");
        formatter.info(&format!("Starting sync for '{}'...", self.kb_name));

        let outcome = run(
            &ctx,
            &config.orchestrator,
            &config.retry,
            RunMode::Sync,
            CancellationToken::new(),
        )
        .await;

        display_outcome(&*formatter, &format, &self.kb_name, outcome, &config.orchestrator);
        Ok(())
    }
}

fn display_outcome(
    formatter: &dyn crate::output::OutputFormatter,
    format: &OutputFormat,
    kb_name: &str,
    outcome: Result<docsync_engine::RunOutcome, docsync_engine::EngineError>,
    _orchestrator: &OrchestratorConfig,
) {
    match outcome {
        Ok(o) => {
            if matches!(format, OutputFormat::Json) {
                formatter.print_json(&serde_json::json!({
                    "kb_name": kb_name,
                    "sync_run_id": o.sync_run_id.as_i64(),
                    "status": o.status.to_string(),
                    "new": o.counters.new,
                    "modified": o.counters.modified,
                    "deleted": o.counters.deleted,
                    "unchanged": o.counters.unchanged(),
                    "errors": o.counters.errors,
                }));
                return;
            }

            formatter.success(&format!(
                "Sync completed for '{kb_name}' (run #{})",
                o.sync_run_id.as_i64()
            ));
            formatter.info(&format!("New:       {}", o.counters.new));
            formatter.info(&format!("Modified:  {}", o.counters.modified));
            formatter.info(&format!("Deleted:   {}", o.counters.deleted));
            formatter.info(&format!("Unchanged: {}", o.counters.unchanged()));
            if o.counters.errors > 0 {
                formatter.error(&format!("{} file(s) failed", o.counters.errors));
            }
        }
        Err(e) => {
            if matches!(format, OutputFormat::Json) {
                formatter.print_json(&serde_json::json!({"kb_name": kb_name, "error": e.to_string()}));
                return;
            }
            formatter.error(&format!("Sync failed for '{kb_name}': {e}"));
        }
    }
}
