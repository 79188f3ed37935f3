//! Scan command - scan mode, without advancing any delta token
//!
//! Always operates against a registered knowledge base. `--path` overrides
//! that KB's `root_path` for a `file_system` source, letting a caller
//! re-scan a subtree without re-registering it.

use anyhow::Context;
use anyhow::Result;
use clap::Args;
use docsync_core::domain::newtypes::{KbName, SourceId};
use docsync_engine::{run, RunMode, SourceRunContext};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::common::{open_audit, open_catalog, open_metrics};
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct ScanCommand {
    /// Name of the knowledge base to scan
    #[arg(long)]
    pub kb_name: String,

    /// Overrides the KB's root_path for this scan (file_system sources only)
    #[arg(long)]
    pub path: Option<String>,
}

impl ScanCommand {
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

        let mut source_config = kb.source_config.clone();
        if let Some(path) = &self.path {
            if kb.source_type == "file_system" {
                source_config["root_path"] = serde_json::Value::String(path.clone());
            } else {
                formatter.warn("--path only applies to file_system sources, ignoring");
            }
        }

        let source = docsync_sources::build_source_adapter(&kb.source_type, &source_config)
            .context("failed to build source adapter")?;
        let rag = docsync_rag::build_rag_adapter(&kb.rag_type, &kb.rag_config)
            .context("failed to build RAG adapter")?;
        let source_id =
            SourceId::new(kb.name.as_str().to_string()).context("invalid kb name as source id")?;

        let ctx = SourceRunContext {
            catalog,
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

        info!(kb_name = %self.kb_name, "starting scan");
        formatter.info(&format!("Scanning '{}'...", self.kb_name));

        let outcome = run(
            &ctx,
            &config.orchestrator,
            &config.retry,
            RunMode::Scan,
            CancellationToken::new(),
        )
        .await;

        match outcome {
            Ok(o) => {
                if matches!(format, OutputFormat::Json) {
                    formatter.print_json(&serde_json::json!({
                        "kb_name": self.kb_name,
                        "sync_run_id": o.sync_run_id.as_i64(),
                        "status": o.status.to_string(),
                        "scanned": o.counters.total,
                        "errors": o.counters.errors,
                    }));
                } else {
                    formatter.success(&format!("Scan completed for '{}'", self.kb_name));
                    formatter.info(&format!("Scanned: {}", o.counters.total));
                    if o.counters.errors > 0 {
                        formatter.error(&format!("{} file(s) failed", o.counters.errors));
                    }
                }
            }
            Err(e) => {
                if matches!(format, OutputFormat::Json) {
                    formatter.print_json(&serde_json::json!({"kb_name": self.kb_name, "error": e.to_string()}));
                } else {
                    formatter.error(&format!("Scan failed: {e}"));
                }
            }
        }

        Ok(())
    }
}
