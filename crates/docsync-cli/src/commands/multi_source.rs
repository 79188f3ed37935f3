//! Multi-source command - drive a multi-source knowledge base's sync
//!
//! Resolves the schema-bridge compatible KB, then fans the sync across the
//! selected (or all enabled) sources per the chosen `SyncMode`.

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use docsync_core::domain::newtypes::{KbName, SourceId};
use docsync_core::domain::sync_run::SyncMode;
use docsync_engine::{run_multi_source, RunMode};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::common::{open_audit, open_catalog, open_metrics};
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum MultiSourceCommand {
    /// Sync a multi-source knowledge base
    SyncMultiKb(SyncMultiKbArgs),
}

#[derive(Debug, Args)]
pub struct SyncMultiKbArgs {
    /// Name of the multi-source knowledge base
    #[arg(long)]
    pub kb_name: String,

    /// How the sources are driven: parallel, sequential, selective, or incremental
    #[arg(long, default_value = "parallel")]
    pub sync_mode: String,

    /// Comma-separated source ids to restrict the run to; defaults to all enabled sources
    #[arg(long)]
    pub sources: Option<String>,
}

impl MultiSourceCommand {
    pub async fn execute(&self, format: OutputFormat) -> Result<()> {
        match self {
            MultiSourceCommand::SyncMultiKb(args) => args.execute(format).await,
        }
    }
}

fn parse_sync_mode(s: &str) -> Result<SyncMode> {
    Ok(match s {
        "parallel" => SyncMode::Parallel,
        "sequential" => SyncMode::Sequential,
        "selective" => SyncMode::Selective,
        "incremental" => SyncMode::Incremental,
        other => bail!("unknown --sync-mode '{other}', expected parallel|sequential|selective|incremental"),
    })
}

impl SyncMultiKbArgs {
    async fn execute(&self, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json));

        let sync_mode = parse_sync_mode(&self.sync_mode)?;
        let (config, catalog, sqlite_pool) = open_catalog(None).await?;
        let kb_name = KbName::new(self.kb_name.clone()).context("invalid --kb-name")?;

        let multi_kb = catalog
            .get_multi_source_knowledge_base(&kb_name)
            .await
            .context("failed to query multi-source knowledge base")?;
        let multi_kb = match multi_kb {
            Some(kb) => kb,
            None => {
                formatter.error(&format!("no such multi-source knowledge base: {}", self.kb_name));
                return Ok(());
            }
        };

        let selected: Vec<SourceId> = match &self.sources {
            Some(csv) => csv
                .split(',')
                .map(|s| SourceId::new(s.trim().to_string()))
                .collect::<Result<_, _>>()
                .context("invalid --sources entry")?,
            None => multi_kb
                .enabled_sources()
                .iter()
                .map(|s| s.source_id.clone())
                .collect(),
        };

        info!(kb_name = %self.kb_name, sync_mode = %sync_mode, "starting multi-source sync");
        formatter.info(&format!(
            "Starting multi-source sync for '{}' ({} sources, mode={})",
            self.kb_name,
            selected.len(),
            sync_mode
        ));

        let audit = Some(open_audit(&sqlite_pool).await);
        let metrics = Some(open_metrics());

        let outcome = run_multi_source(
            catalog,
            &multi_kb,
            sync_mode,
            &selected,
            &config.orchestrator,
            &config.retry,
            RunMode::Sync,
            CancellationToken::new(),
            audit,
            metrics,
        )
        .await;

        match outcome {
            Ok(run) => {
                if matches!(format, OutputFormat::Json) {
                    formatter.print_json(&serde_json::json!({
                        "kb_name": self.kb_name,
                        "sync_run_id": run.id.as_i64(),
                        "status": run.status.to_string(),
                        "sync_mode": run.sync_mode.to_string(),
                        "sources_processed": run.sources_processed,
                        "new": run.counters.new,
                        "modified": run.counters.modified,
                        "deleted": run.counters.deleted,
                        "unchanged": run.counters.unchanged(),
                        "errors": run.counters.errors,
                    }));
                } else {
                    formatter.success(&format!("Multi-source sync completed for '{}'", self.kb_name));
                    formatter.info(&format!("Sources:   {}", run.sources_processed.join(", ")));
                    formatter.info(&format!("New:       {}", run.counters.new));
                    formatter.info(&format!("Modified:  {}", run.counters.modified));
                    formatter.info(&format!("Deleted:   {}", run.counters.deleted));
                    formatter.info(&format!("Unchanged: {}", run.counters.unchanged()));
                    if run.counters.errors > 0 {
                        formatter.error(&format!("{} file(s) failed", run.counters.errors));
                    }
                }
            }
            Err(e) => {
                if matches!(format, OutputFormat::Json) {
                    formatter.print_json(&serde_json::json!({"kb_name": self.kb_name, "error": e.to_string()}));
                } else {
                    formatter.error(&format!("Multi-source sync failed: {e}"));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_known_sync_modes() {
        assert!(matches!(parse_sync_mode("parallel").unwrap(), SyncMode::Parallel));
        assert!(matches!(parse_sync_mode("sequential").unwrap(), SyncMode::Sequential));
        assert!(matches!(parse_sync_mode("selective").unwrap(), SyncMode::Selective));
        assert!(matches!(parse_sync_mode("incremental").unwrap(), SyncMode::Incremental));
    }

    #[test]
    fn rejects_unknown_sync_mode() {
        assert!(parse_sync_mode("whenever").is_err());
    }
}
