//! Status command - recent sync-run history for a knowledge base
//!
//! Lists the most recent `SyncRun` rows from the catalog, then the most
//! recent audit-log events for the same KB for extra context (delta-token
//! lifecycle, per-file actions) that the catalog's own rows don't carry.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::Args;
use docsync_core::domain::newtypes::KbName;

use super::common::{open_audit, open_catalog};
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Name of the knowledge base
    pub kb: String,

    /// Maximum number of sync runs to show
    #[arg(long, default_value = "10")]
    pub limit: u32,
}

impl StatusCommand {
    pub async fn execute(&self, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json));

        let (_config, catalog, sqlite_pool) = open_catalog(None).await?;
        let kb_name = KbName::new(self.kb.clone()).context("invalid KB name")?;

        let kb = catalog
            .get_knowledge_base(&kb_name)
            .await
            .context("failed to query knowledge base")?;
        let kb = match kb {
            Some(kb) => kb,
            None => {
                formatter.error(&format!("no such knowledge base: {}", self.kb));
                return Ok(());
            }
        };

        let runs = catalog
            .recent_sync_runs(kb.id, self.limit)
            .await
            .context("failed to query recent sync runs")?;

        let audit = open_audit(&sqlite_pool).await;
        let events = audit
            .query_since(&self.kb, Utc::now() - Duration::days(7), self.limit)
            .await
            .unwrap_or_default();

        if matches!(format, OutputFormat::Json) {
            let runs_json: Vec<_> = runs
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "sync_run_id": r.id.as_i64(),
                        "status": r.status.to_string(),
                        "start_time": r.start_time.to_rfc3339(),
                        "end_time": r.end_time.map(|t| t.to_rfc3339()),
                        "new": r.counters.new,
                        "modified": r.counters.modified,
                        "deleted": r.counters.deleted,
                        "unchanged": r.counters.unchanged(),
                        "errors": r.counters.errors,
                        "error_message": r.error_message,
                    })
                })
                .collect();
            let events_json: Vec<_> = events
                .iter()
                .map(|e| {
                    serde_json::json!({
                        "kind": e.kind.to_string(),
                        "occurred_at": e.occurred_at.to_rfc3339(),
                        "details": e.details,
                    })
                })
                .collect();

            formatter.print_json(&serde_json::json!({
                "kb_name": self.kb,
                "runs": runs_json,
                "recent_events": events_json,
            }));
            return Ok(());
        }

        formatter.success(&format!("Status for '{}'", self.kb));
        formatter.info("");

        if runs.is_empty() {
            formatter.info("No sync runs recorded yet.");
        } else {
            formatter.info("Run      Status           Started              New  Mod  Del  Err");
            formatter.info("-------- ---------------- -------------------- ---- ---- ---- ----");
            for r in &runs {
                formatter.info(&format!(
                    "{:<8} {:<16} {:<20} {:<4} {:<4} {:<4} {:<4}",
                    r.id.as_i64(),
                    r.status.to_string(),
                    r.start_time.format("%Y-%m-%d %H:%M:%S"),
                    r.counters.new,
                    r.counters.modified,
                    r.counters.deleted,
                    r.counters.errors,
                ));
            }
        }

        if !events.is_empty() {
            formatter.info("");
            formatter.info("Recent events:");
            for e in &events {
                formatter.info(&format!(
                    "  {} {}",
                    e.occurred_at.format("%Y-%m-%d %H:%M:%S"),
                    e.kind
                ));
            }
        }

        Ok(())
    }
}
