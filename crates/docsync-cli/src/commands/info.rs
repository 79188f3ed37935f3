//! Info command - show a knowledge base's stored configuration snapshot

use anyhow::{Context, Result};
use clap::Args;
use docsync_core::domain::newtypes::KbName;

use super::common::open_catalog;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct InfoCommand {
    /// Name of the knowledge base
    pub kb: String,
}

impl InfoCommand {
    pub async fn execute(&self, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json));

        let (_config, catalog, _sqlite_pool) = open_catalog(None).await?;
        let kb_name = KbName::new(self.kb.clone()).context("invalid KB name")?;

        if let Some(kb) = catalog
            .get_knowledge_base(&kb_name)
            .await
            .context("failed to query knowledge base")?
        {
            if matches!(format, OutputFormat::Json) {
                formatter.print_json(&serde_json::json!({
                    "kb_name": kb.name.as_str(),
                    "kind": "single_source",
                    "source_type": kb.source_type,
                    "source_config": kb.source_config,
                    "rag_type": kb.rag_type,
                    "rag_config": kb.rag_config,
                    "created_at": kb.created_at.to_rfc3339(),
                    "updated_at": kb.updated_at.to_rfc3339(),
                }));
                return Ok(());
            }

            formatter.success(&format!("Knowledge base '{}'", kb.name.as_str()));
            formatter.info("");
            formatter.info(&format!("Source type: {}", kb.source_type));
            formatter.info(&format!(
                "Source config: {}",
                serde_json::to_string_pretty(&kb.source_config).unwrap_or_default()
            ));
            formatter.info(&format!("RAG type:    {}", kb.rag_type));
            formatter.info(&format!(
                "RAG config: {}",
                serde_json::to_string_pretty(&kb.rag_config).unwrap_or_default()
            ));
            formatter.info(&format!(
                "Created: {}",
                kb.created_at.format("%Y-%m-%d %H:%M:%S UTC")
            ));
            formatter.info(&format!(
                "Updated: {}",
                kb.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
            ));
            return Ok(());
        }

        if let Some(multi_kb) = catalog
            .get_multi_source_knowledge_base(&kb_name)
            .await
            .context("failed to query multi-source knowledge base")?
        {
            if matches!(format, OutputFormat::Json) {
                let sources: Vec<_> = multi_kb
                    .sources
                    .iter()
                    .map(|s| {
                        serde_json::json!({
                            "source_id": s.source_id.as_str(),
                            "source_type": s.source_type,
                            "enabled": s.enabled,
                        })
                    })
                    .collect();
                formatter.print_json(&serde_json::json!({
                    "kb_name": multi_kb.name.as_str(),
                    "kind": "multi_source",
                    "rag_type": multi_kb.rag_type,
                    "rag_config": multi_kb.rag_config,
                    "sources": sources,
                    "created_at": multi_kb.created_at.to_rfc3339(),
                    "updated_at": multi_kb.updated_at.to_rfc3339(),
                }));
                return Ok(());
            }

            formatter.success(&format!("Multi-source knowledge base '{}'", multi_kb.name.as_str()));
            formatter.info("");
            formatter.info(&format!("RAG type: {}", multi_kb.rag_type));
            formatter.info(&format!("Sources ({}):", multi_kb.sources.len()));
            for s in &multi_kb.sources {
                let state = if s.enabled { "enabled" } else { "disabled" };
                formatter.info(&format!("  {} ({}) [{}]", s.source_id.as_str(), s.source_type, state));
            }
            return Ok(());
        }

        formatter.error(&format!("no such knowledge base: {}", self.kb));
        Ok(())
    }
}
