//! Document Sync RAG - adapters that turn a knowledge base's `rag_type_tag`
//! + `rag_config` JSON into a running `IRagAdapter`.
//!
//! ## Modules
//!
//! - [`mock`] - in-memory adapter for tests and dry runs
//! - [`file_system`] - local directory tree adapter with metadata sidecars
//! - [`azure_blob`] - Azure Blob Storage adapter over the Blob REST API

pub mod azure_blob;
pub mod file_system;
pub mod mock;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde_json::Value as JsonValue;

use docsync_core::ports::IRagAdapter;

use azure_blob::{AzureBlobRagAdapter, AzureBlobRagConfig};
use file_system::{FileSystemRagAdapter, FileSystemRagConfig};
use mock::MockRagAdapter;

/// Builds the `IRagAdapter` for a knowledge base, given its `rag_type_tag`
/// (`mock`, `file_system_storage`, `azure_blob`) and its opaque `rag_config`
/// JSON blob.
pub fn build_rag_adapter(rag_type_tag: &str, config: &JsonValue) -> Result<Arc<dyn IRagAdapter>> {
    match rag_type_tag {
        "mock" => Ok(Arc::new(MockRagAdapter::new())),
        "file_system_storage" => {
            let cfg: FileSystemRagConfig = serde_json::from_value(config.clone())
                .context("invalid file_system_storage rag_config")?;
            Ok(Arc::new(FileSystemRagAdapter::new(cfg)))
        }
        "azure_blob" => {
            let cfg: AzureBlobRagConfig = serde_json::from_value(config.clone())
                .context("invalid azure_blob rag_config")?;
            Ok(Arc::new(AzureBlobRagAdapter::new(cfg)?))
        }
        other => bail!("unknown rag_type_tag: {other}"),
    }
}
