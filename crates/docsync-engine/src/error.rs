//! Cross-cutting engine error type.
//!
//! Per-file errors never reach this type (they are recorded as `FileRecord`
//! rows with `status = error` and swallowed, per §4.6/§7); `EngineError` is
//! for run-fatal and structural failures that must abort a source's
//! orchestration or the whole driver.

use thiserror::Error;

use docsync_core::domain::DomainError;
use docsync_core::ports::{CatalogError, RagError, SourceError};

/// Errors that abort a sync run or the multi-source driver outright.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("rag error: {0}")]
    Rag(#[from] RagError),

    #[error("domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("schema bridge resolution failed: {0}")]
    SchemaBridge(String),

    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
