//! Source Adapter port: the engine's view of a document source

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::domain::DeltaToken;

/// A file as seen by a source's `List`/`DeltaList`, before classification.
#[derive(Debug, Clone)]
pub struct FileDescriptor {
    pub original_uri: String,
    pub size: u64,
    pub content_type: Option<String>,
    pub source_created_at: Option<DateTime<Utc>>,
    pub source_modified_at: Option<DateTime<Utc>>,
    pub source_path: Option<String>,
    pub metadata: Option<JsonValue>,
}

/// One entry in a delta listing: either a live candidate or a tombstone.
#[derive(Debug, Clone)]
pub enum DeltaEntry {
    Present(FileDescriptor),
    Tombstone { original_uri: String },
}

/// The bytes and authoritative metadata returned by `Fetch`.
pub struct FetchedFile {
    pub content: Vec<u8>,
    pub size: u64,
    pub content_type: Option<String>,
    pub source_modified_at: Option<DateTime<Utc>>,
}

/// Errors a source adapter may report to the engine.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Authentication or transport failure; the source as a whole is down.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// The requested URI no longer exists (treated as a concurrent deletion).
    #[error("not found: {0}")]
    NotFound(String),

    /// Retryable with backoff.
    #[error("transient error: {0}")]
    TransientError(String),

    /// The delta token supplied is no longer valid; caller should clear it
    /// and re-baseline with a full listing.
    #[error("delta token invalid: {0}")]
    TokenInvalid(String),
}

/// The engine's view of a document source: file system, SharePoint, OneDrive.
///
/// A single adapter instance is shared across all workers processing one
/// source and must tolerate concurrent `fetch` calls.
#[async_trait]
pub trait ISourceAdapter: Send + Sync {
    /// Produces the finite set of file descriptors currently visible,
    /// after config-driven include/exclude filtering.
    async fn list(&self) -> Result<Vec<FileDescriptor>, SourceError>;

    /// Incremental listing against a previous cursor. `None` means list
    /// from the beginning. Adapters that don't support delta listing
    /// should return `Ok(None)` rather than erroring.
    async fn delta_list(
        &self,
        token: Option<&DeltaToken>,
    ) -> Result<Option<(Vec<DeltaEntry>, DeltaToken)>, SourceError>;

    /// Fetches the byte content and authoritative metadata for one URI.
    async fn fetch(&self, original_uri: &str) -> Result<FetchedFile, SourceError>;

    /// Whether `delta_list` is meaningfully implemented for this adapter.
    fn supports_delta(&self) -> bool {
        false
    }
}
