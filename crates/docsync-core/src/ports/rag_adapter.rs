//! RAG Adapter port: the engine's view of a RAG storage backend

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Metadata describing one artifact as returned by `List`/`Get`.
#[derive(Debug, Clone)]
pub struct RagArtifact {
    pub rag_uri: String,
    pub size: u64,
    pub metadata: Option<JsonValue>,
}

/// Errors a RAG adapter may report to the engine.
#[derive(Debug, Error)]
pub enum RagError {
    /// Transport or auth failure; the backend as a whole is down.
    #[error("RAG adapter unavailable: {0}")]
    AdapterUnavailable(String),

    /// Update addressed an artifact that no longer exists.
    #[error("RAG conflict: {0}")]
    Conflict(String),

    /// Retryable with backoff.
    #[error("transient RAG error: {0}")]
    TransientError(String),
}

/// The engine's view of a RAG storage backend (mock, file system, Azure Blob).
///
/// The engine treats the RAG backend as a write-through of the catalog: the
/// catalog is the source of truth and the RAG backend is reconstructible
/// from it. A single adapter instance is shared across workers; concurrent
/// calls under distinct `rag_uri`s must be safe, though the orchestrator
/// guarantees no two workers ever target the same `rag_uri` concurrently.
#[async_trait]
pub trait IRagAdapter: Send + Sync {
    /// Creates a new artifact under `filename` (the UUID-based name).
    /// Idempotent under a stable filename: uploading twice overwrites.
    async fn upload(
        &self,
        content: &[u8],
        filename: &str,
        metadata: Option<&JsonValue>,
    ) -> Result<String, RagError>;

    /// In-place overwrite of an existing artifact addressed by `rag_uri`.
    async fn update(
        &self,
        rag_uri: &str,
        content: &[u8],
        metadata: Option<&JsonValue>,
    ) -> Result<(), RagError>;

    /// Best-effort removal. A missing artifact is not an error.
    async fn delete(&self, rag_uri: &str) -> Result<(), RagError>;

    /// Enumerates artifacts, optionally restricted to a prefix.
    async fn list(&self, prefix: Option<&str>) -> Result<Vec<RagArtifact>, RagError>;

    /// Fetches metadata for one artifact, if it exists.
    async fn get(&self, rag_uri: &str) -> Result<Option<RagArtifact>, RagError>;
}
