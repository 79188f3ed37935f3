//! In-memory RAG adapter, used by tests and local `scan`/dry-run workflows.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use docsync_core::ports::{IRagAdapter, RagArtifact, RagError};

struct StoredArtifact {
    content: Vec<u8>,
    metadata: Option<JsonValue>,
}

/// Pure in-memory implementation of `IRagAdapter`. Never touches disk or
/// the network; existence does not survive process restart.
#[derive(Default)]
pub struct MockRagAdapter {
    store: Mutex<HashMap<String, StoredArtifact>>,
}

impl MockRagAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IRagAdapter for MockRagAdapter {
    async fn upload(
        &self,
        content: &[u8],
        filename: &str,
        metadata: Option<&JsonValue>,
    ) -> Result<String, RagError> {
        let rag_uri = format!("mock://{filename}");
        self.store.lock().unwrap().insert(
            rag_uri.clone(),
            StoredArtifact {
                content: content.to_vec(),
                metadata: metadata.cloned(),
            },
        );
        Ok(rag_uri)
    }

    async fn update(
        &self,
        rag_uri: &str,
        content: &[u8],
        metadata: Option<&JsonValue>,
    ) -> Result<(), RagError> {
        let mut store = self.store.lock().unwrap();
        if !store.contains_key(rag_uri) {
            return Err(RagError::Conflict(format!(
                "update on missing artifact: {rag_uri}"
            )));
        }
        store.insert(
            rag_uri.to_string(),
            StoredArtifact {
                content: content.to_vec(),
                metadata: metadata.cloned(),
            },
        );
        Ok(())
    }

    async fn delete(&self, rag_uri: &str) -> Result<(), RagError> {
        self.store.lock().unwrap().remove(rag_uri);
        Ok(())
    }

    async fn list(&self, prefix: Option<&str>) -> Result<Vec<RagArtifact>, RagError> {
        let store = self.store.lock().unwrap();
        Ok(store
            .iter()
            .filter(|(uri, _)| prefix.map(|p| uri.starts_with(p)).unwrap_or(true))
            .map(|(uri, artifact)| RagArtifact {
                rag_uri: uri.clone(),
                size: artifact.content.len() as u64,
                metadata: artifact.metadata.clone(),
            })
            .collect())
    }

    async fn get(&self, rag_uri: &str) -> Result<Option<RagArtifact>, RagError> {
        let store = self.store.lock().unwrap();
        Ok(store.get(rag_uri).map(|artifact| RagArtifact {
            rag_uri: rag_uri.to_string(),
            size: artifact.content.len() as u64,
            metadata: artifact.metadata.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_then_get_round_trips() {
        let adapter = MockRagAdapter::new();
        let uri = adapter.upload(b"hello", "a.txt", None).await.unwrap();
        let artifact = adapter.get(&uri).await.unwrap().unwrap();
        assert_eq!(artifact.size, 5);
    }

    #[tokio::test]
    async fn update_on_missing_artifact_conflicts() {
        let adapter = MockRagAdapter::new();
        let err = adapter.update("mock://missing", b"x", None).await.unwrap_err();
        assert!(matches!(err, RagError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_overwrites_existing_content() {
        let adapter = MockRagAdapter::new();
        let uri = adapter.upload(b"v1", "a.txt", None).await.unwrap();
        adapter.update(&uri, b"v2-longer", None).await.unwrap();
        let artifact = adapter.get(&uri).await.unwrap().unwrap();
        assert_eq!(artifact.size, 9);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let adapter = MockRagAdapter::new();
        let uri = adapter.upload(b"v1", "a.txt", None).await.unwrap();
        adapter.delete(&uri).await.unwrap();
        adapter.delete(&uri).await.unwrap();
        assert!(adapter.get(&uri).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_respects_prefix() {
        let adapter = MockRagAdapter::new();
        adapter.upload(b"a", "kb1/a.txt", None).await.unwrap();
        adapter.upload(b"b", "kb2/b.txt", None).await.unwrap();
        let listed = adapter.list(Some("mock://kb1")).await.unwrap();
        assert_eq!(listed.len(), 1);
    }
}
