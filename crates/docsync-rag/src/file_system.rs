//! RAG adapter that materializes artifacts as plain files under a directory
//! tree, with a metadata sidecar per artifact.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use docsync_core::ports::{IRagAdapter, RagArtifact, RagError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataFormat {
    Json,
    Yaml,
}

impl Default for MetadataFormat {
    fn default() -> Self {
        MetadataFormat::Json
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct FileSystemRagConfig {
    #[serde(alias = "root_path")]
    pub storage_path: PathBuf,
    pub kb_name: String,
    #[serde(default = "default_true")]
    pub create_dirs: bool,
    #[serde(default)]
    pub preserve_structure: bool,
    #[serde(default)]
    pub metadata_format: MetadataFormat,
}

impl FileSystemRagConfig {
    fn metadata_suffix(&self) -> &'static str {
        match self.metadata_format {
            MetadataFormat::Json => ".meta.json",
            MetadataFormat::Yaml => ".meta.yaml",
        }
    }
}

/// Writes RAG artifacts directly to a local directory tree.
///
/// Each artifact is stored as `{storage_path}/{kb_name}/{filename}` plus a
/// metadata sidecar `{filename}{suffix}` holding whatever JSON metadata was
/// passed alongside it. `preserve_structure` controls whether the filename
/// may itself contain path separators (kept verbatim, directories created as
/// needed) or is flattened to its final path segment.
pub struct FileSystemRagAdapter {
    config: FileSystemRagConfig,
    kb_root: PathBuf,
}

impl FileSystemRagAdapter {
    pub fn new(config: FileSystemRagConfig) -> Self {
        let kb_root = config.storage_path.join(&config.kb_name);
        Self { config, kb_root }
    }

    fn resolve_filename(&self, filename: &str) -> String {
        if self.config.preserve_structure {
            filename.to_string()
        } else {
            Path::new(filename)
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| filename.to_string())
        }
    }

    fn content_path(&self, filename: &str) -> PathBuf {
        self.kb_root.join(self.resolve_filename(filename))
    }

    fn metadata_path(&self, content_path: &Path) -> PathBuf {
        let mut s = content_path.as_os_str().to_owned();
        s.push(self.config.metadata_suffix());
        PathBuf::from(s)
    }

    fn rag_uri_for(&self, content_path: &Path) -> String {
        format!("file://{}", content_path.display())
    }

    fn path_from_uri(rag_uri: &str) -> Result<&Path, RagError> {
        rag_uri
            .strip_prefix("file://")
            .map(Path::new)
            .ok_or_else(|| RagError::AdapterUnavailable(format!("not a file:// uri: {rag_uri}")))
    }

    fn serialize_metadata(&self, metadata: &JsonValue) -> Result<Vec<u8>, RagError> {
        match self.config.metadata_format {
            MetadataFormat::Json => serde_json::to_vec_pretty(metadata)
                .map_err(|e| RagError::AdapterUnavailable(format!("metadata encode failed: {e}"))),
            MetadataFormat::Yaml => serde_yaml::to_string(metadata)
                .map(|s| s.into_bytes())
                .map_err(|e| RagError::AdapterUnavailable(format!("metadata encode failed: {e}"))),
        }
    }

    fn deserialize_metadata(&self, bytes: &[u8]) -> Option<JsonValue> {
        match self.config.metadata_format {
            MetadataFormat::Json => serde_json::from_slice(bytes).ok(),
            MetadataFormat::Yaml => serde_yaml::from_slice(bytes).ok(),
        }
    }

    async fn write_artifact(
        &self,
        content_path: &Path,
        content: &[u8],
        metadata: Option<&JsonValue>,
    ) -> Result<(), RagError> {
        if self.config.create_dirs {
            if let Some(parent) = content_path.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    RagError::AdapterUnavailable(format!("create_dir_all failed: {e}"))
                })?;
            }
        }
        tokio::fs::write(content_path, content)
            .await
            .map_err(|e| RagError::AdapterUnavailable(format!("write failed: {e}")))?;

        if let Some(metadata) = metadata {
            let encoded = self.serialize_metadata(metadata)?;
            let meta_path = self.metadata_path(content_path);
            tokio::fs::write(&meta_path, encoded)
                .await
                .map_err(|e| RagError::AdapterUnavailable(format!("metadata write failed: {e}")))?;
        }
        Ok(())
    }
}

#[async_trait]
impl IRagAdapter for FileSystemRagAdapter {
    async fn upload(
        &self,
        content: &[u8],
        filename: &str,
        metadata: Option<&JsonValue>,
    ) -> Result<String, RagError> {
        let content_path = self.content_path(filename);
        self.write_artifact(&content_path, content, metadata)
            .await?;
        Ok(self.rag_uri_for(&content_path))
    }

    async fn update(
        &self,
        rag_uri: &str,
        content: &[u8],
        metadata: Option<&JsonValue>,
    ) -> Result<(), RagError> {
        let content_path = Self::path_from_uri(rag_uri)?;
        match tokio::fs::metadata(content_path).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RagError::Conflict(format!("update on missing artifact: {rag_uri}")))
            }
            Err(e) => return Err(RagError::AdapterUnavailable(format!("stat failed: {e}"))),
        }
        self.write_artifact(content_path, content, metadata).await
    }

    async fn delete(&self, rag_uri: &str) -> Result<(), RagError> {
        let content_path = Self::path_from_uri(rag_uri)?;
        match tokio::fs::remove_file(content_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(RagError::AdapterUnavailable(format!("delete failed: {e}"))),
        }
        let meta_path = self.metadata_path(content_path);
        let _ = tokio::fs::remove_file(&meta_path).await;
        Ok(())
    }

    async fn list(&self, prefix: Option<&str>) -> Result<Vec<RagArtifact>, RagError> {
        let mut out = Vec::new();
        let mut stack = vec![self.kb_root.clone()];
        let suffix = self.config.metadata_suffix();

        while let Some(dir) = stack.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(RagError::AdapterUnavailable(format!(
                        "read_dir failed: {e}"
                    )))
                }
            };
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| RagError::AdapterUnavailable(format!("read_dir failed: {e}")))?
            {
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| RagError::AdapterUnavailable(format!("stat failed: {e}")))?;
                if file_type.is_dir() {
                    stack.push(path);
                    continue;
                }
                let name = path.to_string_lossy().into_owned();
                if name.ends_with(suffix) {
                    continue;
                }
                let uri = self.rag_uri_for(&path);
                if let Some(prefix) = prefix {
                    if !uri.starts_with(prefix) {
                        continue;
                    }
                }
                let metadata = self.read_metadata(&path).await;
                let size = entry
                    .metadata()
                    .await
                    .map_err(|e| RagError::AdapterUnavailable(format!("stat failed: {e}")))?
                    .len();
                out.push(RagArtifact {
                    rag_uri: uri,
                    size,
                    metadata,
                });
            }
        }
        Ok(out)
    }

    async fn get(&self, rag_uri: &str) -> Result<Option<RagArtifact>, RagError> {
        let content_path = Self::path_from_uri(rag_uri)?;
        let metadata = match tokio::fs::metadata(content_path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(RagError::AdapterUnavailable(format!("stat failed: {e}"))),
        };
        Ok(Some(RagArtifact {
            rag_uri: rag_uri.to_string(),
            size: metadata.len(),
            metadata: self.read_metadata(content_path).await,
        }))
    }
}

impl FileSystemRagAdapter {
    async fn read_metadata(&self, content_path: &Path) -> Option<JsonValue> {
        let meta_path = self.metadata_path(content_path);
        let bytes = tokio::fs::read(&meta_path).await.ok()?;
        self.deserialize_metadata(&bytes)
    }
}
