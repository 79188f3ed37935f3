//! Local file system source adapter.
//!
//! Lists and fetches files beneath a configured root directory. Read-only:
//! the engine never writes back to a file system source. Hashing is not
//! performed here — the Change Detector/File Processor hash fetched bytes
//! once they decide a file needs it.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use docsync_core::domain::DeltaToken;
use docsync_core::ports::{DeltaEntry, FetchedFile, FileDescriptor, ISourceAdapter, SourceError};

use crate::filter::{self, FilterConfig};

/// Parsed `source_config` for a `file_system` source definition.
#[derive(Debug, Clone, Deserialize)]
pub struct FileSystemSourceConfig {
    pub root_path: PathBuf,
    #[serde(default)]
    pub include_patterns: Vec<String>,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    #[serde(default)]
    pub include_extensions: Vec<String>,
    #[serde(default)]
    pub exclude_extensions: Vec<String>,
}

impl FileSystemSourceConfig {
    fn filter(&self) -> FilterConfig {
        FilterConfig {
            include_patterns: self.include_patterns.clone(),
            exclude_patterns: self.exclude_patterns.clone(),
            include_extensions: self.include_extensions.clone(),
            exclude_extensions: self.exclude_extensions.clone(),
        }
    }
}

/// `ISourceAdapter` for a directory tree on local disk.
pub struct FileSystemSourceAdapter {
    config: FileSystemSourceConfig,
}

impl FileSystemSourceAdapter {
    pub fn new(config: FileSystemSourceConfig) -> Self {
        Self { config }
    }

    async fn walk(root: &Path, filter_cfg: &FilterConfig) -> Result<Vec<FileDescriptor>, SourceError> {
        let mut out = Vec::new();
        let mut pending = vec![root.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| {
                SourceError::SourceUnavailable(format!(
                    "failed to read directory {}: {e}",
                    dir.display()
                ))
            })?;

            while let Some(entry) = entries.next_entry().await.map_err(|e| {
                SourceError::TransientError(format!("failed to read directory entry: {e}"))
            })? {
                let path = entry.path();
                let file_type = entry.file_type().await.map_err(|e| {
                    SourceError::TransientError(format!("failed to stat {}: {e}", path.display()))
                })?;

                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }
                if !file_type.is_file() {
                    continue;
                }

                let original_uri = path.to_string_lossy().into_owned();
                if !filter::is_included(&original_uri, filter_cfg) {
                    continue;
                }

                let metadata = entry.metadata().await.map_err(|e| {
                    SourceError::TransientError(format!(
                        "failed to stat {}: {e}",
                        path.display()
                    ))
                })?;

                let source_modified_at: Option<DateTime<Utc>> =
                    metadata.modified().ok().map(DateTime::<Utc>::from);

                out.push(FileDescriptor {
                    original_uri,
                    size: metadata.len(),
                    content_type: None,
                    source_created_at: metadata.created().ok().map(DateTime::<Utc>::from),
                    source_modified_at,
                    source_path: Some(path.to_string_lossy().into_owned()),
                    metadata: None,
                });
            }
        }

        Ok(out)
    }
}

#[async_trait]
impl ISourceAdapter for FileSystemSourceAdapter {
    async fn list(&self) -> Result<Vec<FileDescriptor>, SourceError> {
        Self::walk(&self.config.root_path, &self.config.filter()).await
    }

    async fn delta_list(
        &self,
        _token: Option<&DeltaToken>,
    ) -> Result<Option<(Vec<DeltaEntry>, DeltaToken)>, SourceError> {
        Ok(None)
    }

    async fn fetch(&self, original_uri: &str) -> Result<FetchedFile, SourceError> {
        let path = PathBuf::from(original_uri);
        let content = tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SourceError::NotFound(original_uri.to_string())
            } else {
                SourceError::TransientError(format!("failed to read {original_uri}: {e}"))
            }
        })?;

        let metadata = tokio::fs::metadata(&path).await.ok();
        let source_modified_at = metadata
            .as_ref()
            .and_then(|m| m.modified().ok())
            .map(DateTime::<Utc>::from);

        Ok(FetchedFile {
            size: content.len() as u64,
            content,
            content_type: None,
            source_modified_at,
        })
    }

    fn supports_delta(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter_for(root: PathBuf) -> FileSystemSourceAdapter {
        FileSystemSourceAdapter::new(FileSystemSourceConfig {
            root_path: root,
            include_patterns: vec![],
            exclude_patterns: vec![],
            include_extensions: vec![],
            exclude_extensions: vec![],
        })
    }

    #[tokio::test]
    async fn lists_files_recursively() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.txt"), b"a").await.unwrap();
        tokio::fs::create_dir(dir.path().join("sub")).await.unwrap();
        tokio::fs::write(dir.path().join("sub/b.txt"), b"bb").await.unwrap();

        let adapter = adapter_for(dir.path().to_path_buf());
        let mut listing = adapter.list().await.unwrap();
        listing.sort_by(|a, b| a.original_uri.cmp(&b.original_uri));

        assert_eq!(listing.len(), 2);
        assert_eq!(listing.iter().find(|f| f.original_uri.ends_with("a.txt")).unwrap().size, 1);
        assert_eq!(listing.iter().find(|f| f.original_uri.ends_with("b.txt")).unwrap().size, 2);
    }

    #[tokio::test]
    async fn respects_exclude_extension_filter() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("keep.txt"), b"x").await.unwrap();
        tokio::fs::write(dir.path().join("skip.tmp"), b"x").await.unwrap();

        let adapter = FileSystemSourceAdapter::new(FileSystemSourceConfig {
            root_path: dir.path().to_path_buf(),
            include_patterns: vec![],
            exclude_patterns: vec![],
            include_extensions: vec![],
            exclude_extensions: vec!["tmp".to_string()],
        });

        let listing = adapter.list().await.unwrap();
        assert_eq!(listing.len(), 1);
        assert!(listing[0].original_uri.ends_with("keep.txt"));
    }

    #[tokio::test]
    async fn fetch_returns_not_found_for_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = adapter_for(dir.path().to_path_buf());
        let err = adapter
            .fetch(dir.path().join("missing.txt").to_str().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::NotFound(_)));
    }

    #[tokio::test]
    async fn fetch_roundtrips_content() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("a.txt");
        tokio::fs::write(&file_path, b"hello").await.unwrap();

        let adapter = adapter_for(dir.path().to_path_buf());
        let fetched = adapter.fetch(file_path.to_str().unwrap()).await.unwrap();
        assert_eq!(fetched.content, b"hello");
        assert_eq!(fetched.size, 5);
    }

    #[test]
    fn does_not_support_delta() {
        let adapter = adapter_for(PathBuf::from("/tmp"));
        assert!(!adapter.supports_delta());
    }
}
