//! Microsoft Graph source adapter (SharePoint, Enterprise SharePoint, OneDrive).
//!
//! A single adapter type, [`GraphSourceAdapter`], backs all three
//! Graph-based source types; they differ only in how the drive root is
//! addressed. Listing walks `children` recursively (optionally), and delta
//! sync follows the Graph delta-query pattern, auto-paginating on
//! `@odata.nextLink` and surfacing `@odata.deltaLink` as the next
//! [`DeltaToken`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method};
use serde::Deserialize;
use tracing::{debug, warn};

use docsync_core::domain::DeltaToken;
use docsync_core::ports::{DeltaEntry, FetchedFile, FileDescriptor, ISourceAdapter, SourceError};

use crate::auth::TokenProvider;
use crate::client::GraphClient;
use crate::filter::{self, FilterConfig};

/// How the Graph drive root is addressed for this source definition.
#[derive(Debug, Clone)]
pub enum DriveRoot {
    /// `sharepoint` / `enterprise_sharepoint`: a SharePoint site drive.
    Site { hostname: String, site_path: String, folder: String },
    /// `onedrive`: either the signed-in user's own drive or another user's.
    OneDrive { user_id: Option<String>, folder: String },
}

impl DriveRoot {
    /// Graph path prefix addressing this drive, without a trailing `/root`.
    fn drive_prefix(&self) -> String {
        match self {
            DriveRoot::Site { hostname, site_path, .. } => {
                format!("/sites/{hostname}:{site_path}:/drive")
            }
            DriveRoot::OneDrive { user_id: Some(id), .. } => format!("/users/{id}/drive"),
            DriveRoot::OneDrive { user_id: None, .. } => "/me/drive".to_string(),
        }
    }

    fn folder(&self) -> &str {
        match self {
            DriveRoot::Site { folder, .. } => folder,
            DriveRoot::OneDrive { folder, .. } => folder,
        }
    }

    /// Path-addressed root, e.g. `/sites/contoso.sharepoint.com:/sites/docs:/drive/root:/Shared`.
    fn root_path(&self) -> String {
        let folder = self.folder();
        if folder.is_empty() || folder == "/" {
            format!("{}/root", self.drive_prefix())
        } else {
            format!("{}/root:{}", self.drive_prefix(), folder)
        }
    }

    /// Path-addressed item for `relative_uri`, e.g. `.../root:/Shared/a.txt`.
    fn item_path(&self, relative_uri: &str) -> String {
        format!("{}/root:{}", self.drive_prefix(), relative_uri)
    }

    fn children_path(&self) -> String {
        format!("{}:/children", self.root_path())
    }

    fn delta_path(&self) -> String {
        format!("{}/delta", self.root_path())
    }
}

// ============================================================================
// Graph API response types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct GraphChildrenResponse {
    #[serde(default)]
    value: Vec<GraphDriveItem>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GraphDeltaResponse {
    #[serde(default)]
    value: Vec<GraphDriveItem>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
    #[serde(rename = "@odata.deltaLink")]
    delta_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphDriveItem {
    #[serde(default)]
    name: String,
    size: Option<u64>,
    created_date_time: Option<DateTime<Utc>>,
    last_modified_date_time: Option<DateTime<Utc>>,
    parent_reference: Option<GraphParentReference>,
    file: Option<GraphFileFacet>,
    folder: Option<GraphFolderFacet>,
    deleted: Option<GraphDeletedFacet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphParentReference {
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphFileFacet {
    mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphFolderFacet {}

#[derive(Debug, Deserialize)]
struct GraphDeletedFacet {}

/// Strips the Graph `/drive/root:` path prefix and appends the item name.
fn normalize_path(parent_path: Option<&str>, name: &str) -> String {
    let stripped = parent_path
        .and_then(|p| p.split_once("root:").map(|(_, rest)| rest))
        .unwrap_or("");
    if stripped.is_empty() {
        format!("/{name}")
    } else {
        format!("{stripped}/{name}")
    }
}

fn item_to_descriptor(item: &GraphDriveItem, path: String) -> FileDescriptor {
    FileDescriptor {
        original_uri: path,
        size: item.size.unwrap_or(0),
        content_type: item.file.as_ref().and_then(|f| f.mime_type.clone()),
        source_created_at: item.created_date_time,
        source_modified_at: item.last_modified_date_time,
        source_path: item
            .parent_reference
            .as_ref()
            .and_then(|p| p.path.clone()),
        metadata: None,
    }
}

/// `ISourceAdapter` backed by Microsoft Graph (SharePoint or OneDrive drives).
pub struct GraphSourceAdapter {
    client: Client,
    base_url: String,
    token_provider: Arc<TokenProvider>,
    drive_root: DriveRoot,
    filter: FilterConfig,
    recursive: bool,
}

impl GraphSourceAdapter {
    pub fn new(
        token_provider: Arc<TokenProvider>,
        drive_root: DriveRoot,
        filter: FilterConfig,
        recursive: bool,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: crate::client::GRAPH_BASE_URL.to_string(),
            token_provider,
            drive_root,
            filter,
            recursive,
        }
    }

    async fn authed_client(&self) -> Result<GraphClient, SourceError> {
        let token = self.token_provider.access_token().await.map_err(|e| {
            SourceError::SourceUnavailable(format!("failed to obtain Graph access token: {e}"))
        })?;
        Ok(GraphClient::with_base_url(token, self.base_url.clone()))
    }

    async fn list_children(
        &self,
        client: &GraphClient,
        path: &str,
        out: &mut Vec<FileDescriptor>,
    ) -> Result<(), SourceError> {
        let mut next: Option<String> = Some(format!("{path}:/children"));

        while let Some(link) = next.take() {
            let response: GraphChildrenResponse = client
                .get_json(&link)
                .await
                .map_err(|e| SourceError::TransientError(e.to_string()))?;

            for item in &response.value {
                let item_path = normalize_path(
                    item.parent_reference.as_ref().and_then(|p| p.path.as_deref()),
                    &item.name,
                );

                if item.folder.is_some() {
                    if self.recursive {
                        Box::pin(self.list_children(
                            client,
                            &self.drive_root.item_path(&item_path),
                            out,
                        ))
                        .await?;
                    }
                    continue;
                }

                if !filter::is_included(&item_path, &self.filter) {
                    continue;
                }
                out.push(item_to_descriptor(item, item_path));
            }

            next = response.next_link;
        }

        Ok(())
    }
}

#[async_trait]
impl ISourceAdapter for GraphSourceAdapter {
    async fn list(&self) -> Result<Vec<FileDescriptor>, SourceError> {
        let client = self.authed_client().await?;
        let mut out = Vec::new();
        self.list_children(&client, &self.drive_root.root_path(), &mut out)
            .await?;
        Ok(out)
    }

    async fn delta_list(
        &self,
        token: Option<&DeltaToken>,
    ) -> Result<Option<(Vec<DeltaEntry>, DeltaToken)>, SourceError> {
        let client = self.authed_client().await?;

        let mut path = match token {
            Some(t) => t.as_str().to_string(),
            None => self.drive_root.delta_path(),
        };

        let mut entries = Vec::new();
        let mut delta_link = None;

        loop {
            let response = client
                .request(Method::GET, &path)
                .send()
                .await
                .map_err(|e| SourceError::TransientError(e.to_string()))?;

            if response.status() == reqwest::StatusCode::GONE {
                return Err(SourceError::TokenInvalid(
                    "delta token expired (410 Gone); re-baseline with a full listing".to_string(),
                ));
            }

            let page: GraphDeltaResponse = response
                .error_for_status()
                .map_err(|e| SourceError::TransientError(e.to_string()))?
                .json()
                .await
                .map_err(|e| SourceError::TransientError(format!("invalid delta response: {e}")))?;

            for item in &page.value {
                let item_path = normalize_path(
                    item.parent_reference.as_ref().and_then(|p| p.path.as_deref()),
                    &item.name,
                );

                if item.deleted.is_some() {
                    entries.push(DeltaEntry::Tombstone {
                        original_uri: item_path,
                    });
                    continue;
                }
                if item.folder.is_some() {
                    continue;
                }
                if !filter::is_included(&item_path, &self.filter) {
                    continue;
                }
                entries.push(DeltaEntry::Present(item_to_descriptor(item, item_path)));
            }

            if let Some(next) = page.next_link {
                path = next;
                continue;
            }

            delta_link = page.delta_link;
            break;
        }

        let Some(delta_link) = delta_link else {
            warn!("delta query completed without a deltaLink; next sync will need a full listing");
            return Ok(Some((entries, DeltaToken::new(self.drive_root.delta_path())
                .map_err(|e| SourceError::TransientError(e.to_string()))?)));
        };

        debug!(items = entries.len(), "delta query complete");
        let next_token = DeltaToken::new(delta_link)
            .map_err(|e| SourceError::TransientError(e.to_string()))?;
        Ok(Some((entries, next_token)))
    }

    async fn fetch(&self, original_uri: &str) -> Result<FetchedFile, SourceError> {
        let client = self.authed_client().await?;
        let path = format!("{}:/content", self.drive_root.item_path(original_uri));

        let content = client
            .download_bytes(&path)
            .await
            .map_err(|e| SourceError::TransientError(e.to_string()))?;

        Ok(FetchedFile {
            size: content.len() as u64,
            content,
            content_type: None,
            source_modified_at: None,
        })
    }

    fn supports_delta(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_root_path_includes_hostname_and_folder() {
        let root = DriveRoot::Site {
            hostname: "contoso.sharepoint.com".into(),
            site_path: "/sites/docs".into(),
            folder: "/Shared Documents".into(),
        };
        assert_eq!(
            root.root_path(),
            "/sites/contoso.sharepoint.com:/sites/docs:/drive/root:/Shared Documents"
        );
    }

    #[test]
    fn onedrive_me_root_path_without_folder() {
        let root = DriveRoot::OneDrive {
            user_id: None,
            folder: String::new(),
        };
        assert_eq!(root.root_path(), "/me/drive/root");
    }

    #[test]
    fn onedrive_other_user_root_path() {
        let root = DriveRoot::OneDrive {
            user_id: Some("user-123".into()),
            folder: "/Reports".into(),
        };
        assert_eq!(root.root_path(), "/users/user-123/drive/root:/Reports");
    }

    #[test]
    fn normalize_path_strips_drive_root_prefix() {
        let path = normalize_path(Some("/drive/root:/Documents/Sub"), "file.txt");
        assert_eq!(path, "/Documents/Sub/file.txt");
    }

    #[test]
    fn normalize_path_handles_missing_parent() {
        let path = normalize_path(None, "file.txt");
        assert_eq!(path, "/file.txt");
    }
}
