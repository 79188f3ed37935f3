//! Document Sync Sources - adapters that turn a source definition's
//! `source_type_tag` + `source_config` JSON into a running `ISourceAdapter`.
//!
//! ## Modules
//!
//! - [`filesystem`] - local directory tree adapter
//! - [`graph`] - SharePoint / Enterprise SharePoint / OneDrive adapter over Microsoft Graph
//! - [`auth`] - non-interactive OAuth2 token acquisition for Graph
//! - [`client`] - Graph HTTP client with 429 retry and rate limiting
//! - [`rate_limit`] - adaptive per-endpoint token bucket rate limiting
//! - [`filter`] - shared include/exclude config filtering

pub mod auth;
pub mod client;
pub mod filesystem;
pub mod filter;
pub mod graph;
pub mod rate_limit;

use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use docsync_core::ports::ISourceAdapter;

use auth::{GraphCredentials, TokenProvider};
use filesystem::{FileSystemSourceAdapter, FileSystemSourceConfig};
use filter::FilterConfig;
use graph::{DriveRoot, GraphSourceAdapter};

#[derive(Debug, Deserialize)]
struct CredentialsConfig {
    tenant_id: String,
    client_id: String,
    #[serde(default)]
    client_secret: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

impl CredentialsConfig {
    fn into_credentials(self) -> Result<GraphCredentials> {
        if let Some(secret) = self.client_secret {
            return Ok(GraphCredentials::ClientCredentials {
                tenant_id: self.tenant_id,
                client_id: self.client_id,
                client_secret: secret,
            });
        }
        match (self.username, self.password) {
            (Some(username), Some(password)) => Ok(GraphCredentials::ResourceOwnerPassword {
                tenant_id: self.tenant_id,
                client_id: self.client_id,
                username,
                password,
            }),
            _ => bail!(
                "source credentials must supply either client_secret or username+password"
            ),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SharePointSourceConfig {
    site_url: String,
    #[serde(default)]
    path: String,
    credentials: CredentialsConfig,
    #[serde(default = "default_true")]
    recursive: bool,
    #[serde(default)]
    include_patterns: Vec<String>,
    #[serde(default)]
    exclude_patterns: Vec<String>,
    #[serde(default)]
    include_extensions: Vec<String>,
    #[serde(default)]
    exclude_extensions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct OneDriveSourceConfig {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    root_folder: String,
    #[serde(default = "default_account_type")]
    account_type: String,
    credentials: CredentialsConfig,
    #[serde(default = "default_true")]
    recursive: bool,
    #[serde(default)]
    include_patterns: Vec<String>,
    #[serde(default)]
    exclude_patterns: Vec<String>,
    #[serde(default)]
    include_extensions: Vec<String>,
    #[serde(default)]
    exclude_extensions: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_account_type() -> String {
    "business".to_string()
}

fn filter_of(
    include_patterns: &[String],
    exclude_patterns: &[String],
    include_extensions: &[String],
    exclude_extensions: &[String],
) -> FilterConfig {
    FilterConfig {
        include_patterns: include_patterns.to_vec(),
        exclude_patterns: exclude_patterns.to_vec(),
        include_extensions: include_extensions.to_vec(),
        exclude_extensions: exclude_extensions.to_vec(),
    }
}

/// Extracts `{hostname}` and `/sites/{name}` from a SharePoint site URL such
/// as `https://contoso.sharepoint.com/sites/docs`.
fn parse_site_url(site_url: &str) -> Result<(String, String)> {
    let url = url::Url::parse(site_url).context("invalid site_url")?;
    let hostname = url
        .host_str()
        .ok_or_else(|| anyhow!("site_url has no host"))?
        .to_string();
    let path = url.path().trim_end_matches('/').to_string();
    Ok((hostname, path))
}

/// Builds the `ISourceAdapter` for a source definition, given its
/// `source_type_tag` (`file_system`, `sharepoint`, `enterprise_sharepoint`,
/// `onedrive`) and its opaque `source_config` JSON blob.
pub fn build_source_adapter(
    source_type_tag: &str,
    config: &JsonValue,
) -> Result<Arc<dyn ISourceAdapter>> {
    match source_type_tag {
        "file_system" => {
            let cfg: FileSystemSourceConfig = serde_json::from_value(config.clone())
                .context("invalid file_system source_config")?;
            Ok(Arc::new(FileSystemSourceAdapter::new(cfg)))
        }
        "sharepoint" | "enterprise_sharepoint" => {
            let cfg: SharePointSourceConfig = serde_json::from_value(config.clone())
                .context("invalid sharepoint source_config")?;
            let (hostname, site_path) = parse_site_url(&cfg.site_url)?;
            let credentials = cfg.credentials.into_credentials()?;
            let drive_root = DriveRoot::Site {
                hostname,
                site_path,
                folder: cfg.path,
            };
            let filter = filter_of(
                &cfg.include_patterns,
                &cfg.exclude_patterns,
                &cfg.include_extensions,
                &cfg.exclude_extensions,
            );
            Ok(Arc::new(GraphSourceAdapter::new(
                Arc::new(TokenProvider::new(credentials)),
                drive_root,
                filter,
                cfg.recursive,
            )))
        }
        "onedrive" => {
            let cfg: OneDriveSourceConfig = serde_json::from_value(config.clone())
                .context("invalid onedrive source_config")?;
            let credentials = cfg.credentials.into_credentials()?;
            let drive_root = DriveRoot::OneDrive {
                user_id: cfg.user_id,
                folder: cfg.root_folder,
            };
            let filter = filter_of(
                &cfg.include_patterns,
                &cfg.exclude_patterns,
                &cfg.include_extensions,
                &cfg.exclude_extensions,
            );
            Ok(Arc::new(GraphSourceAdapter::new(
                Arc::new(TokenProvider::new(credentials)),
                drive_root,
                filter,
                cfg.recursive,
            )))
        }
        other => bail!("unknown source_type_tag: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_site_url_splits_host_and_path() {
        let (host, path) = parse_site_url("https://contoso.sharepoint.com/sites/docs").unwrap();
        assert_eq!(host, "contoso.sharepoint.com");
        assert_eq!(path, "/sites/docs");
    }

    #[test]
    fn build_file_system_adapter_from_json() {
        let cfg = serde_json::json!({ "root_path": "/tmp/docs" });
        let adapter = build_source_adapter("file_system", &cfg).unwrap();
        assert!(!adapter.supports_delta());
    }

    #[test]
    fn build_sharepoint_adapter_requires_credentials() {
        let cfg = serde_json::json!({
            "site_url": "https://contoso.sharepoint.com/sites/docs",
            "path": "/Shared Documents"
        });
        let result = build_source_adapter("sharepoint", &cfg);
        assert!(result.is_err());
    }

    #[test]
    fn build_sharepoint_adapter_with_client_credentials() {
        let cfg = serde_json::json!({
            "site_url": "https://contoso.sharepoint.com/sites/docs",
            "path": "/Shared Documents",
            "credentials": {
                "tenant_id": "t",
                "client_id": "c",
                "client_secret": "s"
            }
        });
        let adapter = build_source_adapter("sharepoint", &cfg).unwrap();
        assert!(adapter.supports_delta());
    }

    #[test]
    fn build_unknown_source_type_fails() {
        let cfg = serde_json::json!({});
        assert!(build_source_adapter("ftp", &cfg).is_err());
    }
}
