//! RAG adapter backed by Azure Blob Storage, addressed directly over the
//! Blob REST API rather than through a storage SDK.
//!
//! Four authentication methods are supported, matching the `auth_method`
//! values the engine recognizes on a knowledge base's `rag_config`:
//! `service_principal` (OAuth2 client-credentials against Entra ID),
//! `connection_string` (Shared Key HMAC-SHA256 request signing),
//! `managed_identity` and `default_credential` (bearer token from the Azure
//! Instance Metadata Service).

use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use oauth2::basic::BasicClient;
use oauth2::{AuthUrl, ClientId, ClientSecret, Scope, TokenResponse, TokenUrl};
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use sha2::Sha256;
use tokio::sync::Mutex;

use docsync_core::ports::{IRagAdapter, RagArtifact, RagError};

const STORAGE_SCOPE: &str = "https://storage.azure.com/.default";
const IMDS_TOKEN_URL: &str =
    "http://169.254.169.254/metadata/identity/oauth2/token?api-version=2018-02-01&resource=https%3A%2F%2Fstorage.azure.com%2F";
const BLOB_API_VERSION: &str = "2021-08-06";
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

#[derive(Debug, Deserialize)]
#[serde(tag = "auth_method", rename_all = "snake_case")]
enum AuthMethodConfig {
    ServicePrincipal {
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },
    ConnectionString {
        connection_string: String,
    },
    ManagedIdentity {
        client_id: Option<String>,
    },
    DefaultCredential {},
}

#[derive(Debug, Deserialize)]
pub struct AzureBlobRagConfig {
    pub container_name: String,
    pub storage_account_name: String,
    #[serde(flatten)]
    auth: AuthMethodConfig,
}

fn parse_connection_string_key(connection_string: &str) -> Result<String> {
    for part in connection_string.split(';') {
        if let Some(value) = part.strip_prefix("AccountKey=") {
            return Ok(value.to_string());
        }
    }
    bail!("connection_string is missing an AccountKey= component")
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

enum AuthMode {
    ServicePrincipal {
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },
    SharedKey {
        account_key: Vec<u8>,
    },
    Imds {
        client_id: Option<String>,
    },
}

fn auth_mode_from_config(cfg: AuthMethodConfig) -> Result<AuthMode> {
    Ok(match cfg {
        AuthMethodConfig::ServicePrincipal {
            tenant_id,
            client_id,
            client_secret,
        } => AuthMode::ServicePrincipal {
            tenant_id,
            client_id,
            client_secret,
        },
        AuthMethodConfig::ConnectionString { connection_string } => AuthMode::SharedKey {
            account_key: BASE64
                .decode(parse_connection_string_key(&connection_string)?)
                .context("AccountKey in connection_string is not valid base64")?,
        },
        AuthMethodConfig::ManagedIdentity { client_id } => AuthMode::Imds { client_id },
        AuthMethodConfig::DefaultCredential {} => AuthMode::Imds { client_id: None },
    })
}

/// Either a bearer token (OAuth2 / IMDS) or a Shared Key signer for the
/// account, computed once and cached across requests.
struct TokenCache {
    mode: AuthMode,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    fn new(mode: AuthMode) -> Self {
        Self {
            mode,
            cached: Mutex::new(None),
        }
    }

    async fn bearer_token(&self, http: &Client) -> Result<Option<String>> {
        match &self.mode {
            AuthMode::SharedKey { .. } => Ok(None),
            AuthMode::ServicePrincipal { .. } | AuthMode::Imds { .. } => {
                let mut cached = self.cached.lock().await;
                if let Some(token) = cached.as_ref() {
                    if token.expires_at > Instant::now() {
                        return Ok(Some(token.access_token.clone()));
                    }
                }
                let (access_token, lifetime) = self.fetch_bearer_token(http).await?;
                *cached = Some(CachedToken {
                    access_token: access_token.clone(),
                    expires_at: Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN),
                });
                Ok(Some(access_token))
            }
        }
    }

    async fn fetch_bearer_token(&self, http: &Client) -> Result<(String, Duration)> {
        match &self.mode {
            AuthMode::ServicePrincipal {
                tenant_id,
                client_id,
                client_secret,
            } => {
                let auth_url = AuthUrl::new(format!(
                    "https://login.microsoftonline.com/{tenant_id}/oauth2/v2.0/authorize"
                ))?;
                let token_url = TokenUrl::new(format!(
                    "https://login.microsoftonline.com/{tenant_id}/oauth2/v2.0/token"
                ))?;
                let client = BasicClient::new(ClientId::new(client_id.clone()))
                    .set_client_secret(ClientSecret::new(client_secret.clone()))
                    .set_auth_uri(auth_url)
                    .set_token_uri(token_url);
                let token = client
                    .exchange_client_credentials()
                    .add_scope(Scope::new(STORAGE_SCOPE.to_string()))
                    .request_async(http)
                    .await
                    .context("service-principal token exchange failed")?;
                let lifetime = token.expires_in().unwrap_or(DEFAULT_TOKEN_LIFETIME);
                Ok((token.access_token().secret().clone(), lifetime))
            }
            AuthMode::Imds { client_id } => {
                let mut url = IMDS_TOKEN_URL.to_string();
                if let Some(client_id) = client_id {
                    url.push_str(&format!("&client_id={client_id}"));
                }
                let response = http
                    .get(&url)
                    .header("Metadata", "true")
                    .send()
                    .await
                    .context("IMDS token request failed")?
                    .error_for_status()
                    .context("IMDS returned an error status")?;
                let body: ImdsTokenResponse = response
                    .json()
                    .await
                    .context("IMDS response was not valid JSON")?;
                let lifetime = body
                    .expires_in
                    .and_then(|s| s.parse::<u64>().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_TOKEN_LIFETIME);
                Ok((body.access_token, lifetime))
            }
            AuthMode::SharedKey { .. } => unreachable!("shared key never fetches a bearer token"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ImdsTokenResponse {
    access_token: String,
    expires_in: Option<String>,
}

type HmacSha256 = Hmac<Sha256>;

fn shared_key_signature(
    account_key: &[u8],
    method: &Method,
    content_length: usize,
    x_ms_headers: &[(&str, String)],
    canonicalized_resource: &str,
) -> Result<String> {
    let mut headers: Vec<_> = x_ms_headers.to_vec();
    headers.sort_by(|a, b| a.0.cmp(b.0));
    let canonicalized_headers = headers
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect::<String>();

    let content_length_field = if content_length == 0 {
        String::new()
    } else {
        content_length.to_string()
    };

    let string_to_sign = format!(
        "{method}\n\n\n{content_length}\n\n\n\n\n\n\n\n\n{headers}{resource}",
        method = method.as_str(),
        content_length = content_length_field,
        headers = canonicalized_headers,
        resource = canonicalized_resource,
    );

    let mut mac = HmacSha256::new_from_slice(account_key).context("invalid account key")?;
    mac.update(string_to_sign.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

fn canonicalized_resource(account: &str, container: &str, blob: &str, query: &[(&str, &str)]) -> String {
    let mut resource = format!("/{account}/{container}");
    if !blob.is_empty() {
        resource.push('/');
        resource.push_str(blob);
    }
    let mut sorted_query = query.to_vec();
    sorted_query.sort_by(|a, b| a.0.cmp(b.0));
    for (key, value) in sorted_query {
        resource.push('\n');
        resource.push_str(key);
        resource.push(':');
        resource.push_str(value);
    }
    resource
}

fn rfc1123_now() -> String {
    chrono::Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Direct Azure Blob Storage REST client: no SDK, no XML crate — list
/// responses are parsed with a small hand-rolled scanner since the API
/// only needs blob name, size and (optionally) a metadata sidecar.
pub struct AzureBlobRagAdapter {
    http: Client,
    account: String,
    container: String,
    auth: TokenCache,
}

impl AzureBlobRagAdapter {
    pub fn new(config: AzureBlobRagConfig) -> Result<Self> {
        let auth = auth_mode_from_config(config.auth)?;
        Ok(Self {
            http: Client::new(),
            account: config.storage_account_name,
            container: config.container_name,
            auth: TokenCache::new(auth),
        })
    }

    fn blob_url(&self, blob_name: &str) -> String {
        if blob_name.is_empty() {
            format!("https://{}.blob.core.windows.net/{}", self.account, self.container)
        } else {
            format!(
                "https://{}.blob.core.windows.net/{}/{}",
                self.account, self.container, blob_name
            )
        }
    }

    fn metadata_blob_name(blob_name: &str) -> String {
        format!("{blob_name}.meta.json")
    }

    fn blob_name_from_uri<'a>(&self, rag_uri: &'a str) -> Result<&'a str, RagError> {
        let prefix = format!(
            "https://{}.blob.core.windows.net/{}/",
            self.account, self.container
        );
        rag_uri
            .strip_prefix(&prefix)
            .ok_or_else(|| RagError::AdapterUnavailable(format!("not a blob uri: {rag_uri}")))
    }

    async fn authed_request(
        &self,
        method: Method,
        blob_name: &str,
        extra_query: &[(&str, &str)],
        content_length: usize,
        extra_x_ms: &[(&str, String)],
    ) -> Result<reqwest::RequestBuilder, RagError> {
        let date = rfc1123_now();
        let mut x_ms_headers = vec![
            ("x-ms-date".to_string(), date.clone()),
            ("x-ms-version".to_string(), BLOB_API_VERSION.to_string()),
        ];
        x_ms_headers.extend(extra_x_ms.iter().cloned());
        let x_ms_header_refs: Vec<(&str, String)> = x_ms_headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.clone()))
            .collect();

        let mut url = self.blob_url(blob_name);
        if !extra_query.is_empty() {
            let qs = extra_query
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("&");
            url = format!("{url}?{qs}");
        }

        let mut builder = self
            .http
            .request(method.clone(), &url)
            .header("x-ms-date", &date)
            .header("x-ms-version", BLOB_API_VERSION);
        for (name, value) in extra_x_ms {
            builder = builder.header(name, value);
        }

        if let Some(bearer) = self
            .auth
            .bearer_token(&self.http)
            .await
            .map_err(|e| RagError::AdapterUnavailable(e.to_string()))?
        {
            builder = builder.bearer_auth(bearer);
        } else if let AuthMode::SharedKey { account_key } = &self.auth.mode {
            let resource = canonicalized_resource(&self.account, &self.container, blob_name, extra_query);
            let signature =
                shared_key_signature(account_key, &method, content_length, &x_ms_header_refs, &resource)
                    .map_err(|e| RagError::AdapterUnavailable(e.to_string()))?;
            builder = builder.header(
                "Authorization",
                format!("SharedKey {}:{}", self.account, signature),
            );
        }

        Ok(builder)
    }

    async fn put_blob(&self, blob_name: &str, content: &[u8]) -> Result<(), RagError> {
        let request = self
            .authed_request(
                Method::PUT,
                blob_name,
                &[],
                content.len(),
                &[("x-ms-blob-type".to_string(), "BlockBlob".to_string())],
            )
            .await?
            .body(content.to_vec());
        let response = request
            .send()
            .await
            .map_err(|e| RagError::TransientError(e.to_string()))?;
        if !response.status().is_success() {
            return Err(RagError::AdapterUnavailable(format!(
                "PUT {blob_name} failed with status {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn delete_blob(&self, blob_name: &str) -> Result<(), RagError> {
        let request = self.authed_request(Method::DELETE, blob_name, &[], 0, &[]).await?;
        let response = request
            .send()
            .await
            .map_err(|e| RagError::TransientError(e.to_string()))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND || response.status().is_success() {
            return Ok(());
        }
        Err(RagError::AdapterUnavailable(format!(
            "DELETE {blob_name} failed with status {}",
            response.status()
        )))
    }

    async fn get_blob(&self, blob_name: &str) -> Result<Option<Vec<u8>>, RagError> {
        let request = self.authed_request(Method::GET, blob_name, &[], 0, &[]).await?;
        let response = request
            .send()
            .await
            .map_err(|e| RagError::TransientError(e.to_string()))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(RagError::AdapterUnavailable(format!(
                "GET {blob_name} failed with status {}",
                response.status()
            )));
        }
        Ok(Some(
            response
                .bytes()
                .await
                .map_err(|e| RagError::TransientError(e.to_string()))?
                .to_vec(),
        ))
    }

    async fn head_blob(&self, blob_name: &str) -> Result<Option<u64>, RagError> {
        let request = self.authed_request(Method::HEAD, blob_name, &[], 0, &[]).await?;
        let response = request
            .send()
            .await
            .map_err(|e| RagError::TransientError(e.to_string()))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(RagError::AdapterUnavailable(format!(
                "HEAD {blob_name} failed with status {}",
                response.status()
            )));
        }
        Ok(response
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok()))
    }

    async fn upload_metadata_sidecar(&self, blob_name: &str, metadata: &JsonValue) -> Result<(), RagError> {
        let encoded = serde_json::to_vec(metadata)
            .map_err(|e| RagError::AdapterUnavailable(format!("metadata encode failed: {e}")))?;
        self.put_blob(&Self::metadata_blob_name(blob_name), &encoded).await
    }

    async fn fetch_metadata_sidecar(&self, blob_name: &str) -> Option<JsonValue> {
        let bytes = self
            .get_blob(&Self::metadata_blob_name(blob_name))
            .await
            .ok()??;
        serde_json::from_slice(&bytes).ok()
    }

    /// Extracts `(name, content-length)` pairs from an Azure list-blobs XML
    /// response. Deliberately not a general XML parser: just enough
    /// structure-awareness to walk `<Blob>...</Blob>` entries.
    fn parse_list_blobs_xml(body: &str) -> Vec<(String, u64)> {
        let mut out = Vec::new();
        for blob_xml in body.split("<Blob>").skip(1) {
            let blob_xml = blob_xml.split("</Blob>").next().unwrap_or_default();
            let name = extract_tag(blob_xml, "Name");
            let size = extract_tag(blob_xml, "Content-Length")
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(0);
            if let Some(name) = name {
                if !name.ends_with(".meta.json") {
                    out.push((name, size));
                }
            }
        }
        out
    }
}

fn extract_tag(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)? + start;
    Some(xml[start..end].to_string())
}

#[async_trait]
impl IRagAdapter for AzureBlobRagAdapter {
    async fn upload(
        &self,
        content: &[u8],
        filename: &str,
        metadata: Option<&JsonValue>,
    ) -> Result<String, RagError> {
        self.put_blob(filename, content).await?;
        if let Some(metadata) = metadata {
            self.upload_metadata_sidecar(filename, metadata).await?;
        }
        Ok(self.blob_url(filename))
    }

    async fn update(
        &self,
        rag_uri: &str,
        content: &[u8],
        metadata: Option<&JsonValue>,
    ) -> Result<(), RagError> {
        let blob_name = self.blob_name_from_uri(rag_uri)?.to_string();
        if self.head_blob(&blob_name).await?.is_none() {
            return Err(RagError::Conflict(format!("update on missing artifact: {rag_uri}")));
        }
        self.put_blob(&blob_name, content).await?;
        if let Some(metadata) = metadata {
            self.upload_metadata_sidecar(&blob_name, metadata).await?;
        }
        Ok(())
    }

    async fn delete(&self, rag_uri: &str) -> Result<(), RagError> {
        let blob_name = self.blob_name_from_uri(rag_uri)?.to_string();
        self.delete_blob(&blob_name).await?;
        self.delete_blob(&Self::metadata_blob_name(&blob_name)).await?;
        Ok(())
    }

    async fn list(&self, prefix: Option<&str>) -> Result<Vec<RagArtifact>, RagError> {
        let blob_prefix = prefix
            .and_then(|p| self.blob_name_from_uri(p).ok())
            .unwrap_or("");
        let mut query = vec![("restype", "container"), ("comp", "list")];
        if !blob_prefix.is_empty() {
            query.push(("prefix", blob_prefix));
        }
        let request = self.authed_request(Method::GET, "", &query, 0, &[]).await?;
        let response = request
            .send()
            .await
            .map_err(|e| RagError::TransientError(e.to_string()))?;
        if !response.status().is_success() {
            return Err(RagError::AdapterUnavailable(format!(
                "list blobs failed with status {}",
                response.status()
            )));
        }
        let body = response
            .text()
            .await
            .map_err(|e| RagError::TransientError(e.to_string()))?;

        let mut out = Vec::new();
        for (name, size) in Self::parse_list_blobs_xml(&body) {
            let metadata = self.fetch_metadata_sidecar(&name).await;
            out.push(RagArtifact {
                rag_uri: self.blob_url(&name),
                size,
                metadata,
            });
        }
        Ok(out)
    }

    async fn get(&self, rag_uri: &str) -> Result<Option<RagArtifact>, RagError> {
        let blob_name = self.blob_name_from_uri(rag_uri)?.to_string();
        let Some(size) = self.head_blob(&blob_name).await? else {
            return Ok(None);
        };
        let metadata = self.fetch_metadata_sidecar(&blob_name).await;
        Ok(Some(RagArtifact {
            rag_uri: rag_uri.to_string(),
            size,
            metadata,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_connection_string_extracts_account_key() {
        let conn = "DefaultEndpointsProtocol=https;AccountName=acct;AccountKey=c2VjcmV0;EndpointSuffix=core.windows.net";
        assert_eq!(parse_connection_string_key(conn).unwrap(), "c2VjcmV0");
    }

    #[test]
    fn parse_connection_string_missing_key_errors() {
        let conn = "DefaultEndpointsProtocol=https;AccountName=acct";
        assert!(parse_connection_string_key(conn).is_err());
    }

    #[test]
    fn canonicalized_resource_includes_sorted_query() {
        let resource = canonicalized_resource("acct", "container", "", &[("comp", "list"), ("restype", "container")]);
        assert_eq!(resource, "/acct/container\ncomp:list\nrestype:container");
    }

    #[test]
    fn parse_list_blobs_xml_extracts_names_and_sizes() {
        let body = r#"<?xml version="1.0"?><EnumerationResults><Blobs>
            <Blob><Name>a.txt</Name><Properties><Content-Length>5</Content-Length></Properties></Blob>
            <Blob><Name>a.txt.meta.json</Name><Properties><Content-Length>12</Content-Length></Properties></Blob>
        </Blobs></EnumerationResults>"#;
        let blobs = AzureBlobRagAdapter::parse_list_blobs_xml(body);
        assert_eq!(blobs, vec![("a.txt".to_string(), 5)]);
    }

    #[test]
    fn shared_key_signature_is_deterministic() {
        let key = BASE64.decode("c2VjcmV0a2V5MTIzNDU2Nzg5MA==").unwrap();
        let headers = [
            ("x-ms-date", "Tue, 01 Jan 2030 00:00:00 GMT".to_string()),
            ("x-ms-version", "2021-08-06".to_string()),
        ];
        let resource = canonicalized_resource("acct", "container", "blob.txt", &[]);
        let sig1 = shared_key_signature(&key, &Method::PUT, 5, &headers, &resource).unwrap();
        let sig2 = shared_key_signature(&key, &Method::PUT, 5, &headers, &resource).unwrap();
        assert_eq!(sig1, sig2);
    }
}
