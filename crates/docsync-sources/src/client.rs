//! Microsoft Graph API client
//!
//! Provides a typed HTTP client for interacting with the Microsoft Graph API.
//! Handles authentication headers, JSON deserialization, and 429 retry/backoff
//! so that SharePoint and OneDrive source adapters share one transport layer.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use docsync_sources::client::GraphClient;
//! use reqwest::Method;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = GraphClient::new("access-token-here");
//! let resp = client.execute_with_retry(Method::GET, "/sites/root", "metadata").await?;
//! # Ok(())
//! # }
//! ```

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use tracing::{debug, info, warn};

use crate::rate_limit::{parse_retry_after, AdaptiveRateLimiter};

/// Base URL for Microsoft Graph API v1.0
pub const GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// Default retry-after duration when header is missing (30 seconds)
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Maximum number of retries for 429 responses when no rate limiter is configured
const DEFAULT_MAX_RETRIES: u32 = 5;

/// HTTP client for Microsoft Graph API calls
///
/// Wraps `reqwest::Client` with authentication headers and base URL
/// construction for the Microsoft Graph API.
///
/// Optionally integrates with an [`AdaptiveRateLimiter`] for proactive
/// rate limiting and automatic 429 retry handling.
pub struct GraphClient {
    client: Client,
    base_url: String,
    access_token: String,
    rate_limiter: Option<Arc<AdaptiveRateLimiter>>,
}

impl GraphClient {
    /// Creates a new GraphClient with the given access token.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: GRAPH_BASE_URL.to_string(),
            access_token: access_token.into(),
            rate_limiter: None,
        }
    }

    /// Creates a new GraphClient with a custom base URL (useful for testing).
    pub fn with_base_url(access_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            access_token: access_token.into(),
            rate_limiter: None,
        }
    }

    /// Attaches an adaptive rate limiter (builder style).
    pub fn with_rate_limiter(mut self, limiter: Arc<AdaptiveRateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Attaches a rate limiter to an existing client.
    pub fn set_rate_limiter(&mut self, limiter: Arc<AdaptiveRateLimiter>) {
        self.rate_limiter = Some(limiter);
        debug!("Rate limiter attached to GraphClient");
    }

    /// Returns a reference to the rate limiter, if configured.
    pub fn rate_limiter(&self) -> Option<&Arc<AdaptiveRateLimiter>> {
        self.rate_limiter.as_ref()
    }

    /// Updates the access token (e.g., after a refresh grant).
    pub fn set_access_token(&mut self, token: impl Into<String>) {
        self.access_token = token.into();
        debug!("Updated GraphClient access token");
    }

    /// Returns a reference to the current access token.
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Creates an authenticated request builder for the given method and path.
    ///
    /// `path` may be relative to the base URL or an absolute URL (e.g. a
    /// `@odata.nextLink` from a previous response).
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        };
        self.client
            .request(method, &url)
            .bearer_auth(&self.access_token)
    }

    /// Issues a `GET` to `path` and deserializes the JSON body.
    pub async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .execute_with_retry(Method::GET, path, "metadata")
            .await?
            .error_for_status()
            .with_context(|| format!("GET {path} returned error status"))?;
        response
            .json()
            .await
            .with_context(|| format!("failed to parse JSON response from {path}"))
    }

    /// Downloads the raw bytes at `path` (typically `.../content`).
    pub async fn download_bytes(&self, path: &str) -> Result<Vec<u8>> {
        debug!(path, "downloading file content");
        let response = self
            .execute_with_retry(Method::GET, path, "download")
            .await?
            .error_for_status()
            .with_context(|| format!("download of {path} returned error status"))?;
        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("failed to read download body for {path}"))?;
        debug!(path, bytes = bytes.len(), "download complete");
        Ok(bytes.to_vec())
    }

    /// Executes an HTTP request with automatic 429 retry and rate limiting.
    ///
    /// 1. Acquires a token from the rate limiter (if configured) before sending.
    /// 2. On HTTP 429, parses `Retry-After`, notifies the limiter, sleeps, retries.
    /// 3. On success, notifies the limiter to support adaptive recovery.
    pub async fn execute_with_retry(
        &self,
        method: Method,
        path: &str,
        endpoint_category: &str,
    ) -> Result<Response> {
        let max_retries = self
            .rate_limiter
            .as_ref()
            .map(|rl| rl.max_retries())
            .unwrap_or(DEFAULT_MAX_RETRIES);

        for attempt in 0..=max_retries {
            if let Some(ref limiter) = self.rate_limiter {
                let _guard = limiter.acquire(endpoint_category).await;
            }

            let response = self
                .request(method.clone(), path)
                .send()
                .await
                .context("failed to send request")?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                if attempt >= max_retries {
                    warn!(path, attempts = attempt + 1, "429 retry limit exhausted");
                    return Err(anyhow::anyhow!(
                        "too many requests: retry limit exhausted after {} attempts for {}",
                        attempt + 1,
                        path
                    ));
                }

                let retry_after = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .map(|v| parse_retry_after(v, DEFAULT_RETRY_AFTER))
                    .unwrap_or(DEFAULT_RETRY_AFTER);

                if let Some(ref limiter) = self.rate_limiter {
                    limiter.on_throttle(endpoint_category);
                }

                info!(
                    path,
                    attempt,
                    retry_after_ms = retry_after.as_millis(),
                    "received 429, backing off"
                );

                tokio::time::sleep(retry_after).await;
                continue;
            }

            if let Some(ref limiter) = self.rate_limiter {
                limiter.on_success(endpoint_category);
            }

            if attempt > 0 {
                info!(path, attempt, "request succeeded after retry");
            }

            return Ok(response);
        }

        Err(anyhow::anyhow!(
            "request failed: retry loop exited unexpectedly for {}",
            path
        ))
    }

    /// Returns the base URL for API requests.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_client_creation() {
        let client = GraphClient::new("test-token");
        assert_eq!(client.access_token(), "test-token");
        assert!(client.rate_limiter().is_none());
    }

    #[test]
    fn set_access_token() {
        let mut client = GraphClient::new("old-token");
        client.set_access_token("new-token");
        assert_eq!(client.access_token(), "new-token");
    }

    #[test]
    fn request_builder_prepends_base_url() {
        let client = GraphClient::new("test-token");
        let request = client.request(Method::GET, "/sites/root").build().unwrap();
        assert_eq!(
            request.url().as_str(),
            "https://graph.microsoft.com/v1.0/sites/root"
        );
        let auth_header = request
            .headers()
            .get("authorization")
            .unwrap()
            .to_str()
            .unwrap();
        assert_eq!(auth_header, "Bearer test-token");
    }

    #[test]
    fn request_builder_passes_through_absolute_urls() {
        let client = GraphClient::new("test-token");
        let request = client
            .request(Method::GET, "https://graph.microsoft.com/v1.0/next-page?x=1")
            .build()
            .unwrap();
        assert_eq!(
            request.url().as_str(),
            "https://graph.microsoft.com/v1.0/next-page?x=1"
        );
    }

    #[test]
    fn custom_base_url() {
        let client = GraphClient::with_base_url("token", "http://localhost:8080");
        let request = client.request(Method::GET, "/sites/root").build().unwrap();
        assert_eq!(request.url().as_str(), "http://localhost:8080/sites/root");
    }

    #[test]
    fn with_rate_limiter_preserves_token() {
        let limiter = Arc::new(AdaptiveRateLimiter::with_defaults());
        let client = GraphClient::new("my-token").with_rate_limiter(limiter);
        assert_eq!(client.access_token(), "my-token");
        assert!(client.rate_limiter().is_some());
    }

    #[test]
    fn set_rate_limiter_on_existing_client() {
        let mut client = GraphClient::new("token");
        assert!(client.rate_limiter().is_none());
        client.set_rate_limiter(Arc::new(AdaptiveRateLimiter::with_defaults()));
        assert!(client.rate_limiter().is_some());
    }
}
