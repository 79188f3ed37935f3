//! Non-interactive OAuth2 authentication for Microsoft Graph
//!
//! SharePoint and OneDrive source definitions authenticate as a service
//! principal (`tenant_id` + `client_id` + `client_secret`, client-credentials
//! grant) or, where the tenant requires a delegated identity, a resource
//! owner password grant (`username` + `password`). Both exchange directly
//! for an access token; there is no browser step and nothing is persisted
//! to an OS keyring, since the engine runs unattended.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, ClientId, ClientSecret, ResourceOwnerPassword, ResourceOwnerUsername, Scope,
    TokenResponse, TokenUrl,
};
use tokio::sync::Mutex;

/// Scope requested for the client-credentials and password grants.
const DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Margin subtracted from a token's reported lifetime before it is
/// considered due for refresh, to absorb clock skew and in-flight requests.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Default assumed lifetime when the token response omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// Credentials for one source definition's Graph authentication.
#[derive(Debug, Clone)]
pub enum GraphCredentials {
    ClientCredentials {
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },
    ResourceOwnerPassword {
        tenant_id: String,
        client_id: String,
        username: String,
        password: String,
    },
}

fn authority_urls(tenant_id: &str) -> Result<(AuthUrl, TokenUrl)> {
    let auth_url = AuthUrl::new(format!(
        "https://login.microsoftonline.com/{tenant_id}/oauth2/v2.0/authorize"
    ))
    .context("invalid tenant_id produced an invalid authorize URL")?;
    let token_url = TokenUrl::new(format!(
        "https://login.microsoftonline.com/{tenant_id}/oauth2/v2.0/token"
    ))
    .context("invalid tenant_id produced an invalid token URL")?;
    Ok((auth_url, token_url))
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// Fetches and caches a Graph access token for one set of credentials.
///
/// Shared across all `list`/`delta_list`/`fetch` calls made by a
/// [`crate::graph::GraphSourceAdapter`]; refreshes automatically once the
/// cached token is within [`EXPIRY_MARGIN`] of expiring.
pub struct TokenProvider {
    credentials: GraphCredentials,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(credentials: GraphCredentials) -> Self {
        Self {
            credentials,
            cached: Mutex::new(None),
        }
    }

    /// Returns a currently-valid access token, fetching or refreshing one if needed.
    pub async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.access_token.clone());
            }
        }

        let (access_token, lifetime) = self.fetch_token().await?;
        *cached = Some(CachedToken {
            access_token: access_token.clone(),
            expires_at: Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN),
        });
        Ok(access_token)
    }

    async fn fetch_token(&self) -> Result<(String, Duration)> {
        match &self.credentials {
            GraphCredentials::ClientCredentials {
                tenant_id,
                client_id,
                client_secret,
            } => {
                let (auth_url, token_url) = authority_urls(tenant_id)?;
                let client = BasicClient::new(ClientId::new(client_id.clone()))
                    .set_client_secret(ClientSecret::new(client_secret.clone()))
                    .set_auth_uri(auth_url)
                    .set_token_uri(token_url);

                let http_client = reqwest::Client::new();
                let token = client
                    .exchange_client_credentials()
                    .add_scope(Scope::new(DEFAULT_SCOPE.to_string()))
                    .request_async(&http_client)
                    .await
                    .context("client-credentials token exchange failed")?;

                let lifetime = token.expires_in().unwrap_or(DEFAULT_TOKEN_LIFETIME);
                Ok((token.access_token().secret().clone(), lifetime))
            }
            GraphCredentials::ResourceOwnerPassword {
                tenant_id,
                client_id,
                username,
                password,
            } => {
                let (auth_url, token_url) = authority_urls(tenant_id)?;
                let client = BasicClient::new(ClientId::new(client_id.clone()))
                    .set_auth_uri(auth_url)
                    .set_token_uri(token_url);

                let http_client = reqwest::Client::new();
                let token = client
                    .exchange_password(
                        &ResourceOwnerUsername::new(username.clone()),
                        &ResourceOwnerPassword::new(password.clone()),
                    )
                    .add_scope(Scope::new(DEFAULT_SCOPE.to_string()))
                    .request_async(&http_client)
                    .await
                    .context("resource-owner-password token exchange failed")?;

                let lifetime = token.expires_in().unwrap_or(DEFAULT_TOKEN_LIFETIME);
                Ok((token.access_token().secret().clone(), lifetime))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authority_urls_embed_tenant_id() {
        let (auth, token) = authority_urls("contoso-tenant").unwrap();
        assert!(auth.as_str().contains("contoso-tenant"));
        assert!(token.as_str().contains("contoso-tenant"));
        assert!(token.as_str().ends_with("/oauth2/v2.0/token"));
    }

    #[tokio::test]
    async fn access_token_cache_is_empty_before_first_fetch() {
        let provider = TokenProvider::new(GraphCredentials::ClientCredentials {
            tenant_id: "t".into(),
            client_id: "c".into(),
            client_secret: "s".into(),
        });
        assert!(provider.cached.lock().await.is_none());
    }
}
