//! Admin token acquisition via the resource-owner password grant.

use chrono::{DateTime, Duration, Utc};
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::error::KeycloakErrorBody;
use crate::{KeycloakConfig, KeycloakError, KeycloakResult};

/// Token response from the Keycloak token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Cached admin access token.
#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// Returns true if the token is expired or will expire within the grace period.
    fn is_expired(&self, grace_period: Duration) -> bool {
        Utc::now() + grace_period >= self.expires_at
    }
}

/// Token cache for the admin account.
///
/// Clones share the cached token.
#[derive(Debug, Clone)]
pub(crate) struct TokenCache {
    config: KeycloakConfig,
    http_client: reqwest::Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
    /// Refresh this long before the token actually expires.
    grace_period: Duration,
}

impl TokenCache {
    /// Creates a new token cache.
    pub(crate) fn new(config: KeycloakConfig, http_client: reqwest::Client) -> Self {
        Self {
            config,
            http_client,
            cached_token: Arc::new(RwLock::new(None)),
            grace_period: Duration::seconds(30),
        }
    }

    /// Gets a valid access token, acquiring a new one if necessary.
    #[instrument(skip(self), fields(admin_realm = %self.config.admin_realm))]
    pub(crate) async fn get_token(&self) -> KeycloakResult<String> {
        {
            let cache = self.cached_token.read().await;
            if let Some(ref token) = *cache {
                if !token.is_expired(self.grace_period) {
                    return Ok(token.access_token.clone());
                }
            }
        }

        debug!("Acquiring admin access token");
        let new_token = self.acquire_token().await?;

        {
            let mut cache = self.cached_token.write().await;
            *cache = Some(new_token.clone());
        }

        Ok(new_token.access_token)
    }

    async fn acquire_token(&self) -> KeycloakResult<CachedToken> {
        let params = [
            ("grant_type", "password"),
            ("client_id", self.config.client_id.as_str()),
            ("username", self.config.username.as_str()),
            ("password", self.config.password.expose_secret()),
        ];

        let response = self
            .http_client
            .post(self.config.token_url())
            .form(&params)
            .send()
            .await
            .map_err(|e| KeycloakError::Auth(format!("Token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<KeycloakErrorBody>(&body)
                .ok()
                .and_then(KeycloakErrorBody::message)
                .unwrap_or(body);
            return Err(KeycloakError::Auth(format!(
                "Token request failed with status {status}: {detail}"
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| KeycloakError::Auth(format!("Failed to parse token response: {e}")))?;

        let expires_at = Duration::try_seconds(token_response.expires_in)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                KeycloakError::Auth(format!(
                    "Token response has an out-of-range expires_in: {}",
                    token_response.expires_in
                ))
            })?;

        debug!(
            "Acquired admin token, expires at {}",
            expires_at.format("%Y-%m-%d %H:%M:%S UTC")
        );

        Ok(CachedToken {
            access_token: token_response.access_token,
            expires_at,
        })
    }

    /// Drops the cached token so the next call re-authenticates.
    pub(crate) async fn invalidate(&self) {
        let mut cache = self.cached_token.write().await;
        *cache = None;
    }
}
