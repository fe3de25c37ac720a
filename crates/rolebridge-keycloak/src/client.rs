//! Keycloak admin REST client (reqwest-based).
//!
//! Covers the group, membership and federated-identity endpoints needed to
//! mirror chat-platform roles into realm groups.

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::auth::TokenCache;
use crate::error::KeycloakErrorBody;
use crate::models::{
    FederatedIdentityRepresentation, GroupRepresentation, PageRequest, UserRepresentation,
};
use crate::{KeycloakConfig, KeycloakError, KeycloakResult};

/// Client for one realm of the Keycloak admin API.
///
/// Cheap to clone; clones share the HTTP connection pool and cached token.
#[derive(Debug, Clone)]
pub struct KeycloakAdminClient {
    base_url: String,
    http_client: Client,
    tokens: TokenCache,
}

impl KeycloakAdminClient {
    /// Creates a client from validated settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are invalid or the HTTP client cannot be built.
    pub fn new(config: KeycloakConfig) -> KeycloakResult<Self> {
        config.validate()?;

        let http_client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent("rolebridge/1.0")
            .build()
            .map_err(|e| KeycloakError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self::with_http_client(config, http_client))
    }

    /// Creates a client with a pre-built `reqwest::Client` (for testing).
    #[must_use]
    pub fn with_http_client(config: KeycloakConfig, http_client: Client) -> Self {
        Self {
            base_url: config.admin_base_url(),
            tokens: TokenCache::new(config, http_client.clone()),
            http_client,
        }
    }

    /// Admin API base URL for the realm.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetches the admin token once, to fail fast on bad credentials.
    ///
    /// # Errors
    ///
    /// Returns `KeycloakError::Auth` if the token endpoint rejects the credentials.
    pub async fn test_connection(&self) -> KeycloakResult<()> {
        self.tokens.get_token().await.map(|_| ())
    }

    // ── Groups ────────────────────────────────────────────────────────

    /// Lists one page of top-level groups with their attributes.
    #[instrument(skip(self))]
    pub async fn list_groups(&self, page: PageRequest) -> KeycloakResult<Vec<GroupRepresentation>> {
        let url = format!("{}/groups", self.base_url);
        let [first, max] = page.query();
        self.get(
            &url,
            &[("briefRepresentation", "false".to_string()), first, max],
        )
        .await
    }

    /// Searches groups whose attribute `key` equals `value` exactly.
    #[instrument(skip(self))]
    pub async fn search_groups_by_attribute(
        &self,
        key: &str,
        value: &str,
    ) -> KeycloakResult<Vec<GroupRepresentation>> {
        let url = format!("{}/groups", self.base_url);
        self.get(
            &url,
            &[
                ("q", format!("{key}:{value}")),
                ("exact", "true".to_string()),
                ("briefRepresentation", "false".to_string()),
            ],
        )
        .await
    }

    /// Lists one page of a group's direct members.
    #[instrument(skip(self))]
    pub async fn group_members(
        &self,
        group_id: &str,
        page: PageRequest,
    ) -> KeycloakResult<Vec<UserRepresentation>> {
        let url = format!(
            "{}/groups/{}/members",
            self.base_url,
            urlencoding::encode(group_id)
        );
        self.get(&url, &page.query()).await
    }

    /// Adds a user to a group.
    #[instrument(skip(self))]
    pub async fn add_user_to_group(&self, user_id: &str, group_id: &str) -> KeycloakResult<()> {
        let url = self.membership_url(user_id, group_id);
        debug!("Keycloak PUT {}", url);
        let token = self.tokens.get_token().await?;
        let response = self.http_client.put(&url).bearer_auth(token).send().await?;
        self.handle_empty_response(response).await
    }

    /// Removes a user from a group.
    #[instrument(skip(self))]
    pub async fn remove_user_from_group(
        &self,
        user_id: &str,
        group_id: &str,
    ) -> KeycloakResult<()> {
        let url = self.membership_url(user_id, group_id);
        debug!("Keycloak DELETE {}", url);
        let token = self.tokens.get_token().await?;
        let response = self
            .http_client
            .delete(&url)
            .bearer_auth(token)
            .send()
            .await?;
        self.handle_empty_response(response).await
    }

    // ── Users ─────────────────────────────────────────────────────────

    /// Finds the users linked to an external account at identity provider `alias`.
    #[instrument(skip(self))]
    pub async fn find_users_by_federated_identity(
        &self,
        alias: &str,
        idp_user_id: &str,
    ) -> KeycloakResult<Vec<UserRepresentation>> {
        let url = format!("{}/users", self.base_url);
        self.get(
            &url,
            &[
                ("idpAlias", alias.to_string()),
                ("idpUserId", idp_user_id.to_string()),
            ],
        )
        .await
    }

    /// Lists the identity-provider links on a user's profile.
    #[instrument(skip(self))]
    pub async fn federated_identities(
        &self,
        user_id: &str,
    ) -> KeycloakResult<Vec<FederatedIdentityRepresentation>> {
        let url = format!(
            "{}/users/{}/federated-identity",
            self.base_url,
            urlencoding::encode(user_id)
        );
        self.get(&url, &[]).await
    }

    // ── Internal HTTP Methods ─────────────────────────────────────────

    fn membership_url(&self, user_id: &str, group_id: &str) -> String {
        format!(
            "{}/users/{}/groups/{}",
            self.base_url,
            urlencoding::encode(user_id),
            urlencoding::encode(group_id)
        )
    }

    async fn get<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> KeycloakResult<T> {
        debug!("Keycloak GET {} {:?}", url, query);
        let token = self.tokens.get_token().await?;
        let mut builder = self.http_client.get(url).bearer_auth(token);
        if !query.is_empty() {
            builder = builder.query(query);
        }
        let response = builder.send().await?;

        let status = response.status();
        if status.is_success() {
            let body = response.text().await?;
            return serde_json::from_str(&body).map_err(KeycloakError::from);
        }
        self.handle_error_response(response).await
    }

    async fn handle_empty_response(&self, response: reqwest::Response) -> KeycloakResult<()> {
        let status = response.status();
        if status == StatusCode::NO_CONTENT || status.is_success() {
            Ok(())
        } else {
            self.handle_error_response(response).await
        }
    }

    async fn handle_error_response<T>(&self, response: reqwest::Response) -> KeycloakResult<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        let detail = serde_json::from_str::<KeycloakErrorBody>(&body)
            .ok()
            .and_then(KeycloakErrorBody::message)
            .unwrap_or(body);

        match status {
            StatusCode::NOT_FOUND => Err(KeycloakError::NotFound(detail)),
            StatusCode::UNAUTHORIZED => {
                // Token may have been revoked or the session ended early.
                self.tokens.invalidate().await;
                warn!("Keycloak rejected admin token, cache invalidated");
                Err(KeycloakError::Auth(format!(
                    "Authentication failed (401): {detail}"
                )))
            }
            StatusCode::FORBIDDEN => Err(KeycloakError::Auth(format!(
                "Admin account lacks permission (403): {detail}"
            ))),
            _ => Err(KeycloakError::Api {
                status: status.as_u16(),
                message: if detail.is_empty() {
                    format!("HTTP {status}")
                } else {
                    detail
                },
            }),
        }
    }
}
