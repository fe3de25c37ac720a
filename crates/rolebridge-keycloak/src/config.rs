//! Connection settings for the Keycloak admin API.

use secrecy::SecretString;
use std::time::Duration;

use crate::{KeycloakError, KeycloakResult};

/// Client id Keycloak ships for admin CLI access.
pub const DEFAULT_CLIENT_ID: &str = "admin-cli";

/// Default timeout for a single admin API request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings for reaching one realm through the admin API.
#[derive(Debug, Clone)]
pub struct KeycloakConfig {
    /// Base URL of the Keycloak server (e.g. `https://sso.example.com`).
    ///
    /// Legacy distributions mounted under `/auth` must include that prefix.
    pub server_url: String,
    /// Admin account username.
    pub username: String,
    /// Admin account password.
    pub password: SecretString,
    /// Realm whose groups and users are synchronized.
    pub realm: String,
    /// Realm the admin account authenticates against (usually `master`).
    pub admin_realm: String,
    /// OAuth client used for the password grant.
    pub client_id: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl KeycloakConfig {
    /// Creates a config with default client id and timeout.
    pub fn new(
        server_url: impl Into<String>,
        username: impl Into<String>,
        password: SecretString,
        realm: impl Into<String>,
        admin_realm: impl Into<String>,
    ) -> Self {
        Self {
            server_url: server_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password,
            realm: realm.into(),
            admin_realm: admin_realm.into(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Overrides the OAuth client id.
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// Overrides the request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns `KeycloakError::Config` when a field is empty or the server URL
    /// has no http(s) scheme.
    pub fn validate(&self) -> KeycloakResult<()> {
        if !(self.server_url.starts_with("http://") || self.server_url.starts_with("https://")) {
            return Err(KeycloakError::Config(format!(
                "server_url must start with http:// or https://, got '{}'",
                self.server_url
            )));
        }
        for (name, value) in [
            ("username", &self.username),
            ("realm", &self.realm),
            ("admin_realm", &self.admin_realm),
            ("client_id", &self.client_id),
        ] {
            if value.trim().is_empty() {
                return Err(KeycloakError::Config(format!("{name} must not be empty")));
            }
        }
        Ok(())
    }

    /// Token endpoint of the admin realm.
    #[must_use]
    pub fn token_url(&self) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect/token",
            self.server_url,
            urlencoding::encode(&self.admin_realm)
        )
    }

    /// Admin API base for the synchronized realm.
    #[must_use]
    pub fn admin_base_url(&self) -> String {
        format!(
            "{}/admin/realms/{}",
            self.server_url,
            urlencoding::encode(&self.realm)
        )
    }
}
