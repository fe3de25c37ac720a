//! Error types for the Keycloak admin client.

use thiserror::Error;

/// Result type alias using `KeycloakError`.
pub type KeycloakResult<T> = Result<T, KeycloakError>;

/// Errors that can occur when talking to the Keycloak admin API.
#[derive(Debug, Error)]
pub enum KeycloakError {
    /// Configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Token acquisition failed or the admin API rejected our token.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Resource not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Keycloak admin API error.
    #[error("Keycloak API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Error body returned by Keycloak's admin endpoints.
///
/// Keycloak is inconsistent here: some endpoints use `errorMessage`, others
/// the OAuth-style `error` / `error_description` pair.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct KeycloakErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, rename = "errorMessage")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl KeycloakErrorBody {
    /// Picks the most descriptive message present.
    pub(crate) fn message(self) -> Option<String> {
        self.error_message
            .or(self.error_description)
            .or(self.error)
    }
}
