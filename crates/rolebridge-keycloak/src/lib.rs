//! Keycloak admin API client for rolebridge
//!
//! A small, typed client over the parts of the Keycloak admin REST API that
//! group/role synchronization needs: group listing and attribute search,
//! group membership, and federated-identity lookups.
//!
//! # Example
//!
//! ```no_run
//! use rolebridge_keycloak::{KeycloakAdminClient, KeycloakConfig, PageRequest};
//! use secrecy::SecretString;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = KeycloakConfig::new(
//!     "https://sso.example.com",
//!     "admin",
//!     SecretString::from("password".to_string()),
//!     "community",
//!     "master",
//! );
//!
//! let client = KeycloakAdminClient::new(config)?;
//! let groups = client.list_groups(PageRequest::new(0, 100)).await?;
//! # Ok(())
//! # }
//! ```

mod auth;
mod client;
mod config;
mod error;
mod models;

// Re-exports
pub use client::KeycloakAdminClient;
pub use config::{KeycloakConfig, DEFAULT_CLIENT_ID, DEFAULT_REQUEST_TIMEOUT};
pub use error::{KeycloakError, KeycloakResult};
pub use models::{
    FederatedIdentityRepresentation, GroupRepresentation, PageRequest, UserRepresentation,
};
