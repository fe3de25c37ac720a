//! Common test utilities for rolebridge-keycloak integration tests.

#![allow(dead_code)]

use rolebridge_keycloak::{KeycloakAdminClient, KeycloakConfig};
use secrecy::SecretString;
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const REALM: &str = "community";
pub const ADMIN_REALM: &str = "master";
pub const ACCESS_TOKEN: &str = "mock-admin-token";

/// Test data factory for a group carrying the sync attributes.
pub fn create_linked_group(id: &str, name: &str, guild_id: &str, role_id: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "path": format!("/{name}"),
        "attributes": {
            "discord-guild": [guild_id],
            "discord-role": [role_id]
        },
        "subGroups": []
    })
}

/// Test data factory for a group without sync attributes.
pub fn create_plain_group(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "path": format!("/{name}"),
        "attributes": {},
        "subGroups": []
    })
}

/// Test data factory for a realm user.
pub fn create_test_user(id: &str, username: &str) -> Value {
    json!({
        "id": id,
        "username": username,
        "enabled": true,
        "email": format!("{username}@example.com"),
        "createdTimestamp": 1_700_000_000_000_i64
    })
}

/// Creates a mock token response.
pub fn create_token_response(access_token: &str, expires_in: u64) -> Value {
    json!({
        "access_token": access_token,
        "expires_in": expires_in,
        "refresh_expires_in": 1800,
        "refresh_token": "mock-refresh-token",
        "token_type": "Bearer",
        "scope": "profile email"
    })
}

/// Mock server wrapper with Keycloak-specific setup helpers.
pub struct MockKeycloakServer {
    pub server: MockServer,
}

impl MockKeycloakServer {
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn url(&self) -> String {
        self.server.uri()
    }

    pub fn admin_path(&self, suffix: &str) -> String {
        format!("/admin/realms/{REALM}{suffix}")
    }

    /// Creates a client configured to talk to this mock server.
    pub fn client(&self) -> KeycloakAdminClient {
        let config = KeycloakConfig::new(
            self.url(),
            "admin",
            SecretString::from("admin-password".to_string()),
            REALM,
            ADMIN_REALM,
        );
        KeycloakAdminClient::with_http_client(config, reqwest::Client::new())
    }

    /// Sets up the admin realm token endpoint.
    pub async fn mock_token_endpoint(&self) {
        Mock::given(method("POST"))
            .and(path(format!(
                "/realms/{ADMIN_REALM}/protocol/openid-connect/token"
            )))
            .and(body_string_contains("grant_type=password"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(create_token_response(ACCESS_TOKEN, 300)),
            )
            .mount(&self.server)
            .await;
    }

    /// Sets up the token endpoint with an exact call-count expectation.
    pub async fn mock_token_endpoint_expecting(&self, calls: u64) {
        Mock::given(method("POST"))
            .and(path(format!(
                "/realms/{ADMIN_REALM}/protocol/openid-connect/token"
            )))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(create_token_response(ACCESS_TOKEN, 300)),
            )
            .expect(calls)
            .mount(&self.server)
            .await;
    }
}
