//! Typed subsets of Keycloak's admin representations.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A Keycloak group (`GroupRepresentation`).
///
/// Attributes are only returned when the listing asks for
/// `briefRepresentation=false`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRepresentation {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub attributes: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub sub_groups: Vec<GroupRepresentation>,
}

impl GroupRepresentation {
    /// First value of a multi-valued attribute.
    ///
    /// Returns `None` when the attribute is absent, has no values, or its first
    /// value is empty.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

/// A Keycloak user (`UserRepresentation`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRepresentation {
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Link between a Keycloak user and an external identity provider account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederatedIdentityRepresentation {
    /// Alias of the identity provider (e.g. `discord`).
    pub identity_provider: String,
    /// The user's id at the identity provider.
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
}

/// Offset pagination parameters (`first` / `max`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub first: u32,
    pub max: u32,
}

impl PageRequest {
    #[must_use]
    pub fn new(first: u32, max: u32) -> Self {
        Self { first, max }
    }

    pub(crate) fn query(self) -> [(&'static str, String); 2] {
        [("first", self.first.to_string()), ("max", self.max.to_string())]
    }
}
