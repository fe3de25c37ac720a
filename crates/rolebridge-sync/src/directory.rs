//! Identity directory seam and its Keycloak implementation.

use async_trait::async_trait;
use rolebridge_keycloak::{
    GroupRepresentation, KeycloakAdminClient, PageRequest, UserRepresentation,
};
use tracing::{debug, warn};

use crate::{SyncResult, ROLE_ATTRIBUTE};

/// Identity provider alias under which chat accounts are federated.
pub const DEFAULT_IDP_ALIAS: &str = "discord";

/// The identity-provider operations the sync needs.
///
/// Group and membership edges are the only data written through this trait.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// One page of groups, with attributes.
    async fn groups_page(&self, page: PageRequest) -> SyncResult<Vec<GroupRepresentation>>;

    /// One page of a group's members.
    async fn group_members_page(
        &self,
        group_id: &str,
        page: PageRequest,
    ) -> SyncResult<Vec<UserRepresentation>>;

    /// The directory account linked to a chat user, if any.
    async fn find_linked_user(&self, chat_user_id: u64) -> SyncResult<Option<UserRepresentation>>;

    /// The chat user id on a directory account's profile, if any.
    async fn chat_identity_of(&self, user: &UserRepresentation) -> SyncResult<Option<u64>>;

    /// Groups whose role attribute matches `role_id`.
    async fn groups_with_role_attribute(
        &self,
        role_id: u64,
    ) -> SyncResult<Vec<GroupRepresentation>>;

    /// Adds a membership edge.
    async fn add_member(&self, user_id: &str, group_id: &str) -> SyncResult<()>;

    /// Removes a membership edge.
    async fn remove_member(&self, user_id: &str, group_id: &str) -> SyncResult<()>;
}

/// [`IdentityDirectory`] backed by the Keycloak admin API.
#[derive(Debug, Clone)]
pub struct KeycloakDirectory {
    client: KeycloakAdminClient,
    idp_alias: String,
}

impl KeycloakDirectory {
    #[must_use]
    pub fn new(client: KeycloakAdminClient) -> Self {
        Self {
            client,
            idp_alias: DEFAULT_IDP_ALIAS.to_string(),
        }
    }

    /// Overrides the identity provider alias chat accounts are federated under.
    #[must_use]
    pub fn with_idp_alias(mut self, alias: impl Into<String>) -> Self {
        self.idp_alias = alias.into();
        self
    }
}

#[async_trait]
impl IdentityDirectory for KeycloakDirectory {
    async fn groups_page(&self, page: PageRequest) -> SyncResult<Vec<GroupRepresentation>> {
        Ok(self.client.list_groups(page).await?)
    }

    async fn group_members_page(
        &self,
        group_id: &str,
        page: PageRequest,
    ) -> SyncResult<Vec<UserRepresentation>> {
        Ok(self.client.group_members(group_id, page).await?)
    }

    async fn find_linked_user(&self, chat_user_id: u64) -> SyncResult<Option<UserRepresentation>> {
        let mut users = self
            .client
            .find_users_by_federated_identity(&self.idp_alias, &chat_user_id.to_string())
            .await?;

        if users.len() > 1 {
            warn!(
                chat_user_id,
                count = users.len(),
                "Chat account is linked to several directory accounts, using the first"
            );
        }

        Ok(if users.is_empty() {
            None
        } else {
            Some(users.swap_remove(0))
        })
    }

    async fn chat_identity_of(&self, user: &UserRepresentation) -> SyncResult<Option<u64>> {
        let identities = self.client.federated_identities(&user.id).await?;

        let Some(identity) = identities
            .into_iter()
            .filter(|identity| identity.identity_provider == self.idp_alias)
            .last()
        else {
            return Ok(None);
        };

        match identity.user_id.trim().parse::<u64>() {
            Ok(id) if id != 0 => Ok(Some(id)),
            _ => {
                warn!(
                    user_id = %user.id,
                    value = %identity.user_id,
                    "Federated chat identity is not a valid id"
                );
                Ok(None)
            }
        }
    }

    async fn groups_with_role_attribute(
        &self,
        role_id: u64,
    ) -> SyncResult<Vec<GroupRepresentation>> {
        let role = role_id.to_string();
        let groups = self
            .client
            .search_groups_by_attribute(ROLE_ATTRIBUTE, &role)
            .await?;
        debug!(role_id, matches = groups.len(), "Searched groups by role attribute");
        Ok(groups)
    }

    async fn add_member(&self, user_id: &str, group_id: &str) -> SyncResult<()> {
        Ok(self.client.add_user_to_group(user_id, group_id).await?)
    }

    async fn remove_member(&self, user_id: &str, group_id: &str) -> SyncResult<()> {
        Ok(self.client.remove_user_from_group(user_id, group_id).await?)
    }
}
