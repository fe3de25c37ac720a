//! Group discovery: which realm groups are linked to a chat role.

use rolebridge_keycloak::{GroupRepresentation, UserRepresentation};
use tracing::{debug, info, instrument};

use crate::pagination::{GroupListing, GroupMemberListing, PageCursor};
use crate::{IdentityDirectory, SyncResult, GUILD_ATTRIBUTE, ROLE_ATTRIBUTE};

/// A group carrying both sync attributes.
///
/// The attribute values are kept raw; turning them into ids is role
/// resolution's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedGroup {
    pub group: GroupRepresentation,
    pub guild_ref: String,
    pub role_ref: String,
}

impl LinkedGroup {
    /// Returns `None` unless both sync attributes are present and non-empty.
    #[must_use]
    pub fn from_group(group: GroupRepresentation) -> Option<Self> {
        let guild_ref = group.attribute(GUILD_ATTRIBUTE)?.to_string();
        let role_ref = group.attribute(ROLE_ATTRIBUTE)?.to_string();
        Some(Self {
            group,
            guild_ref,
            role_ref,
        })
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.group.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.group.name
    }
}

/// Keeps the linked groups, silently dropping the rest.
#[must_use]
pub fn filter_linked_groups(groups: Vec<GroupRepresentation>) -> Vec<LinkedGroup> {
    groups
        .into_iter()
        .filter_map(|group| {
            let name = group.name.clone();
            let linked = LinkedGroup::from_group(group);
            if linked.is_none() {
                debug!(group = %name, "Group has no sync attributes, skipping");
            }
            linked
        })
        .collect()
}

/// Lists every group in the realm and keeps the linked ones.
///
/// # Errors
///
/// Propagates directory errors.
#[instrument(skip(directory))]
pub async fn discover_linked_groups<D>(
    directory: &D,
    page_size: u32,
) -> SyncResult<Vec<LinkedGroup>>
where
    D: IdentityDirectory + ?Sized,
{
    let groups = PageCursor::with_page_size(GroupListing::new(directory), page_size)
        .collect_all()
        .await?;
    let total = groups.len();
    let linked = filter_linked_groups(groups);

    info!(total, linked = linked.len(), "Discovered linked groups");
    Ok(linked)
}

/// Every member of a group, however many pages that takes.
///
/// # Errors
///
/// Propagates directory errors.
pub async fn fetch_group_members<D>(
    directory: &D,
    group_id: &str,
    page_size: u32,
) -> SyncResult<Vec<UserRepresentation>>
where
    D: IdentityDirectory + ?Sized,
{
    PageCursor::with_page_size(GroupMemberListing::new(directory, group_id), page_size)
        .collect_all()
        .await
}
