//! Live mirroring of a single member's role changes into the directory.

use rolebridge_keycloak::GroupRepresentation;
use std::collections::BTreeSet;
use tracing::{debug, info, instrument};

use crate::{IdentityDirectory, SyncResult, ROLE_ATTRIBUTE};

/// Before/after role snapshot for one guild member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleChange {
    pub guild_id: u64,
    pub user_id: u64,
    pub user_name: String,
    pub before: BTreeSet<u64>,
    pub after: BTreeSet<u64>,
}

impl RoleChange {
    /// Roles present after but not before.
    #[must_use]
    pub fn added(&self) -> Vec<u64> {
        self.after.difference(&self.before).copied().collect()
    }

    /// Roles present before but not after.
    #[must_use]
    pub fn removed(&self) -> Vec<u64> {
        self.before.difference(&self.after).copied().collect()
    }

    /// True when the update touched something other than roles.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.before == self.after
    }
}

/// Why a live update issued no calls at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The update is about the bot itself.
    OwnAccount,
    /// Roles did not change.
    NoRoleChange,
    /// The member has no linked directory account.
    UnlinkedAccount,
}

/// Result of handling one update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveOutcome {
    pub skipped: Option<SkipReason>,
    /// Names of groups the account joined.
    pub joined: Vec<String>,
    /// Names of groups the account left.
    pub left: Vec<String>,
}

impl LiveOutcome {
    fn skipped(reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Default::default()
        }
    }
}

/// Mirrors role changes into group membership.
///
/// Holds no state between updates; concurrent invocations for different
/// members only touch their own account's edges.
#[derive(Debug)]
pub struct LiveHandler<'a, D: ?Sized> {
    directory: &'a D,
    bot_user_id: u64,
    dry_run: bool,
}

impl<'a, D> LiveHandler<'a, D>
where
    D: IdentityDirectory + ?Sized,
{
    pub fn new(directory: &'a D, bot_user_id: u64) -> Self {
        Self {
            directory,
            bot_user_id,
            dry_run: false,
        }
    }

    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Handles one member update.
    ///
    /// # Errors
    ///
    /// Propagates directory errors; edges written before the failure stay.
    #[instrument(skip(self, change), fields(user_id = change.user_id, guild_id = change.guild_id))]
    pub async fn handle(&self, change: &RoleChange) -> SyncResult<LiveOutcome> {
        if change.user_id == self.bot_user_id {
            return Ok(LiveOutcome::skipped(SkipReason::OwnAccount));
        }
        if change.is_noop() {
            return Ok(LiveOutcome::skipped(SkipReason::NoRoleChange));
        }

        let Some(account) = self.directory.find_linked_user(change.user_id).await? else {
            debug!(member = %change.user_name, "Member has no linked Keycloak account, ignoring");
            return Ok(LiveOutcome::skipped(SkipReason::UnlinkedAccount));
        };

        let mut outcome = LiveOutcome::default();

        for role_id in change.added() {
            for group in self.linked_groups_for_role(role_id).await? {
                info!(
                    "Adding {} ({}) to Keycloak group {}",
                    account.username, change.user_name, group.name
                );
                if !self.dry_run {
                    self.directory.add_member(&account.id, &group.id).await?;
                }
                outcome.joined.push(group.name);
            }
        }

        for role_id in change.removed() {
            for group in self.linked_groups_for_role(role_id).await? {
                info!(
                    "Removing {} ({}) from Keycloak group {}",
                    account.username, change.user_name, group.name
                );
                if !self.dry_run {
                    self.directory.remove_member(&account.id, &group.id).await?;
                }
                outcome.left.push(group.name);
            }
        }

        Ok(outcome)
    }

    /// Every group linked to a role, in directory order.
    async fn linked_groups_for_role(&self, role_id: u64) -> SyncResult<Vec<GroupRepresentation>> {
        let wanted = role_id.to_string();
        let groups: Vec<GroupRepresentation> = self
            .directory
            .groups_with_role_attribute(role_id)
            .await?
            .into_iter()
            .filter(|group| group.attribute(ROLE_ATTRIBUTE) == Some(wanted.as_str()))
            .collect();

        if groups.is_empty() {
            debug!(role_id, "Role is not linked to any group");
        } else if groups.len() > 1 {
            let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
            debug!(role_id, groups = ?names, "Role is linked to several groups");
        }
        Ok(groups)
    }
}
