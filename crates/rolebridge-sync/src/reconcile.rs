//! Reconciliation engine: one full pass over every linked group/role pair.
//!
//! For each pair the engine translates both member lists through the
//! federated-identity link, computes a [`MembershipPlan`], then applies it.
//! Pairs are processed one after another; an error aborts the pass, and
//! edges already written by earlier pairs stay written.

use rolebridge_keycloak::UserRepresentation;
use tracing::{debug, error, info, instrument, warn};

use crate::discovery::{discover_linked_groups, fetch_group_members};
use crate::pagination::DEFAULT_PAGE_SIZE;
use crate::plan::{LinkedGroupMember, LinkedRoleMember, MembershipPlan};
use crate::platform::{ChatMember, ChatPlatform};
use crate::resolution::{resolve_linked_role, LinkedPair};
use crate::{IdentityDirectory, SyncError, SyncResult};

/// Knobs for a reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Compute and log the plan without writing any edge.
    pub dry_run: bool,
    /// Post a summary to the guild when a pair has drifted.
    pub notify_drift: bool,
    /// Page size for directory listings.
    pub page_size: u32,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            notify_drift: false,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// What happened to one pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairOutcome {
    pub group_id: String,
    pub group_name: String,
    pub role_id: u64,
    pub role_name: String,
    /// Usernames whose edge was (or, in dry-run, would be) added.
    pub added: Vec<String>,
    /// Usernames whose edge was (or, in dry-run, would be) removed.
    pub removed: Vec<String>,
    /// Role members with no linked directory account.
    pub unlinked_members: usize,
}

/// Summary of a full pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationReport {
    pub dry_run: bool,
    /// Linked groups found in the directory.
    pub linked_groups: usize,
    /// Linked groups whose guild or role could not be resolved.
    pub unresolved: usize,
    pub pairs: Vec<PairOutcome>,
}

impl ReconciliationReport {
    #[must_use]
    pub fn added(&self) -> usize {
        self.pairs.iter().map(|p| p.added.len()).sum()
    }

    #[must_use]
    pub fn removed(&self) -> usize {
        self.pairs.iter().map(|p| p.removed.len()).sum()
    }

    #[must_use]
    pub fn unlinked_members(&self) -> usize {
        self.pairs.iter().map(|p| p.unlinked_members).sum()
    }

    /// True when no edge needed to change.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.added() == 0 && self.removed() == 0
    }
}

/// Runs reconciliation passes against injected directory and platform clients.
#[derive(Debug)]
pub struct ReconciliationEngine<'a, D: ?Sized, C: ?Sized> {
    directory: &'a D,
    platform: &'a C,
    options: ReconcileOptions,
}

impl<'a, D, C> ReconciliationEngine<'a, D, C>
where
    D: IdentityDirectory + ?Sized,
    C: ChatPlatform + ?Sized,
{
    pub fn new(directory: &'a D, platform: &'a C, options: ReconcileOptions) -> Self {
        Self {
            directory,
            platform,
            options,
        }
    }

    /// Reconciles every linked pair.
    ///
    /// # Errors
    ///
    /// Returns the first directory or platform error, or
    /// [`SyncError::MissingFederatedIdentity`] when a group member has no
    /// linked chat account. Either way the pass stops there.
    #[instrument(skip(self), fields(dry_run = self.options.dry_run))]
    pub async fn run(&self) -> SyncResult<ReconciliationReport> {
        info!("Starting reconciliation pass");

        let groups = discover_linked_groups(self.directory, self.options.page_size).await?;
        let mut report = ReconciliationReport {
            dry_run: self.options.dry_run,
            linked_groups: groups.len(),
            ..Default::default()
        };

        for group in &groups {
            let Some(pair) = resolve_linked_role(self.platform, group).await? else {
                report.unresolved += 1;
                continue;
            };
            let outcome = self.reconcile_pair(&pair).await?;
            report.pairs.push(outcome);
        }

        info!(
            pairs = report.pairs.len(),
            unresolved = report.unresolved,
            added = report.added(),
            removed = report.removed(),
            unlinked = report.unlinked_members(),
            "Reconciliation pass completed"
        );
        Ok(report)
    }

    /// Reconciles a single pair.
    ///
    /// # Errors
    ///
    /// See [`ReconciliationEngine::run`].
    #[instrument(skip(self, pair), fields(group = %pair.group.name(), role = %pair.role.name))]
    pub async fn reconcile_pair(&self, pair: &LinkedPair) -> SyncResult<PairOutcome> {
        info!(
            "Syncing Keycloak group {} with Discord role {}",
            pair.group.name(),
            pair.role.name
        );

        let role_members = self.platform.role_members(&pair.role).await?;
        let group_members =
            fetch_group_members(self.directory, pair.group.id(), self.options.page_size).await?;
        debug!(
            role_members = role_members.len(),
            group_members = group_members.len(),
            "Fetched both member lists"
        );

        let (linked_role_members, unlinked_members) = self.link_role_members(role_members).await?;
        let linked_group_members = self.link_group_members(group_members).await?;

        let plan = MembershipPlan::compute(linked_role_members, linked_group_members);

        if !plan.is_empty() && self.options.notify_drift {
            self.notify_drift(pair, &plan).await;
        }

        let mut outcome = PairOutcome {
            group_id: pair.group.id().to_string(),
            group_name: pair.group.name().to_string(),
            role_id: pair.role.id,
            role_name: pair.role.name.clone(),
            unlinked_members,
            ..Default::default()
        };

        for add in &plan.to_add {
            info!(
                "Adding {} ({}) to Keycloak group {}",
                add.account.username,
                add.member.name,
                pair.group.name()
            );
            if !self.options.dry_run {
                self.directory
                    .add_member(&add.account.id, pair.group.id())
                    .await?;
            }
            outcome.added.push(add.account.username.clone());
        }

        for remove in &plan.to_remove {
            let chat_name = self.chat_name(pair.guild.id, remove.chat_user_id).await?;
            info!(
                "Removing {} ({}) from Keycloak group {}",
                remove.account.username,
                chat_name,
                pair.group.name()
            );
            if !self.options.dry_run {
                self.directory
                    .remove_member(&remove.account.id, pair.group.id())
                    .await?;
            }
            outcome.removed.push(remove.account.username.clone());
        }

        Ok(outcome)
    }

    /// Pairs role members with their directory accounts; unlinked ones are counted.
    async fn link_role_members(
        &self,
        members: Vec<ChatMember>,
    ) -> SyncResult<(Vec<LinkedRoleMember>, usize)> {
        let mut linked = Vec::with_capacity(members.len());
        let mut unlinked = 0;

        for member in members {
            match self.directory.find_linked_user(member.user_id).await? {
                Some(account) => linked.push(LinkedRoleMember { member, account }),
                None => {
                    debug!(
                        member = %member.name,
                        user_id = member.user_id,
                        "Role member has no linked Keycloak account, skipping"
                    );
                    unlinked += 1;
                }
            }
        }

        Ok((linked, unlinked))
    }

    /// Pairs group members with their chat ids; a missing link is fatal.
    async fn link_group_members(
        &self,
        members: Vec<UserRepresentation>,
    ) -> SyncResult<Vec<LinkedGroupMember>> {
        let mut linked = Vec::with_capacity(members.len());

        for account in members {
            let Some(chat_user_id) = self.directory.chat_identity_of(&account).await? else {
                error!(
                    user_id = %account.id,
                    username = %account.username,
                    "Group member has no linked Discord identity"
                );
                return Err(SyncError::MissingFederatedIdentity {
                    user_id: account.id,
                    username: account.username,
                });
            };
            linked.push(LinkedGroupMember {
                account,
                chat_user_id,
            });
        }

        Ok(linked)
    }

    async fn chat_name(&self, guild_id: u64, user_id: u64) -> SyncResult<String> {
        Ok(self
            .platform
            .guild_member(guild_id, user_id)
            .await?
            .map_or_else(|| format!("{user_id}, not in guild"), |m| m.name))
    }

    async fn notify_drift(&self, pair: &LinkedPair, plan: &MembershipPlan) {
        let message = plan.describe(pair.group.name(), &pair.role.name);
        if let Err(e) = self.platform.notify(pair.guild.id, &message).await {
            warn!(guild = %pair.guild.name, error = %e, "Failed to post drift notification");
        }
    }
}
