//! Keycloak group ⇄ Discord role membership sync
//!
//! Keeps the members of designated Keycloak groups equal to the holders of
//! the Discord roles they are linked to. A group is linked when it carries a
//! `discord-guild` and a `discord-role` attribute; accounts are matched
//! through Keycloak's federated identity for the `discord` provider.
//!
//! # Features
//!
//! - Group discovery over Keycloak's offset-paginated admin API
//! - Full reconciliation pass over every linked pair (with dry-run)
//! - Live mirroring of single-member role changes
//!
//! Both external systems sit behind traits ([`IdentityDirectory`],
//! [`ChatPlatform`]) so the engine is driven by explicitly constructed clients.

mod directory;
mod discovery;
mod error;
mod live;
mod pagination;
mod plan;
mod platform;
mod reconcile;
mod resolution;

/// Group attribute holding the linked guild id.
pub const GUILD_ATTRIBUTE: &str = "discord-guild";

/// Group attribute holding the linked role id.
pub const ROLE_ATTRIBUTE: &str = "discord-role";

// Re-exports
pub use directory::{IdentityDirectory, KeycloakDirectory, DEFAULT_IDP_ALIAS};
pub use discovery::{discover_linked_groups, fetch_group_members, filter_linked_groups, LinkedGroup};
pub use error::{SyncError, SyncResult};
pub use live::{LiveHandler, LiveOutcome, RoleChange, SkipReason};
pub use pagination::{
    GroupListing, GroupMemberListing, PageCursor, PagedSource, DEFAULT_PAGE_SIZE,
};
pub use plan::{LinkedGroupMember, LinkedRoleMember, MembershipPlan};
pub use platform::{ChatMember, ChatPlatform, GuildInfo, RoleInfo};
pub use reconcile::{PairOutcome, ReconcileOptions, ReconciliationEngine, ReconciliationReport};
pub use resolution::{parse_snowflake, resolve_linked_role, LinkedPair};
