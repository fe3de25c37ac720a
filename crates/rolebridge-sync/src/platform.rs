//! Chat platform seam.

use async_trait::async_trait;

use crate::SyncResult;

/// A guild (server) on the chat platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildInfo {
    pub id: u64,
    pub name: String,
}

/// A role scoped to a guild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleInfo {
    pub id: u64,
    pub guild_id: u64,
    pub name: String,
}

/// A guild member, reduced to what the sync logs and compares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMember {
    pub user_id: u64,
    pub name: String,
}

/// The chat-platform operations the sync needs.
///
/// All lookups return `Ok(None)` for absent entities; errors are reserved
/// for transport failures.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Looks up a guild the bot is in.
    async fn guild(&self, guild_id: u64) -> SyncResult<Option<GuildInfo>>;

    /// Looks up a role within a guild.
    async fn role(&self, guild: &GuildInfo, role_id: u64) -> SyncResult<Option<RoleInfo>>;

    /// Every member currently holding the role.
    async fn role_members(&self, role: &RoleInfo) -> SyncResult<Vec<ChatMember>>;

    /// Looks up a single guild member.
    async fn guild_member(&self, guild_id: u64, user_id: u64) -> SyncResult<Option<ChatMember>>;

    /// Posts a human-readable notice to the guild.
    async fn notify(&self, guild_id: u64, message: &str) -> SyncResult<()>;
}
