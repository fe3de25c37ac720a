//! Role resolution: from a linked group to a concrete guild role.

use tracing::warn;

use crate::discovery::LinkedGroup;
use crate::platform::{ChatPlatform, GuildInfo, RoleInfo};
use crate::SyncResult;

/// A linked group together with the role it mirrors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedPair {
    pub group: LinkedGroup,
    pub guild: GuildInfo,
    pub role: RoleInfo,
}

/// Parses a chat-platform id. Zero is not a valid id.
#[must_use]
pub fn parse_snowflake(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok().filter(|id| *id != 0)
}

/// Resolves the group's guild and role.
///
/// Unparsable ids, unknown guilds and unknown roles all yield `Ok(None)`:
/// the pair is skipped for this pass.
///
/// # Errors
///
/// Propagates chat platform transport errors.
pub async fn resolve_linked_role<C>(
    platform: &C,
    group: &LinkedGroup,
) -> SyncResult<Option<LinkedPair>>
where
    C: ChatPlatform + ?Sized,
{
    let (Some(guild_id), Some(role_id)) = (
        parse_snowflake(&group.guild_ref),
        parse_snowflake(&group.role_ref),
    ) else {
        warn!(
            group = %group.name(),
            guild = %group.guild_ref,
            role = %group.role_ref,
            "Group sync attributes are not valid ids, skipping"
        );
        return Ok(None);
    };

    let Some(guild) = platform.guild(guild_id).await? else {
        warn!(group = %group.name(), guild_id, "Linked guild not found, skipping");
        return Ok(None);
    };

    let Some(role) = platform.role(&guild, role_id).await? else {
        warn!(
            group = %group.name(),
            guild = %guild.name,
            role_id,
            "Linked role not found, skipping"
        );
        return Ok(None);
    };

    Ok(Some(LinkedPair {
        group: group.clone(),
        guild,
        role,
    }))
}
