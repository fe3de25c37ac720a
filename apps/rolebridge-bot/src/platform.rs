//! Discord access for the sync core via serenity's cache and HTTP client.

use std::sync::Arc;

use async_trait::async_trait;
use rolebridge_sync::{ChatMember, ChatPlatform, GuildInfo, RoleInfo, SyncError, SyncResult};
use serenity::cache::Cache;
use serenity::http::Http;
use serenity::model::channel::ChannelType;
use serenity::model::guild::Member;
use serenity::model::id::{GuildId, RoleId, UserId};
use tracing::debug;

/// Largest page the member listing endpoint serves.
const MEMBER_PAGE_SIZE: u64 = 1000;

/// Guild and role lookups come from the gateway cache; member listings and
/// notifications go over REST.
#[derive(Clone)]
pub struct SerenityPlatform {
    cache: Arc<Cache>,
    http: Arc<Http>,
}

impl SerenityPlatform {
    pub fn new(cache: Arc<Cache>, http: Arc<Http>) -> Self {
        Self { cache, http }
    }
}

fn guild_id(raw: u64) -> Option<GuildId> {
    (raw != 0).then(|| GuildId::new(raw))
}

fn platform_error(e: serenity::Error) -> SyncError {
    SyncError::Platform(e.to_string())
}

fn chat_member(member: &Member) -> ChatMember {
    ChatMember {
        user_id: member.user.id.get(),
        name: member.display_name().to_string(),
    }
}

#[async_trait]
impl ChatPlatform for SerenityPlatform {
    async fn guild(&self, guild_id: u64) -> SyncResult<Option<GuildInfo>> {
        let Some(id) = self::guild_id(guild_id) else {
            return Ok(None);
        };
        Ok(self.cache.guild(id).map(|guild| GuildInfo {
            id: guild_id,
            name: guild.name.clone(),
        }))
    }

    async fn role(&self, guild: &GuildInfo, role_id: u64) -> SyncResult<Option<RoleInfo>> {
        let (Some(id), true) = (guild_id(guild.id), role_id != 0) else {
            return Ok(None);
        };
        let name = self
            .cache
            .guild(id)
            .and_then(|g| g.roles.get(&RoleId::new(role_id)).map(|r| r.name.clone()));
        Ok(name.map(|name| RoleInfo {
            id: role_id,
            guild_id: guild.id,
            name,
        }))
    }

    async fn role_members(&self, role: &RoleInfo) -> SyncResult<Vec<ChatMember>> {
        let (Some(guild), true) = (guild_id(role.guild_id), role.id != 0) else {
            return Ok(Vec::new());
        };
        let role_id = RoleId::new(role.id);

        let mut holders = Vec::new();
        let mut after: Option<UserId> = None;
        loop {
            let page = guild
                .members(&self.http, Some(MEMBER_PAGE_SIZE), after)
                .await
                .map_err(platform_error)?;
            let fetched = page.len();
            after = page.last().map(|m| m.user.id);

            holders.extend(
                page.iter()
                    .filter(|m| m.roles.contains(&role_id))
                    .map(chat_member),
            );

            if (fetched as u64) < MEMBER_PAGE_SIZE || after.is_none() {
                break;
            }
        }

        debug!(role = %role.name, holders = holders.len(), "Listed role members");
        Ok(holders)
    }

    async fn guild_member(&self, guild_id: u64, user_id: u64) -> SyncResult<Option<ChatMember>> {
        let (Some(guild), true) = (self::guild_id(guild_id), user_id != 0) else {
            return Ok(None);
        };
        let user = UserId::new(user_id);

        let cached = self
            .cache
            .guild(guild)
            .and_then(|g| g.members.get(&user).map(chat_member));
        if cached.is_some() {
            return Ok(cached);
        }

        // Only used to label log lines, so a failed lookup reads as absent.
        match self.http.get_member(guild, user).await {
            Ok(member) => Ok(Some(chat_member(&member))),
            Err(e) => {
                debug!(guild_id, user_id, error = %e, "Guild member lookup failed");
                Ok(None)
            }
        }
    }

    async fn notify(&self, guild_id: u64, message: &str) -> SyncResult<()> {
        let Some(id) = self::guild_id(guild_id) else {
            return Ok(());
        };
        let channel = self.cache.guild(id).and_then(|guild| {
            guild
                .channels
                .values()
                .filter(|c| c.kind == ChannelType::Text)
                .min_by_key(|c| (c.position, c.id))
                .map(|c| c.id)
        });

        let Some(channel) = channel else {
            return Err(SyncError::Platform(format!(
                "guild {guild_id} has no text channel"
            )));
        };

        channel
            .say(&self.http, message)
            .await
            .map(|_| ())
            .map_err(platform_error)
    }
}
