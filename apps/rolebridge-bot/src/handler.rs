//! Gateway event handling: startup reconciliation and live role changes.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rolebridge_sync::{
    KeycloakDirectory, LiveHandler, ReconcileOptions, ReconciliationEngine, RoleChange,
};
use serenity::gateway::ChunkGuildFilter;
use serenity::model::event::{GuildMemberUpdateEvent, GuildMembersChunkEvent};
use serenity::model::gateway::Ready;
use serenity::model::guild::{Guild, Member};
use serenity::model::id::{GuildId, RoleId, UserId};
use serenity::prelude::{Context, EventHandler};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::platform::SerenityPlatform;

/// How long the startup pass waits for member chunks before running anyway.
const CHUNK_WAIT: Duration = Duration::from_secs(120);

/// Allows at most one reconciliation pass at a time.
#[derive(Debug, Clone, Default)]
pub struct PassGuard {
    running: Arc<AtomicBool>,
}

impl PassGuard {
    /// Claims the guard; `None` while another pass holds it.
    pub fn try_acquire(&self) -> Option<PassPermit> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| PassPermit {
                running: Arc::clone(&self.running),
            })
    }
}

/// Releases the guard when dropped.
#[derive(Debug)]
pub struct PassPermit {
    running: Arc<AtomicBool>,
}

impl Drop for PassPermit {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

#[derive(Debug, Default)]
struct ChunkState {
    pending: HashSet<GuildId>,
    armed: bool,
}

/// Tracks the member chunks requested at startup.
///
/// Fires exactly once: when the last pending guild's final chunk arrives, or
/// when the wait is abandoned, whichever comes first.
#[derive(Debug, Default)]
pub struct ChunkTracker {
    state: Mutex<ChunkState>,
}

impl ChunkTracker {
    /// Starts waiting for `guilds`. Returns true when there is nothing to wait for.
    pub async fn expect(&self, guilds: impl IntoIterator<Item = GuildId>) -> bool {
        let mut state = self.state.lock().await;
        state.pending = guilds.into_iter().collect();
        state.armed = !state.pending.is_empty();
        !state.armed
    }

    /// Records one chunk. Returns true when it completes the last pending guild.
    pub async fn chunk_received(&self, guild_id: GuildId, index: u32, count: u32) -> bool {
        let mut state = self.state.lock().await;
        if !state.armed {
            return false;
        }
        if index.saturating_add(1) >= count {
            state.pending.remove(&guild_id);
        }
        if state.pending.is_empty() {
            state.armed = false;
            return true;
        }
        false
    }

    /// Stops waiting. Returns true when chunks were still outstanding.
    pub async fn abandon(&self) -> bool {
        let mut state = self.state.lock().await;
        let was_armed = state.armed;
        state.armed = false;
        state.pending.clear();
        was_armed
    }
}

/// Builds the before/after snapshot for a member update.
///
/// Without a cached previous snapshot the roles the member holds now are
/// treated as gained: their groups are joined (an idempotent write) and no
/// group is left, since losses cannot be told apart.
pub fn role_change(
    guild_id: GuildId,
    user_id: UserId,
    user_name: String,
    before: Option<&[RoleId]>,
    after: &[RoleId],
) -> RoleChange {
    RoleChange {
        guild_id: guild_id.get(),
        user_id: user_id.get(),
        user_name,
        before: before
            .unwrap_or_default()
            .iter()
            .map(|r| r.get())
            .collect(),
        after: after.iter().map(|r| r.get()).collect(),
    }
}

/// Launches reconciliation passes on their own task.
#[derive(Clone)]
struct Reconciler {
    directory: Arc<KeycloakDirectory>,
    options: ReconcileOptions,
    guard: PassGuard,
}

impl Reconciler {
    fn spawn(&self, ctx: &Context) {
        let Some(permit) = self.guard.try_acquire() else {
            info!("Reconciliation pass already running, skipping");
            return;
        };

        let directory = Arc::clone(&self.directory);
        let platform = SerenityPlatform::new(Arc::clone(&ctx.cache), Arc::clone(&ctx.http));
        let options = self.options;

        tokio::spawn(async move {
            let _permit = permit;
            let engine = ReconciliationEngine::new(directory.as_ref(), &platform, options);
            match engine.run().await {
                Ok(report) => info!(
                    pairs = report.pairs.len(),
                    unresolved = report.unresolved,
                    added = report.added(),
                    removed = report.removed(),
                    unlinked = report.unlinked_members(),
                    dry_run = report.dry_run,
                    "Reconciliation finished"
                ),
                Err(e) if e.is_integrity_violation() => error!(
                    error = %e,
                    "Reconciliation aborted: a group member has no Discord link, fix the account and restart"
                ),
                Err(e) => error!(error = %e, "Reconciliation failed"),
            }
        });
    }
}

pub struct Handler {
    reconciler: Reconciler,
    sync_on_startup: bool,
    chunks: Arc<ChunkTracker>,
}

impl Handler {
    pub fn new(
        directory: KeycloakDirectory,
        options: ReconcileOptions,
        sync_on_startup: bool,
    ) -> Self {
        Self {
            reconciler: Reconciler {
                directory: Arc::new(directory),
                options,
                guard: PassGuard::default(),
            },
            sync_on_startup,
            chunks: Arc::new(ChunkTracker::default()),
        }
    }

    fn start_pass(&self, ctx: &Context) {
        if self.sync_on_startup {
            self.reconciler.spawn(ctx);
        }
    }
}

fn request_members(ctx: &Context, guild_id: GuildId) {
    debug!(%guild_id, "Requesting guild member chunks");
    ctx.shard.chunk_guild(guild_id, None, false, ChunkGuildFilter::None, None);
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(
            user = %ready.user.name,
            user_id = %ready.user.id,
            guilds = ready.guilds.len(),
            "Connected to Discord"
        );
    }

    async fn cache_ready(&self, ctx: Context, guilds: Vec<GuildId>) {
        debug!(guilds = guilds.len(), "Guild cache ready");

        // Large guilds arrive without their member list; role updates for
        // uncached members carry no previous snapshot until chunks land.
        if self.chunks.expect(guilds.iter().copied()).await {
            self.start_pass(&ctx);
            return;
        }
        for guild_id in &guilds {
            request_members(&ctx, *guild_id);
        }

        let chunks = Arc::clone(&self.chunks);
        let reconciler = self.reconciler.clone();
        let sync_on_startup = self.sync_on_startup;
        tokio::spawn(async move {
            tokio::time::sleep(CHUNK_WAIT).await;
            if chunks.abandon().await {
                warn!(
                    wait_secs = CHUNK_WAIT.as_secs(),
                    "Member chunks still outstanding, continuing without them"
                );
                if sync_on_startup {
                    reconciler.spawn(&ctx);
                }
            }
        });
    }

    async fn guild_create(&self, ctx: Context, guild: Guild, is_new: Option<bool>) {
        if is_new == Some(true) {
            info!(guild = %guild.name, guild_id = %guild.id, "Joined guild");
            request_members(&ctx, guild.id);
        }
    }

    async fn guild_members_chunk(&self, ctx: Context, chunk: GuildMembersChunkEvent) {
        debug!(
            guild_id = %chunk.guild_id,
            index = chunk.chunk_index,
            count = chunk.chunk_count,
            members = chunk.members.len(),
            "Received member chunk"
        );
        if self
            .chunks
            .chunk_received(chunk.guild_id, chunk.chunk_index, chunk.chunk_count)
            .await
        {
            info!("All guild members cached");
            self.start_pass(&ctx);
        }
    }

    async fn guild_member_update(
        &self,
        ctx: Context,
        old_if_available: Option<Member>,
        _new: Option<Member>,
        event: GuildMemberUpdateEvent,
    ) {
        if old_if_available.is_none() {
            debug!(
                user_id = %event.user.id,
                "No cached snapshot for member update, mirroring held roles"
            );
        }

        let user_name = event
            .nick
            .clone()
            .or_else(|| event.user.global_name.clone())
            .unwrap_or_else(|| event.user.name.clone());
        let change = role_change(
            event.guild_id,
            event.user.id,
            user_name,
            old_if_available.as_ref().map(|old| old.roles.as_slice()),
            &event.roles,
        );

        let bot_user_id = ctx.cache.current_user().id.get();
        let handler = LiveHandler::new(self.reconciler.directory.as_ref(), bot_user_id)
            .with_dry_run(self.reconciler.options.dry_run);

        match handler.handle(&change).await {
            Ok(outcome) => {
                if !outcome.joined.is_empty() || !outcome.left.is_empty() {
                    debug!(joined = ?outcome.joined, left = ?outcome.left, "Mirrored role change");
                }
            }
            Err(e) => warn!(
                user_id = change.user_id,
                error = %e,
                "Failed to mirror role change"
            ),
        }
    }
}
