//! In-memory directory and chat platform fakes for sync tests.

#![allow(dead_code)]

use async_trait::async_trait;
use rolebridge_keycloak::{GroupRepresentation, PageRequest, UserRepresentation};
use rolebridge_sync::{
    ChatMember, ChatPlatform, GuildInfo, IdentityDirectory, RoleInfo, SyncError, SyncResult,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

/// A membership edge write observed by the fake directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Add { user_id: String, group_id: String },
    Remove { user_id: String, group_id: String },
}

pub fn add(user_id: &str, group_id: &str) -> Call {
    Call::Add {
        user_id: user_id.to_string(),
        group_id: group_id.to_string(),
    }
}

pub fn remove(user_id: &str, group_id: &str) -> Call {
    Call::Remove {
        user_id: user_id.to_string(),
        group_id: group_id.to_string(),
    }
}

pub fn linked_group(id: &str, name: &str, guild_id: u64, role_id: u64) -> GroupRepresentation {
    GroupRepresentation {
        id: id.to_string(),
        name: name.to_string(),
        path: Some(format!("/{name}")),
        attributes: HashMap::from([
            ("discord-guild".to_string(), vec![guild_id.to_string()]),
            ("discord-role".to_string(), vec![role_id.to_string()]),
        ]),
        sub_groups: Vec::new(),
    }
}

pub fn plain_group(id: &str, name: &str) -> GroupRepresentation {
    GroupRepresentation {
        id: id.to_string(),
        name: name.to_string(),
        ..Default::default()
    }
}

#[derive(Debug, Default)]
struct DirectoryState {
    groups: Vec<GroupRepresentation>,
    members: HashMap<String, Vec<String>>,
    users: HashMap<String, UserRepresentation>,
    chat_to_user: HashMap<u64, String>,
    user_to_chat: HashMap<String, u64>,
    calls: Vec<Call>,
    group_page_requests: Vec<PageRequest>,
    member_page_requests: Vec<PageRequest>,
    fail_writes: bool,
}

/// A realm held in memory. Writes mutate membership so passes can be rerun.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    state: Mutex<DirectoryState>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(self, group: GroupRepresentation) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.members.entry(group.id.clone()).or_default();
            state.groups.push(group);
        }
        self
    }

    /// Adds a user; `chat_id` links them to a chat account.
    pub fn with_user(self, id: &str, username: &str, chat_id: Option<u64>) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.users.insert(
                id.to_string(),
                UserRepresentation {
                    id: id.to_string(),
                    username: username.to_string(),
                    enabled: Some(true),
                    ..Default::default()
                },
            );
            if let Some(chat_id) = chat_id {
                state.chat_to_user.insert(chat_id, id.to_string());
                state.user_to_chat.insert(id.to_string(), chat_id);
            }
        }
        self
    }

    pub fn with_member(self, group_id: &str, user_id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .members
            .entry(group_id.to_string())
            .or_default()
            .push(user_id.to_string());
        self
    }

    /// Makes every add/remove fail with a server error.
    pub fn failing_writes(self) -> Self {
        self.state.lock().unwrap().fail_writes = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn group_page_requests(&self) -> Vec<PageRequest> {
        self.state.lock().unwrap().group_page_requests.clone()
    }

    pub fn member_page_requests(&self) -> Vec<PageRequest> {
        self.state.lock().unwrap().member_page_requests.clone()
    }

    /// Usernames currently in a group.
    pub fn usernames_in(&self, group_id: &str) -> BTreeSet<String> {
        let state = self.state.lock().unwrap();
        state
            .members
            .get(group_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.users.get(id))
                    .map(|u| u.username.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn write_error() -> SyncError {
        SyncError::Directory(rolebridge_keycloak::KeycloakError::Api {
            status: 500,
            message: "unknown_error".into(),
        })
    }
}

fn page_of<T: Clone>(items: &[T], page: PageRequest) -> Vec<T> {
    items
        .iter()
        .skip(page.first as usize)
        .take(page.max as usize)
        .cloned()
        .collect()
}

#[async_trait]
impl IdentityDirectory for InMemoryDirectory {
    async fn groups_page(&self, page: PageRequest) -> SyncResult<Vec<GroupRepresentation>> {
        let mut state = self.state.lock().unwrap();
        state.group_page_requests.push(page);
        Ok(page_of(&state.groups, page))
    }

    async fn group_members_page(
        &self,
        group_id: &str,
        page: PageRequest,
    ) -> SyncResult<Vec<UserRepresentation>> {
        let mut state = self.state.lock().unwrap();
        state.member_page_requests.push(page);
        let ids = state.members.get(group_id).cloned().unwrap_or_default();
        let users: Vec<UserRepresentation> = ids
            .iter()
            .filter_map(|id| state.users.get(id).cloned())
            .collect();
        Ok(page_of(&users, page))
    }

    async fn find_linked_user(&self, chat_user_id: u64) -> SyncResult<Option<UserRepresentation>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .chat_to_user
            .get(&chat_user_id)
            .and_then(|id| state.users.get(id))
            .cloned())
    }

    async fn chat_identity_of(&self, user: &UserRepresentation) -> SyncResult<Option<u64>> {
        Ok(self.state.lock().unwrap().user_to_chat.get(&user.id).copied())
    }

    async fn groups_with_role_attribute(
        &self,
        role_id: u64,
    ) -> SyncResult<Vec<GroupRepresentation>> {
        let wanted = role_id.to_string();
        Ok(self
            .state
            .lock()
            .unwrap()
            .groups
            .iter()
            .filter(|g| {
                g.attributes
                    .get("discord-role")
                    .is_some_and(|values| values.contains(&wanted))
            })
            .cloned()
            .collect())
    }

    async fn add_member(&self, user_id: &str, group_id: &str) -> SyncResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(Self::write_error());
        }
        state.calls.push(add(user_id, group_id));
        let members = state.members.entry(group_id.to_string()).or_default();
        if !members.iter().any(|m| m == user_id) {
            members.push(user_id.to_string());
        }
        Ok(())
    }

    async fn remove_member(&self, user_id: &str, group_id: &str) -> SyncResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(Self::write_error());
        }
        state.calls.push(remove(user_id, group_id));
        if let Some(members) = state.members.get_mut(group_id) {
            members.retain(|m| m != user_id);
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct FakeRole {
    guild_id: u64,
    name: String,
    holders: Vec<u64>,
}

/// A set of guilds held in memory.
#[derive(Debug, Default)]
pub struct FakePlatform {
    guilds: HashMap<u64, String>,
    roles: HashMap<u64, FakeRole>,
    members: HashMap<(u64, u64), String>,
    notifications: Mutex<Vec<(u64, String)>>,
    fail_notify: bool,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_guild(mut self, id: u64, name: &str) -> Self {
        self.guilds.insert(id, name.to_string());
        self
    }

    pub fn with_role(mut self, guild_id: u64, id: u64, name: &str) -> Self {
        self.roles.insert(
            id,
            FakeRole {
                guild_id,
                name: name.to_string(),
                holders: Vec::new(),
            },
        );
        self
    }

    pub fn with_member(mut self, guild_id: u64, user_id: u64, name: &str) -> Self {
        self.members.insert((guild_id, user_id), name.to_string());
        self
    }

    /// Gives a guild member a role.
    pub fn with_role_holder(mut self, role_id: u64, user_id: u64) -> Self {
        if let Some(role) = self.roles.get_mut(&role_id) {
            role.holders.push(user_id);
        }
        self
    }

    pub fn failing_notifications(mut self) -> Self {
        self.fail_notify = true;
        self
    }

    pub fn notifications(&self) -> Vec<(u64, String)> {
        self.notifications.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatPlatform for FakePlatform {
    async fn guild(&self, guild_id: u64) -> SyncResult<Option<GuildInfo>> {
        Ok(self.guilds.get(&guild_id).map(|name| GuildInfo {
            id: guild_id,
            name: name.clone(),
        }))
    }

    async fn role(&self, guild: &GuildInfo, role_id: u64) -> SyncResult<Option<RoleInfo>> {
        Ok(self
            .roles
            .get(&role_id)
            .filter(|role| role.guild_id == guild.id)
            .map(|role| RoleInfo {
                id: role_id,
                guild_id: guild.id,
                name: role.name.clone(),
            }))
    }

    async fn role_members(&self, role: &RoleInfo) -> SyncResult<Vec<ChatMember>> {
        let holders = self
            .roles
            .get(&role.id)
            .map(|r| r.holders.clone())
            .unwrap_or_default();
        Ok(holders
            .into_iter()
            .map(|user_id| ChatMember {
                user_id,
                name: self
                    .members
                    .get(&(role.guild_id, user_id))
                    .cloned()
                    .unwrap_or_else(|| format!("user-{user_id}")),
            })
            .collect())
    }

    async fn guild_member(&self, guild_id: u64, user_id: u64) -> SyncResult<Option<ChatMember>> {
        Ok(self
            .members
            .get(&(guild_id, user_id))
            .map(|name| ChatMember {
                user_id,
                name: name.clone(),
            }))
    }

    async fn notify(&self, guild_id: u64, message: &str) -> SyncResult<()> {
        if self.fail_notify {
            return Err(SyncError::Platform("Missing Permissions".into()));
        }
        self.notifications
            .lock()
            .unwrap()
            .push((guild_id, message.to_string()));
        Ok(())
    }
}
