//! Membership diff between a role and its linked group.

use rolebridge_keycloak::UserRepresentation;
use std::collections::HashSet;

use crate::platform::ChatMember;

/// A role member together with their directory account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedRoleMember {
    pub member: ChatMember,
    pub account: UserRepresentation,
}

/// A group member together with their chat user id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedGroupMember {
    pub account: UserRepresentation,
    pub chat_user_id: u64,
}

/// The edges that bring a group in line with its role.
///
/// `to_add` holds role members whose account is not in the group;
/// `to_remove` holds group members whose chat account does not hold the role.
/// The two never share an account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipPlan {
    pub to_add: Vec<LinkedRoleMember>,
    pub to_remove: Vec<LinkedGroupMember>,
}

impl MembershipPlan {
    #[must_use]
    pub fn compute(
        role_members: Vec<LinkedRoleMember>,
        group_members: Vec<LinkedGroupMember>,
    ) -> Self {
        let in_group: HashSet<String> = group_members
            .iter()
            .map(|m| m.account.id.clone())
            .collect();
        let in_role: HashSet<u64> = role_members.iter().map(|m| m.member.user_id).collect();

        let mut queued = HashSet::new();
        let to_add = role_members
            .into_iter()
            .filter(|m| !in_group.contains(&m.account.id))
            .filter(|m| queued.insert(m.account.id.clone()))
            .collect();

        let to_remove = group_members
            .into_iter()
            .filter(|m| !in_role.contains(&m.chat_user_id))
            .collect();

        Self { to_add, to_remove }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    /// One-paragraph summary for humans.
    #[must_use]
    pub fn describe(&self, group_name: &str, role_name: &str) -> String {
        let adding: Vec<&str> = self
            .to_add
            .iter()
            .map(|m| m.account.username.as_str())
            .collect();
        let removing: Vec<&str> = self
            .to_remove
            .iter()
            .map(|m| m.account.username.as_str())
            .collect();
        format!(
            "Keycloak group **{group_name}** drifted from role **{role_name}**. Adding: {}. Removing: {}.",
            join_or_nobody(&adding),
            join_or_nobody(&removing),
        )
    }
}

fn join_or_nobody(names: &[&str]) -> String {
    if names.is_empty() {
        "nobody".to_string()
    } else {
        names.join(", ")
    }
}
