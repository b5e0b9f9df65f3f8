// SPDX-FileCopyrightText: 2026 Guildsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory chat guild for deterministic testing.
//!
//! `MockChatDirectory` implements `ChatDirectory` over a small fake guild.
//! Writes change the fake guild the way the platform would, every write is
//! captured for assertions, and the resulting gateway events are queued so a
//! test can feed them back into the router. Member updates carry the member's
//! state at delivery time, as a live gateway would report it.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use guildsync_core::{
    ChatDirectory, ChatId, GuildId, GuildMember, MutationKind, RemoteEvent, RoleId, SyncError,
};

use crate::lock;

/// One write call as received by the fake guild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteCall {
    pub kind: MutationKind,
    pub chat_id: ChatId,
    /// Nickname or role id; `None` for bans.
    pub target: Option<String>,
}

/// A gateway event waiting for delivery.
enum Queued {
    Member(ChatId),
    Banned(ChatId),
    Unbanned(ChatId),
}

#[derive(Default)]
struct Guild {
    members: HashMap<ChatId, GuildMember>,
    bans: HashSet<ChatId>,
    roles: HashMap<String, RoleId>,
}

/// A fake chat guild.
#[derive(Default)]
pub struct MockChatDirectory {
    guild: Mutex<Guild>,
    writes: Mutex<Vec<WriteCall>>,
    events: Mutex<Vec<Queued>>,
    rejections: Mutex<HashMap<MutationKind, String>>,
    delay: Mutex<Option<Duration>>,
    list_calls: AtomicUsize,
    fail_lists: AtomicBool,
}

impl MockChatDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_role(&self, name: &str, id: &str) {
        lock(&self.guild)
            .roles
            .insert(name.to_string(), RoleId::from(id));
    }

    pub fn add_member(&self, member: GuildMember) {
        lock(&self.guild)
            .members
            .insert(member.chat_id.clone(), member);
    }

    pub fn add_ban(&self, chat_id: &str) {
        lock(&self.guild).bans.insert(ChatId::from(chat_id));
    }

    pub fn member(&self, chat_id: &str) -> Option<GuildMember> {
        lock(&self.guild).members.get(&ChatId::from(chat_id)).cloned()
    }

    pub fn is_banned(&self, chat_id: &str) -> bool {
        lock(&self.guild).bans.contains(&ChatId::from(chat_id))
    }

    /// Simulate an admin editing a member by hand. Returns the gateway event
    /// the platform would emit; nothing is queued or recorded as a write.
    pub fn admin_edit(
        &self,
        chat_id: &str,
        edit: impl FnOnce(&mut GuildMember),
    ) -> Option<RemoteEvent> {
        let mut guild = lock(&self.guild);
        let member = guild.members.get_mut(&ChatId::from(chat_id))?;
        edit(member);
        Some(RemoteEvent::MemberUpdated(member.clone()))
    }

    /// Delay every call, reads included.
    pub fn set_delay(&self, delay: Duration) {
        *lock(&self.delay) = Some(delay);
    }

    /// Make the three list calls fail until switched off.
    pub fn fail_lists(&self, fail: bool) {
        self.fail_lists.store(fail, Ordering::SeqCst);
    }

    /// Reject every write of `kind` with `message` until cleared.
    pub fn reject(&self, kind: MutationKind, message: &str) {
        lock(&self.rejections).insert(kind, message.to_string());
    }

    pub fn clear_rejections(&self) {
        lock(&self.rejections).clear();
    }

    /// Number of full pulls (counted on `list_members`).
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> Vec<WriteCall> {
        lock(&self.writes).clone()
    }

    pub fn write_count(&self) -> usize {
        lock(&self.writes).len()
    }

    pub fn writes_of(&self, kind: MutationKind) -> usize {
        lock(&self.writes).iter().filter(|w| w.kind == kind).count()
    }

    /// Drain the gateway events produced by confirmed writes.
    pub fn take_events(&self) -> Vec<RemoteEvent> {
        let queued = std::mem::take(&mut *lock(&self.events));
        let guild = lock(&self.guild);
        queued
            .into_iter()
            .filter_map(|event| match event {
                Queued::Member(id) => guild
                    .members
                    .get(&id)
                    .cloned()
                    .map(RemoteEvent::MemberUpdated),
                Queued::Banned(id) => Some(RemoteEvent::BanAdded(id)),
                Queued::Unbanned(id) => Some(RemoteEvent::BanRemoved(id)),
            })
            .collect()
    }

    async fn pause(&self) {
        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn check_lists(&self, operation: &str) -> Result<(), SyncError> {
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(SyncError::remote(operation, "mock guild unavailable"));
        }
        Ok(())
    }

    /// Record, delay, then apply `change` to the member unless rejected.
    async fn write(
        &self,
        kind: MutationKind,
        chat_id: &ChatId,
        target: Option<&str>,
        change: impl FnOnce(&mut Guild) -> Result<Queued, String>,
    ) -> Result<(), SyncError> {
        let operation = kind.to_string();
        lock(&self.writes).push(WriteCall {
            kind,
            chat_id: chat_id.clone(),
            target: target.map(str::to_string),
        });
        self.pause().await;

        let rejection = lock(&self.rejections).get(&kind).cloned();
        if let Some(message) = rejection {
            return Err(SyncError::remote(operation, message));
        }

        let event = {
            let mut guild = lock(&self.guild);
            change(&mut *guild).map_err(|message| SyncError::remote(operation, message))?
        };
        lock(&self.events).push(event);
        Ok(())
    }
}

fn edit_member(
    guild: &mut Guild,
    chat_id: &ChatId,
    edit: impl FnOnce(&mut GuildMember),
) -> Result<Queued, String> {
    let member = guild
        .members
        .get_mut(chat_id)
        .ok_or_else(|| format!("unknown member {chat_id}"))?;
    edit(member);
    Ok(Queued::Member(chat_id.clone()))
}

fn known_role(guild: &Guild, role: &RoleId) -> Result<(), String> {
    if guild.roles.values().any(|r| r == role) {
        Ok(())
    } else {
        Err(format!("unknown role {role}"))
    }
}

#[async_trait]
impl ChatDirectory for MockChatDirectory {
    async fn list_members(&self, _guild: &GuildId) -> Result<Vec<GuildMember>, SyncError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.check_lists("list_members")?;
        Ok(lock(&self.guild).members.values().cloned().collect())
    }

    async fn list_bans(&self, _guild: &GuildId) -> Result<HashSet<ChatId>, SyncError> {
        self.pause().await;
        self.check_lists("list_bans")?;
        Ok(lock(&self.guild).bans.clone())
    }

    async fn list_roles(&self, _guild: &GuildId) -> Result<HashMap<String, RoleId>, SyncError> {
        self.pause().await;
        self.check_lists("list_roles")?;
        Ok(lock(&self.guild).roles.clone())
    }

    async fn set_nick(
        &self,
        _guild: &GuildId,
        member: &ChatId,
        nick: &str,
    ) -> Result<(), SyncError> {
        self.write(MutationKind::SetNick, member, Some(nick), |guild| {
            edit_member(guild, member, |m| m.nick = Some(nick.to_string()))
        })
        .await
    }

    async fn add_role(
        &self,
        _guild: &GuildId,
        member: &ChatId,
        role: &RoleId,
    ) -> Result<(), SyncError> {
        self.write(MutationKind::AddRole, member, Some(role.as_str()), |guild| {
            known_role(guild, role)?;
            edit_member(guild, member, |m| {
                m.role_ids.insert(role.clone());
            })
        })
        .await
    }

    async fn remove_role(
        &self,
        _guild: &GuildId,
        member: &ChatId,
        role: &RoleId,
    ) -> Result<(), SyncError> {
        self.write(MutationKind::RemoveRole, member, Some(role.as_str()), |guild| {
            known_role(guild, role)?;
            edit_member(guild, member, |m| {
                m.role_ids.remove(role);
            })
        })
        .await
    }

    async fn ban(&self, _guild: &GuildId, member: &ChatId) -> Result<(), SyncError> {
        self.write(MutationKind::Ban, member, None, |guild| {
            guild.bans.insert(member.clone());
            Ok(Queued::Banned(member.clone()))
        })
        .await
    }

    async fn unban(&self, _guild: &GuildId, member: &ChatId) -> Result<(), SyncError> {
        self.write(MutationKind::Unban, member, None, |guild| {
            guild.bans.remove(member);
            Ok(Queued::Unbanned(member.clone()))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guild() -> GuildId {
        GuildId::from("g")
    }

    #[tokio::test]
    async fn writes_change_the_fake_guild_and_queue_events() {
        let dir = MockChatDirectory::new();
        dir.add_role("Member", "r-1");
        dir.add_member(GuildMember::new("c-1"));

        ChatDirectory::add_role(&dir, &guild(), &ChatId::from("c-1"), &RoleId::from("r-1"))
            .await
            .unwrap();
        assert!(dir.member("c-1").unwrap().has_role(&RoleId::from("r-1")));
        assert_eq!(dir.writes_of(MutationKind::AddRole), 1);

        let events = dir.take_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], RemoteEvent::MemberUpdated(m) if m.chat_id.as_str() == "c-1"));
        assert!(dir.take_events().is_empty());
    }

    #[tokio::test]
    async fn rejected_writes_are_recorded_but_not_applied() {
        let dir = MockChatDirectory::new();
        dir.add_member(GuildMember::new("c-1"));
        dir.reject(MutationKind::SetNick, "missing permission");

        let err = dir
            .set_nick(&guild(), &ChatId::from("c-1"), "Alice")
            .await
            .unwrap_err();
        assert!(err.is_remote());
        assert_eq!(dir.member("c-1").unwrap().nick, None);
        assert_eq!(dir.write_count(), 1);
        assert!(dir.take_events().is_empty());
    }

    #[tokio::test]
    async fn unknown_role_is_refused() {
        let dir = MockChatDirectory::new();
        dir.add_member(GuildMember::new("c-1"));
        let err = ChatDirectory::add_role(&dir, &guild(), &ChatId::from("c-1"), &RoleId::from("ghost"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unknown role"));
    }
}
