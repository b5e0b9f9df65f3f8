// SPDX-FileCopyrightText: 2026 Guildsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory mirror of the chat guild: members, roles, and bans.
//!
//! The current [`GuildSnapshot`] sits behind an `ArcSwapOption`, so readers
//! never take a lock beyond a dashmap shard. A full refresh builds a new
//! snapshot off to the side and swaps it in; confirmed writes and remote
//! events patch the current snapshot in place.
//!
//! Concurrent refresh requests coalesce: a caller that finds a refresh already
//! running waits for it and reuses its outcome instead of starting another.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use dashmap::{DashMap, DashSet};
use guildsync_core::{
    ChatDirectory, ChatId, GuildId, GuildMember, Mutation, RemoteEvent, RoleId, SyncError,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// One full pull of the guild, indexed for lookups.
#[derive(Debug, Default)]
pub struct GuildSnapshot {
    members: DashMap<ChatId, GuildMember>,
    bans: DashSet<ChatId>,
    roles: DashMap<String, RoleId>,
}

impl GuildSnapshot {
    pub fn new(
        members: impl IntoIterator<Item = GuildMember>,
        bans: impl IntoIterator<Item = ChatId>,
        roles: impl IntoIterator<Item = (String, RoleId)>,
    ) -> Self {
        Self {
            members: members
                .into_iter()
                .map(|m| (m.chat_id.clone(), m))
                .collect(),
            bans: bans.into_iter().collect(),
            roles: roles.into_iter().collect(),
        }
    }
}

/// A difference between the mirror and an inbound remote event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Nick { chat_id: ChatId, nick: Option<String> },
    RoleAdded { chat_id: ChatId, role_id: RoleId },
    RoleRemoved { chat_id: ChatId, role_id: RoleId },
    Banned(ChatId),
    Unbanned(ChatId),
    Joined(ChatId),
    Left(ChatId),
    RoleCatalog,
}

impl Change {
    pub fn chat_id(&self) -> Option<&ChatId> {
        match self {
            Change::Nick { chat_id, .. }
            | Change::RoleAdded { chat_id, .. }
            | Change::RoleRemoved { chat_id, .. } => Some(chat_id),
            Change::Banned(id) | Change::Unbanned(id) | Change::Joined(id) | Change::Left(id) => {
                Some(id)
            }
            Change::RoleCatalog => None,
        }
    }
}

/// Remote state cache for one guild.
pub struct RemoteStateCache {
    directory: Arc<dyn ChatDirectory>,
    guild: GuildId,
    timeout: Duration,
    snapshot: ArcSwapOption<GuildSnapshot>,
    stale: AtomicBool,
    /// Bumped after every refresh attempt, successful or not.
    attempts: AtomicU64,
    refresh_lock: Mutex<()>,
}

impl RemoteStateCache {
    /// An empty cache; the first guild-bound operation loads it.
    pub fn new(directory: Arc<dyn ChatDirectory>, guild: GuildId, timeout: Duration) -> Self {
        Self {
            directory,
            guild,
            timeout,
            snapshot: ArcSwapOption::empty(),
            stale: AtomicBool::new(false),
            attempts: AtomicU64::new(0),
            refresh_lock: Mutex::new(()),
        }
    }

    /// A cache already holding `snapshot`.
    pub fn with_snapshot(
        directory: Arc<dyn ChatDirectory>,
        guild: GuildId,
        timeout: Duration,
        snapshot: GuildSnapshot,
    ) -> Self {
        let cache = Self::new(directory, guild, timeout);
        cache.snapshot.store(Some(Arc::new(snapshot)));
        cache
    }

    pub fn guild(&self) -> &GuildId {
        &self.guild
    }

    pub fn is_loaded(&self) -> bool {
        self.snapshot.load().is_some()
    }

    /// Force the next [`ensure_loaded`](Self::ensure_loaded) to pull again.
    pub fn mark_stale(&self) {
        self.stale.store(true, Ordering::Release);
    }

    /// Load the snapshot if it was never loaded or was marked stale.
    pub async fn ensure_loaded(&self) -> Result<(), SyncError> {
        if self.is_loaded() && !self.stale.load(Ordering::Acquire) {
            return Ok(());
        }
        self.refresh().await
    }

    /// Pull members, bans and roles and swap in a new snapshot.
    ///
    /// On failure the old snapshot stays in place and the cache is marked
    /// stale so the next trigger retries.
    pub async fn refresh(&self) -> Result<(), SyncError> {
        let observed = self.attempts.load(Ordering::Acquire);
        let _guard = self.refresh_lock.lock().await;

        if self.attempts.load(Ordering::Acquire) != observed {
            debug!(guild = %self.guild, "refresh coalesced into in-flight pull");
            return if self.is_loaded() && !self.stale.load(Ordering::Acquire) {
                Ok(())
            } else {
                Err(SyncError::CacheRefresh {
                    message: "coalesced refresh failed".to_string(),
                    source: None,
                })
            };
        }

        let result = self.pull().await;
        self.attempts.fetch_add(1, Ordering::AcqRel);

        match result {
            Ok(snapshot) => {
                info!(
                    guild = %self.guild,
                    members = snapshot.members.len(),
                    bans = snapshot.bans.len(),
                    roles = snapshot.roles.len(),
                    "guild snapshot refreshed"
                );
                self.snapshot.store(Some(Arc::new(snapshot)));
                self.stale.store(false, Ordering::Release);
                Ok(())
            }
            Err(e) => {
                warn!(guild = %self.guild, error = %e, "guild snapshot refresh failed");
                self.stale.store(true, Ordering::Release);
                Err(SyncError::CacheRefresh {
                    message: e.to_string(),
                    source: Some(Box::new(e)),
                })
            }
        }
    }

    async fn pull(&self) -> Result<GuildSnapshot, SyncError> {
        let pull = async {
            futures::try_join!(
                self.directory.list_members(&self.guild),
                self.directory.list_bans(&self.guild),
                self.directory.list_roles(&self.guild),
            )
        };
        let (members, bans, roles) = tokio::time::timeout(self.timeout, pull)
            .await
            .map_err(|_| SyncError::Timeout {
                duration: self.timeout,
            })??;
        Ok(GuildSnapshot::new(members, bans, roles))
    }

    pub fn member_of(&self, chat_id: &ChatId) -> Option<GuildMember> {
        let snapshot = self.snapshot.load_full();
        snapshot
            .as_ref()
            .and_then(|s| s.members.get(chat_id).map(|m| m.value().clone()))
    }

    pub fn role_named(&self, name: &str) -> Option<RoleId> {
        let snapshot = self.snapshot.load_full();
        snapshot
            .as_ref()
            .and_then(|s| s.roles.get(name).map(|r| r.value().clone()))
    }

    /// Resolve several role names at once; unknown names map to `None`.
    pub fn roles_named<'a>(
        &self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> HashMap<String, Option<RoleId>> {
        names
            .into_iter()
            .map(|name| (name.to_string(), self.role_named(name)))
            .collect()
    }

    pub fn bans_snapshot(&self) -> HashSet<ChatId> {
        let snapshot = self.snapshot.load_full();
        snapshot
            .as_ref()
            .map(|s| s.bans.iter().map(|id| id.key().clone()).collect())
            .unwrap_or_default()
    }

    pub fn is_banned(&self, chat_id: &ChatId) -> bool {
        let snapshot = self.snapshot.load_full();
        snapshot.as_ref().is_some_and(|s| s.bans.contains(chat_id))
    }

    /// Record a write the chat directory confirmed.
    pub fn apply_confirmed(&self, chat_id: &ChatId, mutation: &Mutation) {
        let snapshot = self.snapshot.load_full();
        let Some(snapshot) = snapshot.as_ref() else {
            return;
        };

        match mutation {
            Mutation::Ban => {
                snapshot.bans.insert(chat_id.clone());
            }
            Mutation::Unban => {
                snapshot.bans.remove(chat_id);
            }
            _ => {
                let Some(mut member) = snapshot.members.get_mut(chat_id) else {
                    debug!(chat_id = %chat_id, "confirmed write for member missing from cache");
                    return;
                };
                match mutation {
                    Mutation::SetNick(nick) => member.nick = Some(nick.clone()),
                    Mutation::AddRole { role_id, .. } => {
                        member.role_ids.insert(role_id.clone());
                    }
                    Mutation::RemoveRole { role_id, .. } => {
                        member.role_ids.remove(role_id);
                    }
                    Mutation::Ban | Mutation::Unban => {}
                }
            }
        }
    }

    /// Apply an inbound remote event and report what it changed.
    ///
    /// Returns nothing before the first load; the initial pull picks the
    /// change up instead.
    pub fn observe(&self, event: &RemoteEvent) -> Vec<Change> {
        let snapshot = self.snapshot.load_full();
        let Some(snapshot) = snapshot.as_ref() else {
            return Vec::new();
        };

        match event {
            RemoteEvent::MemberUpdated(updated) => {
                let Some(mut member) = snapshot.members.get_mut(&updated.chat_id) else {
                    snapshot
                        .members
                        .insert(updated.chat_id.clone(), updated.clone());
                    return vec![Change::Joined(updated.chat_id.clone())];
                };
                let changes = diff_member(&member, updated);
                *member = updated.clone();
                changes
            }
            RemoteEvent::MemberJoined(joined) => {
                snapshot
                    .members
                    .insert(joined.chat_id.clone(), joined.clone());
                vec![Change::Joined(joined.chat_id.clone())]
            }
            RemoteEvent::MemberLeft(chat_id) => match snapshot.members.remove(chat_id) {
                Some(_) => vec![Change::Left(chat_id.clone())],
                None => Vec::new(),
            },
            RemoteEvent::BanAdded(chat_id) => {
                if snapshot.bans.insert(chat_id.clone()) {
                    vec![Change::Banned(chat_id.clone())]
                } else {
                    Vec::new()
                }
            }
            RemoteEvent::BanRemoved(chat_id) => match snapshot.bans.remove(chat_id) {
                Some(_) => vec![Change::Unbanned(chat_id.clone())],
                None => Vec::new(),
            },
            RemoteEvent::RolesUpdated(catalog) => {
                snapshot.roles.clear();
                for (name, id) in catalog {
                    snapshot.roles.insert(name.clone(), id.clone());
                }
                vec![Change::RoleCatalog]
            }
        }
    }
}

fn diff_member(before: &GuildMember, after: &GuildMember) -> Vec<Change> {
    let mut changes = Vec::new();
    if before.nick != after.nick {
        changes.push(Change::Nick {
            chat_id: after.chat_id.clone(),
            nick: after.nick.clone(),
        });
    }
    for role_id in after.role_ids.difference(&before.role_ids) {
        changes.push(Change::RoleAdded {
            chat_id: after.chat_id.clone(),
            role_id: role_id.clone(),
        });
    }
    for role_id in before.role_ids.difference(&after.role_ids) {
        changes.push(Change::RoleRemoved {
            chat_id: after.chat_id.clone(),
            role_id: role_id.clone(),
        });
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use guildsync_test_utils::MockChatDirectory;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn directory() -> Arc<MockChatDirectory> {
        let dir = MockChatDirectory::new();
        dir.add_role("Member", "r-member");
        dir.add_role("Donator", "r-donator");
        dir.add_member(GuildMember::new("c-1").with_nick("Alice").with_role("r-member"));
        dir.add_ban("c-9");
        Arc::new(dir)
    }

    fn cache(dir: &Arc<MockChatDirectory>) -> RemoteStateCache {
        RemoteStateCache::new(dir.clone(), GuildId::from("guild"), TIMEOUT)
    }

    #[tokio::test]
    async fn loads_lazily_on_first_use() {
        let dir = directory();
        let cache = cache(&dir);
        assert!(!cache.is_loaded());
        assert!(cache.member_of(&ChatId::from("c-1")).is_none());

        cache.ensure_loaded().await.unwrap();
        cache.ensure_loaded().await.unwrap();
        assert_eq!(dir.list_calls(), 1);

        let member = cache.member_of(&ChatId::from("c-1")).unwrap();
        assert_eq!(member.nick.as_deref(), Some("Alice"));
        assert!(cache.is_banned(&ChatId::from("c-9")));
        assert_eq!(cache.role_named("Donator"), Some(RoleId::from("r-donator")));
    }

    #[tokio::test]
    async fn roles_named_marks_unknown_names_absent() {
        let dir = directory();
        let cache = cache(&dir);
        cache.ensure_loaded().await.unwrap();

        let roles = cache.roles_named(["Member", "Supportter"]);
        assert_eq!(roles["Member"], Some(RoleId::from("r-member")));
        assert_eq!(roles["Supportter"], None);
    }

    #[tokio::test]
    async fn concurrent_refreshes_coalesce() {
        let dir = directory();
        dir.set_delay(Duration::from_millis(50));
        let cache = Arc::new(cache(&dir));

        let a = tokio::spawn({
            let cache = cache.clone();
            async move { cache.refresh().await }
        });
        let b = tokio::spawn({
            let cache = cache.clone();
            async move { cache.refresh().await }
        });
        let c = tokio::spawn({
            let cache = cache.clone();
            async move { cache.refresh().await }
        });
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();
        c.await.unwrap().unwrap();

        assert_eq!(dir.list_calls(), 1);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_old_snapshot_and_retries_next_time() {
        let dir = directory();
        let cache = cache(&dir);
        cache.ensure_loaded().await.unwrap();

        dir.fail_lists(true);
        cache.mark_stale();
        let err = cache.ensure_loaded().await.unwrap_err();
        assert!(matches!(err, SyncError::CacheRefresh { .. }));
        assert!(cache.member_of(&ChatId::from("c-1")).is_some());

        dir.fail_lists(false);
        cache.ensure_loaded().await.unwrap();
        assert_eq!(dir.list_calls(), 3);
    }

    #[tokio::test]
    async fn confirmed_writes_patch_the_snapshot() {
        let dir = directory();
        let cache = cache(&dir);
        cache.ensure_loaded().await.unwrap();
        let chat = ChatId::from("c-1");

        cache.apply_confirmed(
            &chat,
            &Mutation::AddRole {
                role_id: RoleId::from("r-donator"),
                role_name: "Donator".into(),
            },
        );
        cache.apply_confirmed(&chat, &Mutation::SetNick("Alicia".into()));
        cache.apply_confirmed(&chat, &Mutation::Ban);

        let member = cache.member_of(&chat).unwrap();
        assert!(member.has_role(&RoleId::from("r-donator")));
        assert_eq!(member.nick.as_deref(), Some("Alicia"));
        assert!(cache.bans_snapshot().contains(&chat));

        cache.apply_confirmed(&ChatId::from("c-9"), &Mutation::Unban);
        assert!(!cache.is_banned(&ChatId::from("c-9")));
    }

    #[tokio::test]
    async fn observe_reports_member_differences() {
        let dir = directory();
        let cache = cache(&dir);
        cache.ensure_loaded().await.unwrap();

        let updated = GuildMember::new("c-1")
            .with_nick("Mallory")
            .with_role("r-donator");
        let changes = cache.observe(&RemoteEvent::MemberUpdated(updated));

        assert!(changes.contains(&Change::Nick {
            chat_id: ChatId::from("c-1"),
            nick: Some("Mallory".into()),
        }));
        assert!(changes.contains(&Change::RoleAdded {
            chat_id: ChatId::from("c-1"),
            role_id: RoleId::from("r-donator"),
        }));
        assert!(changes.contains(&Change::RoleRemoved {
            chat_id: ChatId::from("c-1"),
            role_id: RoleId::from("r-member"),
        }));
        assert_eq!(changes.len(), 3);

        // Replaying the same state is not a change.
        let again = GuildMember::new("c-1")
            .with_nick("Mallory")
            .with_role("r-donator");
        assert!(cache.observe(&RemoteEvent::MemberUpdated(again)).is_empty());
    }

    #[tokio::test]
    async fn observe_tracks_bans_and_departures() {
        let dir = directory();
        let cache = cache(&dir);
        cache.ensure_loaded().await.unwrap();

        let chat = ChatId::from("c-1");
        assert_eq!(
            cache.observe(&RemoteEvent::BanAdded(chat.clone())),
            vec![Change::Banned(chat.clone())]
        );
        assert!(cache.observe(&RemoteEvent::BanAdded(chat.clone())).is_empty());
        assert_eq!(
            cache.observe(&RemoteEvent::MemberLeft(chat.clone())),
            vec![Change::Left(chat.clone())]
        );
        assert!(cache.member_of(&chat).is_none());
    }

    #[tokio::test]
    async fn observe_before_load_is_ignored() {
        let dir = directory();
        let cache = cache(&dir);
        let changes = cache.observe(&RemoteEvent::BanAdded(ChatId::from("c-1")));
        assert!(changes.is_empty());
        assert_eq!(dir.list_calls(), 0);
    }
}
