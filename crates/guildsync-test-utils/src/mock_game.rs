// SPDX-FileCopyrightText: 2026 Guildsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock game-server registry with mutable player records.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use guildsync_core::{GameId, GameRegistry, SyncError};

use crate::lock;

#[derive(Debug, Clone, Default)]
struct Player {
    name: String,
    banned: bool,
    groups: BTreeSet<String>,
}

/// A game registry backed by an in-memory player table.
///
/// Unknown players hold no groups and are not banned; asking for their
/// display name fails.
#[derive(Default)]
pub struct MockGameRegistry {
    players: Mutex<HashMap<GameId, Player>>,
    delay: Mutex<Option<Duration>>,
    failure: Mutex<Option<String>>,
    queries: AtomicUsize,
}

impl MockGameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_player(&self, game_id: &str, name: &str) {
        lock(&self.players).insert(
            GameId::from(game_id),
            Player {
                name: name.to_string(),
                ..Player::default()
            },
        );
    }

    pub fn grant_group(&self, game_id: &str, group: &str) {
        self.edit(game_id, |p| {
            p.groups.insert(group.to_string());
        });
    }

    pub fn revoke_group(&self, game_id: &str, group: &str) {
        self.edit(game_id, |p| {
            p.groups.remove(group);
        });
    }

    pub fn set_banned(&self, game_id: &str, banned: bool) {
        self.edit(game_id, |p| p.banned = banned);
    }

    pub fn rename(&self, game_id: &str, name: &str) {
        self.edit(game_id, |p| p.name = name.to_string());
    }

    /// Delay every query.
    pub fn set_delay(&self, delay: Duration) {
        *lock(&self.delay) = Some(delay);
    }

    /// Fail the next query with `message`.
    pub fn fail_next(&self, message: &str) {
        *lock(&self.failure) = Some(message.to_string());
    }

    /// Total number of queries answered or failed.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn edit(&self, game_id: &str, edit: impl FnOnce(&mut Player)) {
        let mut players = lock(&self.players);
        edit(players.entry(GameId::from(game_id)).or_default());
    }

    async fn begin(&self) -> Result<(), SyncError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failure = lock(&self.failure).take();
        match failure {
            Some(message) => Err(SyncError::Registry {
                message,
                source: None,
            }),
            None => Ok(()),
        }
    }

    fn player(&self, game_id: &GameId) -> Option<Player> {
        lock(&self.players).get(game_id).cloned()
    }
}

#[async_trait]
impl GameRegistry for MockGameRegistry {
    async fn current_groups(&self, game_id: &GameId) -> Result<BTreeSet<String>, SyncError> {
        self.begin().await?;
        Ok(self.player(game_id).map(|p| p.groups).unwrap_or_default())
    }

    async fn is_banned(&self, game_id: &GameId) -> Result<bool, SyncError> {
        self.begin().await?;
        Ok(self.player(game_id).is_some_and(|p| p.banned))
    }

    async fn display_name(&self, game_id: &GameId) -> Result<String, SyncError> {
        self.begin().await?;
        self.player(game_id)
            .map(|p| p.name)
            .ok_or_else(|| SyncError::Registry {
                message: format!("unknown player {game_id}"),
                source: None,
            })
    }
}
