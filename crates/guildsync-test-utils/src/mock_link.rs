// SPDX-FileCopyrightText: 2026 Guildsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock identity link service.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use guildsync_core::{ChatId, GameId, LinkService, SyncError};

use crate::lock;

/// In-memory game <-> chat association table.
#[derive(Default)]
pub struct MockLinkService {
    links: Mutex<HashMap<GameId, ChatId>>,
    failure: Mutex<Option<String>>,
    lookups: AtomicUsize,
    reverse_lookups: AtomicUsize,
}

impl MockLinkService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn link(&self, game_id: &str, chat_id: &str) {
        lock(&self.links).insert(GameId::from(game_id), ChatId::from(chat_id));
    }

    pub fn unlink(&self, game_id: &str) {
        lock(&self.links).remove(&GameId::from(game_id));
    }

    /// Fail the next lookup, in either direction, with `message`.
    pub fn fail_next(&self, message: &str) {
        *lock(&self.failure) = Some(message.to_string());
    }

    /// Number of game -> chat lookups.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Number of chat -> game lookups.
    pub fn reverse_lookup_count(&self) -> usize {
        self.reverse_lookups.load(Ordering::SeqCst)
    }

    fn check_failure(&self) -> Result<(), SyncError> {
        match lock(&self.failure).take() {
            Some(message) => Err(SyncError::Link {
                message,
                source: None,
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl LinkService for MockLinkService {
    async fn chat_id_for(&self, game_id: &GameId) -> Result<Option<ChatId>, SyncError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        Ok(lock(&self.links).get(game_id).cloned())
    }

    async fn game_id_for(&self, chat_id: &ChatId) -> Result<Option<GameId>, SyncError> {
        self.reverse_lookups.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        Ok(lock(&self.links)
            .iter()
            .find(|(_, c)| *c == chat_id)
            .map(|(g, _)| g.clone()))
    }
}
