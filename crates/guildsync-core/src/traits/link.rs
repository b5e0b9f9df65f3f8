// SPDX-FileCopyrightText: 2026 Guildsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity link service collaborator.

use async_trait::async_trait;

use crate::error::SyncError;
use crate::types::{ChatId, GameId};

/// Authoritative store of game account <-> chat account associations.
///
/// `Ok(None)` means "not linked" and is not a failure.
#[async_trait]
pub trait LinkService: Send + Sync + 'static {
    async fn chat_id_for(&self, game_id: &GameId) -> Result<Option<ChatId>, SyncError>;

    async fn game_id_for(&self, chat_id: &ChatId) -> Result<Option<GameId>, SyncError>;
}
