// SPDX-FileCopyrightText: 2026 Guildsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Game-server registry collaborator.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::SyncError;
use crate::types::GameId;

/// Read-only view of the game-server user/group registry.
///
/// The registry is the source of truth for display names, ban flags and
/// group membership; the core never writes to it.
#[async_trait]
pub trait GameRegistry: Send + Sync + 'static {
    /// Groups currently held by the account.
    async fn current_groups(&self, game_id: &GameId) -> Result<BTreeSet<String>, SyncError>;

    /// Whether the account is banned on the game server.
    async fn is_banned(&self, game_id: &GameId) -> Result<bool, SyncError>;

    /// Current display name of the account.
    async fn display_name(&self, game_id: &GameId) -> Result<String, SyncError>;
}
