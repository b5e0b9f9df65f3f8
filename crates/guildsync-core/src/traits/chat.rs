// SPDX-FileCopyrightText: 2026 Guildsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat directory collaborator for the guild being synchronized.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use crate::error::SyncError;
use crate::types::{ChatId, GuildId, GuildMember, RoleId};

/// Read and write access to one chat platform's guild data.
///
/// Writes return `Ok(())` only once the platform confirmed them. Retry policy,
/// rate limiting and reconnection belong to the implementation.
#[async_trait]
pub trait ChatDirectory: Send + Sync + 'static {
    async fn list_members(&self, guild: &GuildId) -> Result<Vec<GuildMember>, SyncError>;

    async fn list_bans(&self, guild: &GuildId) -> Result<HashSet<ChatId>, SyncError>;

    /// Role catalog as a name -> id table.
    async fn list_roles(&self, guild: &GuildId) -> Result<HashMap<String, RoleId>, SyncError>;

    async fn set_nick(&self, guild: &GuildId, member: &ChatId, nick: &str)
    -> Result<(), SyncError>;

    async fn add_role(&self, guild: &GuildId, member: &ChatId, role: &RoleId)
    -> Result<(), SyncError>;

    async fn remove_role(
        &self,
        guild: &GuildId,
        member: &ChatId,
        role: &RoleId,
    ) -> Result<(), SyncError>;

    async fn ban(&self, guild: &GuildId, member: &ChatId) -> Result<(), SyncError>;

    async fn unban(&self, guild: &GuildId, member: &ChatId) -> Result<(), SyncError>;
}
