// SPDX-FileCopyrightText: 2026 Guildsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for guildsync.
//!
//! Holds the identifiers and data model shared by every other crate, the
//! [`SyncError`] taxonomy, the inbound event enums, and the collaborator
//! traits through which the reconciliation core talks to the game-server
//! registry, the chat guild, and the identity link service.

pub mod error;
pub mod events;
pub mod traits;
pub mod types;

pub use error::SyncError;
pub use events::{LocalEvent, LocalEventKind, RemoteEvent};
pub use traits::{ChatDirectory, GameRegistry, LinkService};
pub use types::{
    ChatId, GameId, GuildId, GuildMember, Identity, IntentKey, Mutation, MutationIntent,
    MutationKind, Property, RoleId,
};
