// SPDX-FileCopyrightText: 2026 Guildsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound events from both directories.
//!
//! The host pushes these into the event router; the core never subscribes to
//! named hooks itself.

use std::collections::HashMap;

use strum::{Display, EnumString};

use crate::types::{ChatId, GameId, GuildMember, RoleId};

/// Events emitted by the game-server side (registry and link service).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalEvent {
    /// A player connected to the game server.
    Connected(GameId),
    /// A player finished linking their chat account.
    Linked { game_id: GameId, chat_id: ChatId },
    /// A player removed their chat link.
    Unlinked(GameId),
    GroupAdded { game_id: GameId, group: String },
    GroupRemoved { game_id: GameId, group: String },
    Banned(GameId),
    Unbanned(GameId),
    NameChanged(GameId),
}

/// Discriminant of [`LocalEvent`], used by the subscription table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum LocalEventKind {
    Connected,
    Linked,
    Unlinked,
    GroupAdded,
    GroupRemoved,
    Banned,
    Unbanned,
    NameChanged,
}

impl LocalEvent {
    pub fn kind(&self) -> LocalEventKind {
        match self {
            LocalEvent::Connected(_) => LocalEventKind::Connected,
            LocalEvent::Linked { .. } => LocalEventKind::Linked,
            LocalEvent::Unlinked(_) => LocalEventKind::Unlinked,
            LocalEvent::GroupAdded { .. } => LocalEventKind::GroupAdded,
            LocalEvent::GroupRemoved { .. } => LocalEventKind::GroupRemoved,
            LocalEvent::Banned(_) => LocalEventKind::Banned,
            LocalEvent::Unbanned(_) => LocalEventKind::Unbanned,
            LocalEvent::NameChanged(_) => LocalEventKind::NameChanged,
        }
    }

    pub fn game_id(&self) -> &GameId {
        match self {
            LocalEvent::Connected(id)
            | LocalEvent::Unlinked(id)
            | LocalEvent::Banned(id)
            | LocalEvent::Unbanned(id)
            | LocalEvent::NameChanged(id) => id,
            LocalEvent::Linked { game_id, .. }
            | LocalEvent::GroupAdded { game_id, .. }
            | LocalEvent::GroupRemoved { game_id, .. } => game_id,
        }
    }
}

/// Events observed on the chat guild.
///
/// `MemberUpdated` carries the member's full resulting state (nickname and
/// role set), the way chat gateways report member updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteEvent {
    MemberUpdated(GuildMember),
    MemberJoined(GuildMember),
    MemberLeft(ChatId),
    BanAdded(ChatId),
    BanRemoved(ChatId),
    /// The guild's role catalog changed; carries the full name -> id table.
    RolesUpdated(HashMap<String, RoleId>),
}

impl RemoteEvent {
    /// The chat account the event concerns, if it concerns one.
    pub fn chat_id(&self) -> Option<&ChatId> {
        match self {
            RemoteEvent::MemberUpdated(member) | RemoteEvent::MemberJoined(member) => {
                Some(&member.chat_id)
            }
            RemoteEvent::MemberLeft(id) | RemoteEvent::BanAdded(id) | RemoteEvent::BanRemoved(id) => {
                Some(id)
            }
            RemoteEvent::RolesUpdated(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_event_exposes_kind_and_game_id() {
        let event = LocalEvent::GroupAdded {
            game_id: GameId::from("76561198000000000"),
            group: "vip".into(),
        };
        assert_eq!(event.kind(), LocalEventKind::GroupAdded);
        assert_eq!(event.game_id().as_str(), "76561198000000000");
        assert_eq!(event.kind().to_string(), "GroupAdded");
    }

    #[test]
    fn role_catalog_events_have_no_chat_id() {
        assert!(RemoteEvent::RolesUpdated(HashMap::new()).chat_id().is_none());
        let ban = RemoteEvent::BanAdded(ChatId::from("c"));
        assert_eq!(ban.chat_id(), Some(&ChatId::from("c")));
    }
}
