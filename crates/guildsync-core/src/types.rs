// SPDX-FileCopyrightText: 2026 Guildsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identifiers and the data model shared across the workspace.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

string_id!(
    /// Game-server account identifier (e.g. a Steam id).
    GameId
);
string_id!(
    /// Chat-platform account identifier.
    ChatId
);
string_id!(
    /// Chat-guild role identifier.
    RoleId
);
string_id!(
    /// Chat guild identifier.
    GuildId
);

/// A game account and, once linked, its chat account.
///
/// With `chat_id` absent no reconciliation is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pub game_id: GameId,
    pub chat_id: Option<ChatId>,
}

impl Identity {
    pub fn unlinked(game_id: GameId) -> Self {
        Self {
            game_id,
            chat_id: None,
        }
    }

    pub fn linked(game_id: GameId, chat_id: ChatId) -> Self {
        Self {
            game_id,
            chat_id: Some(chat_id),
        }
    }

    pub fn is_linked(&self) -> bool {
        self.chat_id.is_some()
    }
}

/// A member of the chat guild as mirrored by the remote state cache.
///
/// `nick` is `None` when the member has no guild nickname set. Ban status is
/// not stored here: bans are indexed separately because a banned account is
/// usually no longer a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildMember {
    pub chat_id: ChatId,
    pub nick: Option<String>,
    pub role_ids: HashSet<RoleId>,
}

impl GuildMember {
    pub fn new(chat_id: impl Into<ChatId>) -> Self {
        Self {
            chat_id: chat_id.into(),
            nick: None,
            role_ids: HashSet::new(),
        }
    }

    pub fn with_nick(mut self, nick: impl Into<String>) -> Self {
        self.nick = Some(nick.into());
        self
    }

    pub fn with_role(mut self, role_id: impl Into<RoleId>) -> Self {
        self.role_ids.insert(role_id.into());
        self
    }

    pub fn has_role(&self, role_id: &RoleId) -> bool {
        self.role_ids.contains(role_id)
    }
}

/// The five remote writes the core knows how to perform.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, Serialize,
    Deserialize,
)]
pub enum MutationKind {
    SetNick,
    AddRole,
    RemoveRole,
    Ban,
    Unban,
}

/// A single remote write together with its target value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    SetNick(String),
    AddRole { role_id: RoleId, role_name: String },
    RemoveRole { role_id: RoleId, role_name: String },
    Ban,
    Unban,
}

impl Mutation {
    pub fn kind(&self) -> MutationKind {
        match self {
            Mutation::SetNick(_) => MutationKind::SetNick,
            Mutation::AddRole { .. } => MutationKind::AddRole,
            Mutation::RemoveRole { .. } => MutationKind::RemoveRole,
            Mutation::Ban => MutationKind::Ban,
            Mutation::Unban => MutationKind::Unban,
        }
    }

    /// The target value: the nickname for `SetNick`, the role id for role
    /// writes, nothing for ban writes.
    pub fn target(&self) -> Option<&str> {
        match self {
            Mutation::SetNick(nick) => Some(nick),
            Mutation::AddRole { role_id, .. } | Mutation::RemoveRole { role_id, .. } => {
                Some(role_id.as_str())
            }
            Mutation::Ban | Mutation::Unban => None,
        }
    }

    /// The remote property this mutation writes.
    pub fn property(&self) -> Property {
        match self {
            Mutation::SetNick(_) => Property::Nick,
            Mutation::AddRole { role_id, .. } | Mutation::RemoveRole { role_id, .. } => {
                Property::Role(role_id.clone())
            }
            Mutation::Ban | Mutation::Unban => Property::Ban,
        }
    }
}

/// A remote property of one chat account that the core may write.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Property {
    Nick,
    Role(RoleId),
    Ban,
}

/// A proposed remote write for one identity, produced by the engine and
/// consumed by the applier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationIntent {
    pub game_id: GameId,
    pub chat_id: ChatId,
    pub mutation: Mutation,
}

impl MutationIntent {
    pub fn new(game_id: GameId, chat_id: ChatId, mutation: Mutation) -> Self {
        Self {
            game_id,
            chat_id,
            mutation,
        }
    }

    pub fn kind(&self) -> MutationKind {
        self.mutation.kind()
    }

    /// Key used for in-flight duplicate suppression.
    pub fn key(&self) -> IntentKey {
        IntentKey {
            game_id: self.game_id.clone(),
            kind: self.kind(),
            target: self.mutation.target().map(str::to_string),
        }
    }
}

impl fmt::Display for MutationIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.mutation {
            Mutation::SetNick(nick) => write!(f, "SetNick({}, {nick:?})", self.game_id),
            Mutation::AddRole { role_name, .. } => write!(f, "AddRole({}, {role_name})", self.game_id),
            Mutation::RemoveRole { role_name, .. } => {
                write!(f, "RemoveRole({}, {role_name})", self.game_id)
            }
            Mutation::Ban => write!(f, "Ban({})", self.game_id),
            Mutation::Unban => write!(f, "Unban({})", self.game_id),
        }
    }
}

/// `(identity, kind, target)` triple identifying an intent for deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IntentKey {
    pub game_id: GameId,
    pub kind: MutationKind,
    pub target: Option<String>,
}
