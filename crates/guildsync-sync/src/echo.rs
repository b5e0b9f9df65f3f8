// SPDX-FileCopyrightText: 2026 Guildsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ledger of values this process wrote to the guild.
//!
//! The applier records each write before issuing it and forgets it once the
//! call settles. A guild event arriving in that window whose resulting value
//! equals the recorded one is the echo of our write, and the router drops it.
//! Echoes arriving after confirmation produce no cache difference at all, so
//! they never reach the ledger.

use dashmap::DashMap;
use guildsync_core::{ChatId, Mutation, Property};
use tracing::debug;

use crate::cache::Change;

/// The resulting value of a write, as the guild will report it back.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Written {
    Nick(String),
    HasRole(bool),
    Banned(bool),
}

fn written(mutation: &Mutation) -> (Property, Written) {
    let value = match mutation {
        Mutation::SetNick(nick) => Written::Nick(nick.clone()),
        Mutation::AddRole { .. } => Written::HasRole(true),
        Mutation::RemoveRole { .. } => Written::HasRole(false),
        Mutation::Ban => Written::Banned(true),
        Mutation::Unban => Written::Banned(false),
    };
    (mutation.property(), value)
}

fn observed(change: &Change) -> Option<(Property, Written)> {
    match change {
        Change::Nick {
            nick: Some(nick), ..
        } => Some((Property::Nick, Written::Nick(nick.clone()))),
        Change::RoleAdded { role_id, .. } => {
            Some((Property::Role(role_id.clone()), Written::HasRole(true)))
        }
        Change::RoleRemoved { role_id, .. } => {
            Some((Property::Role(role_id.clone()), Written::HasRole(false)))
        }
        Change::Banned(_) => Some((Property::Ban, Written::Banned(true))),
        Change::Unbanned(_) => Some((Property::Ban, Written::Banned(false))),
        // Never written by us: clearing a nick, joins, departures, catalog.
        Change::Nick { nick: None, .. }
        | Change::Joined(_)
        | Change::Left(_)
        | Change::RoleCatalog => None,
    }
}

#[derive(Debug, Default)]
pub struct EchoLedger {
    entries: DashMap<(ChatId, Property), Written>,
}

impl EchoLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember that `mutation` is about to be written for `chat_id`.
    pub fn record(&self, chat_id: &ChatId, mutation: &Mutation) {
        let (property, value) = written(mutation);
        self.entries.insert((chat_id.clone(), property), value);
    }

    /// Drop the entry for a settled write, unless a newer write to the same
    /// property replaced it in the meantime.
    pub fn forget(&self, chat_id: &ChatId, mutation: &Mutation) {
        let (property, value) = written(mutation);
        self.entries
            .remove_if(&(chat_id.clone(), property), |_, v| *v == value);
    }

    /// Whether `change` is the guild reporting one of our own writes.
    /// A match consumes the entry.
    pub fn is_echo(&self, change: &Change) -> bool {
        let (Some(chat_id), Some((property, value))) = (change.chat_id(), observed(change)) else {
            return false;
        };
        let echoed = self
            .entries
            .remove_if(&(chat_id.clone(), property), |_, v| *v == value)
            .is_some();
        if echoed {
            debug!(chat_id = %chat_id, change = ?change, "suppressed echo of own write");
        }
        echoed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
