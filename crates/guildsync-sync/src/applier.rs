// SPDX-FileCopyrightText: 2026 Guildsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mutation applier: the only path that writes to the guild.
//!
//! At most one call per `(identity, kind, target)` is in flight; a duplicate
//! arriving meanwhile is dropped. Intents with different keys for the same
//! identity may run concurrently. Every call carries a deadline and a timeout
//! counts as a remote failure. Nothing is retried here.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashSet;
use guildsync_core::{ChatDirectory, GuildId, IntentKey, Mutation, MutationIntent, SyncError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::RemoteStateCache;
use crate::echo::EchoLedger;

/// Successful outcome of [`MutationApplier::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    /// The guild confirmed the write and the cache reflects it.
    Confirmed,
    /// An identical intent was already in flight; nothing was sent.
    Suppressed,
}

/// Outcome of [`MutationApplier::apply_batch`].
#[derive(Debug, Default)]
pub struct BatchReport {
    pub confirmed: usize,
    pub suppressed: usize,
    pub failures: Vec<(MutationIntent, SyncError)>,
    /// Intents left unsent because the identity was cancelled.
    pub skipped: usize,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Removes its key from the in-flight set on drop.
struct InFlight<'a> {
    set: &'a DashSet<IntentKey>,
    key: IntentKey,
}

impl<'a> InFlight<'a> {
    fn claim(set: &'a DashSet<IntentKey>, key: IntentKey) -> Option<Self> {
        if set.insert(key.clone()) {
            Some(Self { set, key })
        } else {
            None
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.key);
    }
}

pub struct MutationApplier {
    directory: Arc<dyn ChatDirectory>,
    guild: GuildId,
    cache: Arc<RemoteStateCache>,
    echoes: Arc<EchoLedger>,
    in_flight: DashSet<IntentKey>,
    timeout_ms: AtomicU64,
}

impl MutationApplier {
    pub fn new(
        directory: Arc<dyn ChatDirectory>,
        cache: Arc<RemoteStateCache>,
        echoes: Arc<EchoLedger>,
        timeout: Duration,
    ) -> Self {
        Self {
            directory,
            guild: cache.guild().clone(),
            cache,
            echoes,
            in_flight: DashSet::new(),
            timeout_ms: AtomicU64::new(duration_ms(timeout)),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.load(Ordering::Relaxed))
    }

    /// Applies to calls started after this returns.
    pub fn set_timeout(&self, timeout: Duration) {
        self.timeout_ms.store(duration_ms(timeout), Ordering::Relaxed);
    }

    /// Number of intents currently awaiting the guild.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Send one intent to the guild.
    ///
    /// On success the cache is patched with the confirmed value before this
    /// returns. On failure the cache is left alone.
    pub async fn apply(&self, intent: &MutationIntent) -> Result<Ack, SyncError> {
        let Some(_claim) = InFlight::claim(&self.in_flight, intent.key()) else {
            debug!(intent = %intent, "identical intent already in flight, dropped");
            return Ok(Ack::Suppressed);
        };

        self.echoes.record(&intent.chat_id, &intent.mutation);
        let timeout = self.timeout();
        let result = match tokio::time::timeout(timeout, self.send(intent)).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout { duration: timeout }),
        };
        // Past this point the cache diff recognizes late echoes on its own.
        self.echoes.forget(&intent.chat_id, &intent.mutation);

        match result {
            Ok(()) => {
                self.cache.apply_confirmed(&intent.chat_id, &intent.mutation);
                info!(intent = %intent, chat_id = %intent.chat_id, "mutation confirmed");
                Ok(Ack::Confirmed)
            }
            Err(e) => {
                warn!(intent = %intent, chat_id = %intent.chat_id, error = %e, "mutation failed");
                Err(e)
            }
        }
    }

    /// Apply a pass's intents in order. A failure is recorded and the batch
    /// continues; cancellation stops it before the next intent is sent.
    pub async fn apply_batch(
        &self,
        intents: &[MutationIntent],
        cancel: &CancellationToken,
    ) -> BatchReport {
        let mut report = BatchReport::default();
        for (i, intent) in intents.iter().enumerate() {
            if cancel.is_cancelled() {
                report.skipped = intents.len() - i;
                debug!(
                    game_id = %intent.game_id,
                    skipped = report.skipped,
                    "identity cancelled, remaining intents dropped"
                );
                break;
            }
            match self.apply(intent).await {
                Ok(Ack::Confirmed) => report.confirmed += 1,
                Ok(Ack::Suppressed) => report.suppressed += 1,
                Err(e) => report.failures.push((intent.clone(), e)),
            }
        }
        report
    }

    async fn send(&self, intent: &MutationIntent) -> Result<(), SyncError> {
        let member = &intent.chat_id;
        match &intent.mutation {
            Mutation::SetNick(nick) => self.directory.set_nick(&self.guild, member, nick).await,
            Mutation::AddRole { role_id, .. } => {
                self.directory.add_role(&self.guild, member, role_id).await
            }
            Mutation::RemoveRole { role_id, .. } => {
                self.directory.remove_role(&self.guild, member, role_id).await
            }
            Mutation::Ban => self.directory.ban(&self.guild, member).await,
            Mutation::Unban => self.directory.unban(&self.guild, member).await,
        }
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
