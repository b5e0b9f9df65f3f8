// SPDX-FileCopyrightText: 2026 Guildsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event router with a per-identity reconciliation state machine.
//!
//! Each game account moves `Idle -> Reconciling -> Idle`. A trigger for an
//! identity that is already reconciling is merged into a single pending
//! follow-up pass, so an identity never has more than one pass running and
//! one queued. Passes for different identities run concurrently, bounded by
//! a semaphore sized from `router.workers`.
//!
//! Remote events are first applied to the cache. Differences that echo this
//! process's own writes are dropped; genuine drift schedules a scoped pass
//! that writes the game-side truth back.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use guildsync_config::{FeatureToggles, SyncConfig};
use guildsync_core::{
    ChatId, GameId, GameRegistry, LocalEvent, LocalEventKind, MutationIntent, RemoteEvent,
    SyncError,
};
use tokio::sync::{Notify, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::applier::{BatchReport, MutationApplier};
use crate::cache::{Change, RemoteStateCache};
use crate::echo::EchoLedger;
use crate::engine::{self, LocalState, PassInput, Scope};
use crate::linker::{IdentityLinker, Link};
use crate::mapper::GroupRoleMapper;

/// Number of failed attempts kept for inspection.
pub const FAILURE_LOG_CAPACITY: usize = 64;

/// Externally visible state of one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterState {
    Idle,
    Reconciling,
    /// Reconciling, with a follow-up pass queued.
    Pending,
}

/// What a queued pass should look at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassRequest {
    pub scope: Scope,
    /// Chat account already known to the trigger; skips link resolution.
    pub chat_hint: Option<ChatId>,
}

impl PassRequest {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            chat_hint: None,
        }
    }

    pub fn full() -> Self {
        Self::new(Scope::full())
    }

    pub fn with_chat(mut self, chat_id: ChatId) -> Self {
        self.chat_hint = Some(chat_id);
        self
    }

    /// Fold a later trigger into this one: scopes widen, the newest hint wins.
    pub fn merge(self, later: PassRequest) -> PassRequest {
        PassRequest {
            scope: self.scope.union(later.scope),
            chat_hint: later.chat_hint.or(self.chat_hint),
        }
    }
}

/// One failed reconciliation attempt, kept in memory only.
#[derive(Debug, Clone)]
pub struct FailureRecord {
    pub at: DateTime<Utc>,
    pub game_id: GameId,
    /// The rejected intent, when the failure was a remote write.
    pub intent: Option<String>,
    pub error: String,
}

/// Local event kinds the router listens to under the given toggles.
///
/// Connect, link and unlink are always on; each property is gated inside the
/// pass instead.
pub fn subscriptions(features: FeatureToggles) -> HashSet<LocalEventKind> {
    let mut kinds = HashSet::from([
        LocalEventKind::Connected,
        LocalEventKind::Linked,
        LocalEventKind::Unlinked,
    ]);
    if features.roles {
        kinds.extend([LocalEventKind::GroupAdded, LocalEventKind::GroupRemoved]);
    }
    if features.ban {
        kinds.extend([LocalEventKind::Banned, LocalEventKind::Unbanned]);
    }
    if features.nick {
        kinds.insert(LocalEventKind::NameChanged);
    }
    kinds
}

struct Slot {
    pending: Option<PassRequest>,
    cancel: CancellationToken,
}

struct Inner {
    registry: Arc<dyn GameRegistry>,
    linker: IdentityLinker,
    cache: Arc<RemoteStateCache>,
    applier: Arc<MutationApplier>,
    echoes: Arc<EchoLedger>,
    config: ArcSwap<SyncConfig>,
    subscribed: ArcSwap<HashSet<LocalEventKind>>,
    slots: DashMap<GameId, Slot>,
    permits: Semaphore,
    tracker: TaskTracker,
    idle: Notify,
    failures: Mutex<VecDeque<FailureRecord>>,
    shutdown: CancellationToken,
}

/// Routes inbound events to reconciliation passes.
#[derive(Clone)]
pub struct EventRouter {
    inner: Arc<Inner>,
}

impl EventRouter {
    pub fn new(
        config: SyncConfig,
        registry: Arc<dyn GameRegistry>,
        linker: IdentityLinker,
        cache: Arc<RemoteStateCache>,
        applier: Arc<MutationApplier>,
        echoes: Arc<EchoLedger>,
    ) -> Self {
        let workers = config.router.workers.max(1);
        let subscribed = subscriptions(config.sync);
        debug!(workers, subscribed = subscribed.len(), "event router ready");
        Self {
            inner: Arc::new(Inner {
                registry,
                linker,
                cache,
                applier,
                echoes,
                config: ArcSwap::from_pointee(config),
                subscribed: ArcSwap::from_pointee(subscribed),
                slots: DashMap::new(),
                permits: Semaphore::new(workers),
                tracker: TaskTracker::new(),
                idle: Notify::new(),
                failures: Mutex::new(VecDeque::with_capacity(FAILURE_LOG_CAPACITY)),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Swap in a new configuration snapshot. Passes already running keep the
    /// snapshot they started with. The worker count is fixed at construction.
    pub fn reload(&self, config: SyncConfig) {
        self.inner
            .subscribed
            .store(Arc::new(subscriptions(config.sync)));
        self.inner.config.store(Arc::new(config));
    }

    pub fn config(&self) -> Arc<SyncConfig> {
        self.inner.config.load_full()
    }

    /// Handle an event from the game server.
    pub fn dispatch_local(&self, event: LocalEvent) {
        let kind = event.kind();
        if !self.inner.subscribed.load().contains(&kind) {
            debug!(event = %kind, "event kind not subscribed, ignored");
            return;
        }

        match event {
            LocalEvent::Connected(game_id) => self.submit(game_id, PassRequest::full()),
            LocalEvent::Linked { game_id, chat_id } => {
                self.submit(game_id, PassRequest::full().with_chat(chat_id))
            }
            LocalEvent::Unlinked(game_id) => self.cancel_identity(&game_id),
            LocalEvent::GroupAdded { game_id, group }
            | LocalEvent::GroupRemoved { game_id, group } => {
                self.submit(game_id, PassRequest::new(Scope::group(group)))
            }
            LocalEvent::Banned(game_id) | LocalEvent::Unbanned(game_id) => {
                self.submit(game_id, PassRequest::new(Scope::ban_only()))
            }
            LocalEvent::NameChanged(game_id) => {
                self.submit(game_id, PassRequest::new(Scope::nick_only()))
            }
        }
    }

    /// Handle an event observed on the guild.
    ///
    /// Updates the cache, drops echoes of our own writes, and schedules a
    /// pass for each linked identity whose guild state drifted.
    pub async fn dispatch_remote(&self, event: RemoteEvent) {
        let features = self.inner.config.load().sync;
        let mut drifted: Vec<(ChatId, Scope)> = Vec::new();

        for change in self.inner.cache.observe(&event) {
            if self.inner.echoes.is_echo(&change) {
                continue;
            }
            let scope = match &change {
                Change::Nick { .. } => Scope::nick_only(),
                Change::RoleAdded { .. } | Change::RoleRemoved { .. } => Scope::all_roles(),
                Change::Banned(_) | Change::Unbanned(_) => Scope::ban_only(),
                Change::Joined(_) => Scope::full(),
                Change::Left(_) | Change::RoleCatalog => continue,
            }
            .gated(features);
            let Some(chat_id) = change.chat_id() else {
                continue;
            };
            if scope.is_empty() {
                continue;
            }
            match drifted.iter_mut().find(|(c, _)| c == chat_id) {
                Some((_, existing)) => *existing = existing.clone().union(scope),
                None => drifted.push((chat_id.clone(), scope)),
            }
        }

        if drifted.is_empty() {
            return;
        }

        let mut links = self.inner.linker.scope();
        for (chat_id, scope) in drifted {
            match links.resolve_chat(&chat_id).await {
                Ok(Some(game_id)) => {
                    debug!(game_id = %game_id, chat_id = %chat_id, "remote drift detected");
                    self.submit(game_id, PassRequest::new(scope).with_chat(chat_id));
                }
                Ok(None) => debug!(chat_id = %chat_id, "drift on unlinked chat account ignored"),
                Err(e) => {
                    warn!(chat_id = %chat_id, error = %e, "could not resolve drifted chat account")
                }
            }
        }
    }

    /// Queue a pass for `game_id`, or merge it into the identity's pending one.
    pub fn submit(&self, game_id: GameId, request: PassRequest) {
        if self.inner.shutdown.is_cancelled() {
            debug!(game_id = %game_id, "router shut down, trigger dropped");
            return;
        }

        match self.inner.slots.entry(game_id.clone()) {
            Entry::Occupied(mut occupied) => {
                let slot = occupied.get_mut();
                if slot.cancel.is_cancelled() {
                    slot.cancel = self.inner.shutdown.child_token();
                }
                slot.pending = Some(match slot.pending.take() {
                    Some(queued) => queued.merge(request),
                    None => request,
                });
                debug!(game_id = %game_id, "identity busy, trigger coalesced");
            }
            Entry::Vacant(vacant) => {
                let cancel = self.inner.shutdown.child_token();
                vacant.insert(Slot {
                    pending: None,
                    cancel: cancel.clone(),
                });
                let inner = Arc::clone(&self.inner);
                self.inner
                    .tracker
                    .spawn(inner.drive(game_id, request, cancel));
            }
        }
    }

    /// Stop scheduling work for an identity that unlinked. Calls already sent
    /// complete; nothing further is issued.
    fn cancel_identity(&self, game_id: &GameId) {
        if let Some(mut slot) = self.inner.slots.get_mut(game_id) {
            slot.cancel.cancel();
            slot.pending = None;
            info!(game_id = %game_id, "identity unlinked, reconciliation cancelled");
        }
    }

    pub fn state_of(&self, game_id: &GameId) -> RouterState {
        match self.inner.slots.get(game_id) {
            None => RouterState::Idle,
            Some(slot) if slot.pending.is_some() => RouterState::Pending,
            Some(_) => RouterState::Reconciling,
        }
    }

    /// Most recent failures, oldest first.
    pub fn recent_failures(&self) -> Vec<FailureRecord> {
        match self.inner.failures.lock() {
            Ok(log) => log.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    /// Resolve once no identity is reconciling or queued.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.inner.slots.is_empty() {
                return;
            }
            notified.await;
        }
    }

    /// Refuse new triggers, cancel queued passes, and wait for calls already
    /// sent to finish.
    pub async fn shutdown(&self) {
        info!("event router shutting down");
        self.inner.shutdown.cancel();
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        debug!("event router drained");
    }
}

impl Inner {
    async fn drive(
        self: Arc<Self>,
        game_id: GameId,
        mut request: PassRequest,
        mut cancel: CancellationToken,
    ) {
        loop {
            if !cancel.is_cancelled() {
                match self.permits.acquire().await {
                    Ok(_permit) => self.run_pass(&game_id, request, &cancel).await,
                    Err(_) => warn!(game_id = %game_id, "worker pool closed"),
                }
            }

            match self.next_request(&game_id) {
                Some((next, token)) => {
                    request = next;
                    cancel = token;
                }
                None => break,
            }
        }

        if self.slots.is_empty() {
            self.idle.notify_waiters();
        }
    }

    /// Take the queued follow-up, or retire the slot if there is none.
    fn next_request(&self, game_id: &GameId) -> Option<(PassRequest, CancellationToken)> {
        loop {
            {
                let mut slot = self.slots.get_mut(game_id)?;
                if let Some(request) = slot.pending.take() {
                    return Some((request, slot.cancel.clone()));
                }
            }
            if self
                .slots
                .remove_if(game_id, |_, slot| slot.pending.is_none())
                .is_some()
            {
                return None;
            }
        }
    }

    async fn run_pass(&self, game_id: &GameId, request: PassRequest, cancel: &CancellationToken) {
        let config = self.config.load_full();
        let scope = request.scope.gated(config.sync);
        if scope.is_empty() {
            return;
        }

        match self
            .reconcile(game_id, &config, scope, request.chat_hint, cancel)
            .await
        {
            Ok(report) => {
                for (intent, error) in report.failures {
                    self.record_failure(game_id, Some(&intent), &error);
                }
            }
            Err(e) => {
                warn!(game_id = %game_id, error = %e, "reconciliation pass failed");
                self.record_failure(game_id, None, &e);
            }
        }
    }

    async fn reconcile(
        &self,
        game_id: &GameId,
        config: &SyncConfig,
        scope: Scope,
        chat_hint: Option<ChatId>,
        cancel: &CancellationToken,
    ) -> Result<BatchReport, SyncError> {
        let mut links = self.linker.scope();
        if let Some(chat_id) = chat_hint {
            links.assume(game_id.clone(), chat_id);
        }
        let chat_id = match links.resolve(game_id).await? {
            Link::Linked(chat_id) => chat_id,
            Link::NotLinked => return Ok(BatchReport::default()),
        };

        self.cache.ensure_loaded().await?;
        let local = self.local_state(game_id, &scope).await?;
        let mapper = GroupRoleMapper::from_config(&config.role_setup);

        let input = PassInput {
            game_id: game_id.clone(),
            chat_id,
            local,
            scope,
            features: config.sync,
        };
        let plan = engine::plan(&input, &self.cache, &mapper);
        if plan.is_empty() {
            debug!(game_id = %game_id, "identity already converged");
            return Ok(BatchReport::default());
        }

        info!(
            game_id = %game_id,
            intents = plan.intents.len(),
            "applying reconciliation plan"
        );
        Ok(self.applier.apply_batch(&plan.intents, cancel).await)
    }

    /// Ask the registry only for what the scope needs.
    async fn local_state(&self, game_id: &GameId, scope: &Scope) -> Result<LocalState, SyncError> {
        let mut local = LocalState::default();
        if scope.nick {
            local.display_name = self.registry.display_name(game_id).await?;
        }
        if scope.ban {
            local.banned = self.registry.is_banned(game_id).await?;
        }
        if scope.roles != engine::RoleScope::None {
            local.groups = self.registry.current_groups(game_id).await?;
        }
        Ok(local)
    }

    fn record_failure(&self, game_id: &GameId, intent: Option<&MutationIntent>, error: &SyncError) {
        let record = FailureRecord {
            at: Utc::now(),
            game_id: game_id.clone(),
            intent: intent.map(ToString::to_string),
            error: error.to_string(),
        };
        let mut log = match self.failures.lock() {
            Ok(log) => log,
            Err(poisoned) => poisoned.into_inner(),
        };
        if log.len() == FAILURE_LOG_CAPACITY {
            log.pop_front();
        }
        log.push_back(record);
    }
}
