// SPDX-FileCopyrightText: 2026 Guildsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sync service: wires the collaborators into the reconciliation core and
//! runs the periodic guild refresh until shutdown.

use std::sync::Arc;
use std::time::Duration;

use guildsync_config::SyncConfig;
use guildsync_config::model::MIN_REFRESH_INTERVAL_SECS;
use guildsync_core::{
    ChatDirectory, GameId, GameRegistry, GuildId, LinkService, LocalEvent, RemoteEvent, SyncError,
};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::applier::MutationApplier;
use crate::cache::RemoteStateCache;
use crate::echo::EchoLedger;
use crate::linker::IdentityLinker;
use crate::router::{EventRouter, PassRequest};

/// The three external systems the core talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub registry: Arc<dyn GameRegistry>,
    pub directory: Arc<dyn ChatDirectory>,
    pub links: Arc<dyn LinkService>,
}

pub struct SyncService {
    guild: GuildId,
    cache: Arc<RemoteStateCache>,
    applier: Arc<MutationApplier>,
    router: EventRouter,
    reloaded: Notify,
}

impl SyncService {
    /// Build the service for a validated configuration.
    ///
    /// Fails with [`SyncError::Config`] when no bot token or guild is
    /// configured; the host should then leave syncing disabled.
    pub fn new(config: SyncConfig, collaborators: Collaborators) -> Result<Self, SyncError> {
        if !config.has_credentials() {
            return Err(SyncError::Config(
                "chat.bot_token is not set, sync service disabled".to_string(),
            ));
        }
        let guild = config
            .chat
            .guild_id
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(GuildId::from)
            .ok_or_else(|| SyncError::Config("chat.guild_id is not set".to_string()))?;

        let timeout = Duration::from_millis(config.remote.call_timeout_ms);
        let echoes = Arc::new(EchoLedger::new());
        let cache = Arc::new(RemoteStateCache::new(
            Arc::clone(&collaborators.directory),
            guild.clone(),
            timeout,
        ));
        let applier = Arc::new(MutationApplier::new(
            Arc::clone(&collaborators.directory),
            Arc::clone(&cache),
            Arc::clone(&echoes),
            timeout,
        ));
        let router = EventRouter::new(
            config,
            collaborators.registry,
            IdentityLinker::new(collaborators.links),
            Arc::clone(&cache),
            Arc::clone(&applier),
            echoes,
        );

        Ok(Self {
            guild,
            cache,
            applier,
            router,
            reloaded: Notify::new(),
        })
    }

    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    pub fn cache(&self) -> &Arc<RemoteStateCache> {
        &self.cache
    }

    pub fn dispatch_local(&self, event: LocalEvent) {
        self.router.dispatch_local(event);
    }

    pub async fn dispatch_remote(&self, event: RemoteEvent) {
        self.router.dispatch_remote(event).await;
    }

    /// Full pass for each given identity, e.g. every player online.
    pub fn resync(&self, game_ids: impl IntoIterator<Item = GameId>) {
        for game_id in game_ids {
            self.router.submit(game_id, PassRequest::full());
        }
    }

    /// Apply a new configuration snapshot.
    ///
    /// Toggles, the role table, the call timeout and the refresh schedule take
    /// effect for the next pass. The guild and worker count do not change.
    pub fn reload(&self, config: SyncConfig) {
        if config.chat.guild_id.as_deref().map(str::trim) != Some(self.guild.as_str()) {
            warn!(guild = %self.guild, "chat.guild_id changes require a restart, keeping current guild");
        }
        self.applier
            .set_timeout(Duration::from_millis(config.remote.call_timeout_ms));
        self.router.reload(config);
        self.reloaded.notify_one();
        info!("sync configuration reloaded");
    }

    /// Run until `cancel` fires, then drain in-flight work.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), SyncError> {
        info!(guild = %self.guild, "sync service running");
        if let Err(e) = self.cache.ensure_loaded().await {
            warn!(error = %e, "initial guild load failed, retrying on first trigger");
        }

        loop {
            let every = refresh_every(&self.router.config());
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping sync service");
                    break;
                }
                _ = self.reloaded.notified() => {
                    debug!("refresh schedule re-read after reload");
                }
                _ = sleep_or_park(every) => {
                    if let Err(e) = self.cache.refresh().await {
                        warn!(error = %e, "scheduled guild refresh failed");
                    }
                }
            }
        }

        self.router.shutdown().await;
        info!("sync service stopped");
        Ok(())
    }
}

fn refresh_every(config: &SyncConfig) -> Option<Duration> {
    config.refresh.auto_refresh.then(|| {
        Duration::from_secs(config.refresh.interval_secs.max(MIN_REFRESH_INTERVAL_SECS))
    })
}

async fn sleep_or_park(every: Option<Duration>) {
    match every {
        Some(every) => tokio::time::sleep(every).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use guildsync_test_utils::{MockChatDirectory, MockGameRegistry, MockLinkService};

    use super::*;

    fn collaborators(directory: Arc<MockChatDirectory>) -> Collaborators {
        Collaborators {
            registry: Arc::new(MockGameRegistry::new()),
            directory,
            links: Arc::new(MockLinkService::new()),
        }
    }

    fn configured() -> SyncConfig {
        let mut config = SyncConfig::default();
        config.chat.bot_token = Some("token".into());
        config.chat.guild_id = Some("guild".into());
        config
    }

    #[test]
    fn missing_token_leaves_service_disabled() {
        let dir = Arc::new(MockChatDirectory::new());
        let err = SyncService::new(SyncConfig::default(), collaborators(dir)).err();
        assert!(matches!(err, Some(SyncError::Config(m)) if m.contains("bot_token")));
    }

    #[test]
    fn refresh_interval_is_floored() {
        let mut config = configured();
        assert_eq!(refresh_every(&config), None);
        config.refresh.auto_refresh = true;
        config.refresh.interval_secs = 5;
        assert_eq!(refresh_every(&config), Some(Duration::from_secs(60)));
    }

    #[tokio::test(start_paused = true)]
    async fn auto_refresh_pulls_on_schedule_until_cancelled() {
        let dir = Arc::new(MockChatDirectory::new());
        let mut config = configured();
        config.refresh.auto_refresh = true;
        config.refresh.interval_secs = 60;
        let service = Arc::new(SyncService::new(config, collaborators(dir.clone())).unwrap());

        let cancel = CancellationToken::new();
        let handle = tokio::spawn({
            let service = Arc::clone(&service);
            let cancel = cancel.clone();
            async move { service.run(cancel).await }
        });

        tokio::time::sleep(Duration::from_secs(150)).await;
        cancel.cancel();
        handle.await.unwrap().unwrap();

        // Initial load plus two scheduled pulls.
        assert_eq!(dir.list_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn no_scheduled_pulls_without_auto_refresh() {
        let dir = Arc::new(MockChatDirectory::new());
        let service = Arc::new(SyncService::new(configured(), collaborators(dir.clone())).unwrap());

        let cancel = CancellationToken::new();
        let handle = tokio::spawn({
            let service = Arc::clone(&service);
            let cancel = cancel.clone();
            async move { service.run(cancel).await }
        });

        tokio::time::sleep(Duration::from_secs(600)).await;
        cancel.cancel();
        handle.await.unwrap().unwrap();
        assert_eq!(dir.list_calls(), 1);
    }
}
