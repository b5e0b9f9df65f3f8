// SPDX-FileCopyrightText: 2026 Guildsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end reconciliation tests.
//!
//! `TestHarness` assembles a `SyncService` over the three mock collaborators
//! and offers helpers to seed players, drive events, and feed the fake
//! guild's gateway events back into the router.

use std::sync::Arc;

use guildsync_config::{FeatureToggles, RoleSetup, SyncConfig};
use guildsync_core::{GameId, GuildMember, LocalEvent, SyncError};
use guildsync_sync::{Collaborators, SyncService};

use crate::mock_chat::MockChatDirectory;
use crate::mock_game::MockGameRegistry;
use crate::mock_link::MockLinkService;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: SyncConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = SyncConfig::default();
        config.chat.bot_token = Some("test-token".into());
        config.chat.guild_id = Some("test-guild".into());
        config.sync = FeatureToggles::all();
        config.remote.call_timeout_ms = 1_000;
        Self { config }
    }

    pub fn with_features(mut self, features: FeatureToggles) -> Self {
        self.config.sync = features;
        self
    }

    /// Replace the group -> role table.
    pub fn with_role_setup(mut self, rows: Vec<RoleSetup>) -> Self {
        self.config.role_setup = rows;
        self
    }

    pub fn with_call_timeout_ms(mut self, ms: u64) -> Self {
        self.config.remote.call_timeout_ms = ms;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.config.router.workers = workers;
        self
    }

    /// Build the harness. The fake guild starts with the `Member`,
    /// `Donator` and `Supporter` roles.
    pub fn build(self) -> Result<TestHarness, SyncError> {
        let directory = Arc::new(MockChatDirectory::new());
        directory.add_role("Member", "r-member");
        directory.add_role("Donator", "r-donator");
        directory.add_role("Supporter", "r-supporter");
        let registry = Arc::new(MockGameRegistry::new());
        let links = Arc::new(MockLinkService::new());

        let service = SyncService::new(
            self.config.clone(),
            Collaborators {
                registry: registry.clone(),
                directory: directory.clone(),
                links: links.clone(),
            },
        )?;

        Ok(TestHarness {
            service: Arc::new(service),
            directory,
            registry,
            links,
            config: self.config,
        })
    }
}

/// A sync service wired to mock collaborators.
pub struct TestHarness {
    pub service: Arc<SyncService>,
    pub directory: Arc<MockChatDirectory>,
    pub registry: Arc<MockGameRegistry>,
    pub links: Arc<MockLinkService>,
    pub config: SyncConfig,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Seed a linked player who is a guild member with no nickname or roles.
    pub fn linked_player(&self, game_id: &str, chat_id: &str, name: &str) {
        self.registry.add_player(game_id, name);
        self.links.link(game_id, chat_id);
        self.directory.add_member(GuildMember::new(chat_id));
    }

    /// Dispatch a local event and wait until the router is idle.
    pub async fn local(&self, event: LocalEvent) {
        self.service.dispatch_local(event);
        self.settle().await;
    }

    pub async fn connect(&self, game_id: &str) {
        self.local(LocalEvent::Connected(GameId::from(game_id))).await;
    }

    pub async fn settle(&self) {
        self.service.router().wait_idle().await;
    }

    /// Feed every queued gateway event from the fake guild back into the
    /// router, then wait for any passes they caused. Returns how many events
    /// were delivered.
    pub async fn pump_remote_events(&self) -> usize {
        let events = self.directory.take_events();
        let count = events.len();
        for event in events {
            self.service.dispatch_remote(event).await;
        }
        self.settle().await;
        count
    }
}
