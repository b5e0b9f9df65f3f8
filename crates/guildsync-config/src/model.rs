// SPDX-FileCopyrightText: 2026 Guildsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for guildsync.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level guildsync configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. Every section is optional and has sensible defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Chat platform credentials and target guild.
    #[serde(default)]
    pub chat: ChatConfig,

    /// Feature toggles for the three synchronized properties.
    #[serde(default)]
    pub sync: FeatureToggles,

    /// Remote call behaviour.
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Periodic full pulls of the guild snapshot.
    #[serde(default)]
    pub refresh: RefreshConfig,

    /// Event router worker pool.
    #[serde(default)]
    pub router: RouterConfig,

    /// Process-level settings.
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Game group -> chat role table, in declaration order.
    #[serde(default = "default_role_setup")]
    pub role_setup: Vec<RoleSetup>,
}

/// Chat platform credentials.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChatConfig {
    /// Bot token. `None` leaves the sync service disabled.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Id of the guild to keep in sync.
    #[serde(default)]
    pub guild_id: Option<String>,
}

/// Which properties are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureToggles {
    /// Copy game display names to guild nicknames.
    #[serde(default)]
    pub nick: bool,

    /// Mirror game bans as guild bans.
    #[serde(default)]
    pub ban: bool,

    /// Mirror game groups as guild roles.
    #[serde(default = "default_true")]
    pub roles: bool,
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self {
            nick: false,
            ban: false,
            roles: true,
        }
    }
}

impl FeatureToggles {
    pub fn all() -> Self {
        Self {
            nick: true,
            ban: true,
            roles: true,
        }
    }

    pub fn none() -> Self {
        Self {
            nick: false,
            ban: false,
            roles: false,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Remote call configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteConfig {
    /// Deadline for each chat directory call, in milliseconds.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: default_call_timeout_ms(),
        }
    }
}

fn default_call_timeout_ms() -> u64 {
    10_000
}

/// Periodic refresh configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RefreshConfig {
    /// Pull the full guild snapshot on a timer to correct drift.
    #[serde(default)]
    pub auto_refresh: bool,

    /// Seconds between pulls. Must be at least 60 when enabled.
    #[serde(default = "default_refresh_interval_secs")]
    pub interval_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            auto_refresh: false,
            interval_secs: default_refresh_interval_secs(),
        }
    }
}

fn default_refresh_interval_secs() -> u64 {
    300
}

/// Minimum accepted refresh interval.
pub const MIN_REFRESH_INTERVAL_SECS: u64 = 60;

/// Event router configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RouterConfig {
    /// Maximum number of reconciliation passes running at once.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

fn default_workers() -> usize {
    8
}

/// Process-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// One row of the group -> role table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RoleSetup {
    /// Permission group on the game server.
    pub game_group: String,

    /// Role name in the chat guild.
    pub chat_role: String,
}

impl RoleSetup {
    pub fn new(game_group: impl Into<String>, chat_role: impl Into<String>) -> Self {
        Self {
            game_group: game_group.into(),
            chat_role: chat_role.into(),
        }
    }
}

fn default_role_setup() -> Vec<RoleSetup> {
    vec![
        RoleSetup::new("default", "Member"),
        RoleSetup::new("vip", "Donator"),
    ]
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            chat: ChatConfig::default(),
            sync: FeatureToggles::default(),
            remote: RemoteConfig::default(),
            refresh: RefreshConfig::default(),
            router: RouterConfig::default(),
            daemon: DaemonConfig::default(),
            role_setup: default_role_setup(),
        }
    }
}

impl SyncConfig {
    /// Whether credentials are present for the sync service to start.
    pub fn has_credentials(&self) -> bool {
        self.chat
            .bot_token
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty())
    }
}
