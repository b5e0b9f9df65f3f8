// SPDX-FileCopyrightText: 2026 Guildsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./guildsync.toml` > `~/.config/guildsync/guildsync.toml`
//! > `/etc/guildsync/guildsync.toml` with environment variable overrides via the
//! `GUILDSYNC_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::SyncConfig;

/// System-wide config file location.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/guildsync/guildsync.toml";

/// Local config file name, resolved against the working directory.
pub const LOCAL_CONFIG_FILE: &str = "guildsync.toml";

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/guildsync/guildsync.toml`
/// 3. `~/.config/guildsync/guildsync.toml`
/// 4. `./guildsync.toml`
/// 5. `GUILDSYNC_*` environment variables
pub fn load_config() -> Result<SyncConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no file lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<SyncConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SyncConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<SyncConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SyncConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for the XDG lookup, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(SyncConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// `~/.config/guildsync/guildsync.toml`, when a config dir exists.
pub fn user_config_path() -> Option<std::path::PathBuf> {
    dirs::config_dir().map(|d| d.join("guildsync").join("guildsync.toml"))
}

/// Environment provider with explicit section mapping.
///
/// Uses `Env::map()` instead of `Env::split("_")` because key names contain
/// underscores: `GUILDSYNC_CHAT_BOT_TOKEN` must become `chat.bot_token`,
/// not `chat.bot.token`.
fn env_provider() -> Env {
    Env::prefixed("GUILDSYNC_").map(|key| map_env_key(key.as_str()).into())
}

/// Map a lowercased, prefix-stripped env var name to a dotted config path.
pub(crate) fn map_env_key(key: &str) -> String {
    const SECTIONS: [&str; 6] = ["chat", "sync", "remote", "refresh", "router", "daemon"];
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_first_section_only() {
        assert_eq!(map_env_key("chat_bot_token"), "chat.bot_token");
        assert_eq!(map_env_key("remote_call_timeout_ms"), "remote.call_timeout_ms");
        assert_eq!(map_env_key("refresh_auto_refresh"), "refresh.auto_refresh");
        assert_eq!(map_env_key("sync_nick"), "sync.nick");
        assert_eq!(map_env_key("unrelated"), "unrelated");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = load_config_from_path(Path::new("/nonexistent/guildsync.toml"))
            .expect("missing file should be silently skipped");
        assert_eq!(config.router.workers, 8);
    }
}
