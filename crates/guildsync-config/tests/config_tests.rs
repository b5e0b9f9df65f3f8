// SPDX-FileCopyrightText: 2026 Guildsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the guildsync configuration system.

use guildsync_config::diagnostic::ConfigError;
use guildsync_config::model::{RoleSetup, SyncConfig};
use guildsync_config::{load_and_validate_str, load_config_from_str};

/// Valid TOML with every known section deserializes successfully.
#[test]
fn valid_toml_deserializes_into_sync_config() {
    let toml = r#"
[chat]
bot_token = "bot-123"
guild_id = "998877"

[sync]
nick = true
ban = true
roles = false

[remote]
call_timeout_ms = 2500

[refresh]
auto_refresh = true
interval_secs = 120

[router]
workers = 4

[daemon]
log_level = "debug"

[[role_setup]]
game_group = "admin"
chat_role = "Staff"
"#;

    let config = load_and_validate_str(toml).expect("valid TOML should load");
    assert_eq!(config.chat.bot_token.as_deref(), Some("bot-123"));
    assert_eq!(config.chat.guild_id.as_deref(), Some("998877"));
    assert!(config.sync.nick);
    assert!(config.sync.ban);
    assert!(!config.sync.roles);
    assert_eq!(config.remote.call_timeout_ms, 2500);
    assert!(config.refresh.auto_refresh);
    assert_eq!(config.refresh.interval_secs, 120);
    assert_eq!(config.router.workers, 4);
    assert_eq!(config.daemon.log_level, "debug");
    assert_eq!(config.role_setup, vec![RoleSetup::new("admin", "Staff")]);
}

/// An empty document yields the stock defaults.
#[test]
fn missing_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");

    assert!(config.chat.bot_token.is_none());
    assert!(!config.sync.nick);
    assert!(!config.sync.ban);
    assert!(config.sync.roles);
    assert_eq!(config.remote.call_timeout_ms, 10_000);
    assert!(!config.refresh.auto_refresh);
    assert_eq!(config.refresh.interval_secs, 300);
    assert_eq!(config.router.workers, 8);
    assert_eq!(config.daemon.log_level, "info");
    assert_eq!(
        config.role_setup,
        vec![
            RoleSetup::new("default", "Member"),
            RoleSetup::new("vip", "Donator"),
        ]
    );
}

/// A user-supplied table replaces the stock table instead of appending to it.
#[test]
fn role_setup_replaces_default_table() {
    let toml = r#"
[[role_setup]]
game_group = "vip"
chat_role = "Supporter"
"#;
    let config = load_config_from_str(toml).expect("should load");
    assert_eq!(config.role_setup, vec![RoleSetup::new("vip", "Supporter")]);
}

/// Dotted overrides (what the env provider produces) land on the right key.
#[test]
fn dotted_override_sets_bot_token() {
    use figment::{Figment, providers::Serialized};

    let config: SyncConfig = Figment::new()
        .merge(Serialized::defaults(SyncConfig::default()))
        .merge(("chat.bot_token", "from-env"))
        .extract()
        .expect("should set bot_token via dot notation");

    assert_eq!(config.chat.bot_token.as_deref(), Some("from-env"));
}

/// Typos in a section produce an UnknownKey diagnostic with a suggestion.
#[test]
fn unknown_key_in_sync_suggests_correction() {
    let toml = r#"
[sync]
rolse = true
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject unknown field");
    assert!(errors.iter().any(|e| matches!(
        e,
        ConfigError::UnknownKey { key, suggestion, .. }
            if key == "rolse" && suggestion.as_deref() == Some("roles")
    )));
}

/// Unknown top-level sections are rejected.
#[test]
fn deny_unknown_fields_at_top_level() {
    let toml = r#"
[discord]
token = "x"
"#;

    let err = load_config_from_str(toml).expect_err("unknown section should be rejected");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("discord"),
        "error should mention unknown field, got: {err_str}"
    );
}

/// Wrong value types are reported as InvalidType.
#[test]
fn wrong_type_is_reported() {
    let toml = r#"
[router]
workers = "many"
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject string workers");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { .. } | ConfigError::Other(_)))
    );
}

/// Semantic validation runs after a successful parse.
#[test]
fn refresh_interval_floor_is_enforced() {
    let toml = r#"
[refresh]
auto_refresh = true
interval_secs = 10
"#;

    let errors = load_and_validate_str(toml).expect_err("interval below 60 should fail");
    assert!(errors.iter().any(
        |e| matches!(e, ConfigError::Validation { message } if message.contains("interval_secs"))
    ));
}
