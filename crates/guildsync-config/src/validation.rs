// SPDX-FileCopyrightText: 2026 Guildsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that serde attributes cannot express, such
//! as the refresh interval floor and non-empty mapping rows.

use std::collections::HashSet;

use tracing::warn;

use crate::diagnostic::ConfigError;
use crate::model::{MIN_REFRESH_INTERVAL_SECS, SyncConfig};

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns every validation error found rather than stopping at the first.
pub fn validate_config(config: &SyncConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.has_credentials()
        && config
            .chat
            .guild_id
            .as_deref()
            .is_none_or(|g| g.trim().is_empty())
    {
        errors.push(ConfigError::Validation {
            message: "chat.guild_id must be set when chat.bot_token is configured".to_string(),
        });
    }

    if config.remote.call_timeout_ms == 0 {
        errors.push(ConfigError::Validation {
            message: "remote.call_timeout_ms must be greater than 0".to_string(),
        });
    }

    if config.router.workers == 0 {
        errors.push(ConfigError::Validation {
            message: "router.workers must be at least 1".to_string(),
        });
    }

    if config.refresh.auto_refresh && config.refresh.interval_secs < MIN_REFRESH_INTERVAL_SECS {
        errors.push(ConfigError::Validation {
            message: format!(
                "refresh.interval_secs must be at least {MIN_REFRESH_INTERVAL_SECS} when auto_refresh is enabled, got {}",
                config.refresh.interval_secs
            ),
        });
    }

    let mut seen_rows = HashSet::new();
    for (i, row) in config.role_setup.iter().enumerate() {
        if row.game_group.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("role_setup[{i}].game_group must not be empty"),
            });
        }
        if row.chat_role.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("role_setup[{i}].chat_role must not be empty"),
            });
        }
        // Repeated groups or roles are legal; an identical row is just noise.
        if !seen_rows.insert((&row.game_group, &row.chat_role)) {
            warn!(
                index = i,
                group = row.game_group.as_str(),
                role = row.chat_role.as_str(),
                "duplicate role_setup row"
            );
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
