// SPDX-FileCopyrightText: 2026 Guildsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `guildsync check`: summarize a configuration that passed validation.

use guildsync_config::SyncConfig;

fn on_off(flag: bool) -> &'static str {
    if flag { "on" } else { "off" }
}

/// Lines describing what a service built from `config` would do.
pub fn summary(config: &SyncConfig) -> Vec<String> {
    let mut lines = vec!["config ok".to_string()];

    lines.push(format!(
        "  sync: nick={} ban={} roles={}",
        on_off(config.sync.nick),
        on_off(config.sync.ban),
        on_off(config.sync.roles),
    ));

    let guild = config.chat.guild_id.as_deref().unwrap_or("<unset>");
    let service = if !config.has_credentials() {
        "disabled (chat.bot_token not set)"
    } else if config.chat.guild_id.is_none() {
        "disabled (chat.guild_id not set)"
    } else {
        "enabled"
    };
    lines.push(format!("  guild: {guild}, service {service}"));

    if config.refresh.auto_refresh {
        lines.push(format!("  refresh: every {}s", config.refresh.interval_secs));
    } else {
        lines.push("  refresh: off".to_string());
    }

    lines.push(format!(
        "  router: {} workers, call timeout {}ms",
        config.router.workers, config.remote.call_timeout_ms
    ));
    lines.push(format!("  role_setup: {} rows", config.role_setup.len()));
    lines
}

pub fn run(config: &SyncConfig) {
    for line in summary(config) {
        println!("{line}");
    }
    tracing::debug!(rows = config.role_setup.len(), "configuration checked");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_reports_disabled_service() {
        let lines = summary(&SyncConfig::default());
        assert_eq!(lines[0], "config ok");
        assert_eq!(lines[1], "  sync: nick=off ban=off roles=on");
        assert!(lines[2].contains("disabled (chat.bot_token not set)"));
        assert_eq!(lines[3], "  refresh: off");
        assert_eq!(lines[5], "  role_setup: 2 rows");
    }

    #[test]
    fn credentialed_config_reports_enabled_service() {
        let mut config = SyncConfig::default();
        config.chat.bot_token = Some("token".into());
        config.chat.guild_id = Some("123".into());
        config.refresh.auto_refresh = true;
        config.refresh.interval_secs = 120;

        let lines = summary(&config);
        assert_eq!(lines[2], "  guild: 123, service enabled");
        assert_eq!(lines[3], "  refresh: every 120s");
    }

    #[test]
    fn missing_guild_id_is_called_out() {
        let mut config = SyncConfig::default();
        config.chat.bot_token = Some("token".into());
        let lines = summary(&config);
        assert!(lines[2].contains("chat.guild_id not set"));
    }
}
