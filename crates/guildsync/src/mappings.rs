// SPDX-FileCopyrightText: 2026 Guildsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `guildsync mappings`: print the group -> role table.
//!
//! Rows sharing a role, or a group mapped to several roles, are annotated
//! with what the first-match lookups resolve to.

use guildsync_config::SyncConfig;
use guildsync_sync::GroupRoleMapper;

pub fn table(config: &SyncConfig) -> Vec<String> {
    let mapper = GroupRoleMapper::from_config(&config.role_setup);
    if mapper.is_empty() {
        return vec!["no role_setup rows; role sync has nothing to do".to_string()];
    }

    let width = mapper.entries().map(|m| m.group.len()).max().unwrap_or(0);
    let mut lines = Vec::with_capacity(mapper.len());
    for row in mapper.entries() {
        let mut line = format!("{:<width$} -> {}", row.group, row.role);
        if mapper.role_for(&row.group) != Some(row.role.as_str()) {
            line.push_str("  [group also maps to an earlier role]");
        }
        if let Some(first) = mapper.group_for(&row.role) {
            if first != row.group {
                line.push_str(&format!("  [role shared with '{first}']"));
            }
        }
        lines.push(line);
    }
    lines
}

pub fn run(config: &SyncConfig) {
    if !config.sync.roles {
        println!("role sync is disabled (sync.roles = false)");
    }
    for line in table(config) {
        println!("{line}");
    }
}
