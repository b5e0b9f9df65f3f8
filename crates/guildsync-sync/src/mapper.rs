// SPDX-FileCopyrightText: 2026 Guildsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Static group -> role table.
//!
//! The table is an ordered list. Lookups return the first match in
//! declaration order; reconciliation walks every row, so a group mapped to
//! several roles (or several groups mapped to one role) is applied row by row.

use guildsync_config::RoleSetup;

/// One `(group, role)` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleMapping {
    pub group: String,
    pub role: String,
}

impl RoleMapping {
    pub fn new(group: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            role: role.into(),
        }
    }
}

impl From<&RoleSetup> for RoleMapping {
    fn from(row: &RoleSetup) -> Self {
        Self::new(row.game_group.clone(), row.chat_role.clone())
    }
}

/// Bidirectional lookup over the configured role table.
#[derive(Debug, Clone, Default)]
pub struct GroupRoleMapper {
    mappings: Vec<RoleMapping>,
}

impl GroupRoleMapper {
    pub fn new(mappings: Vec<RoleMapping>) -> Self {
        Self { mappings }
    }

    pub fn from_config(rows: &[RoleSetup]) -> Self {
        Self::new(rows.iter().map(RoleMapping::from).collect())
    }

    /// First role mapped from `group`.
    pub fn role_for(&self, group: &str) -> Option<&str> {
        self.mappings
            .iter()
            .find(|m| m.group == group)
            .map(|m| m.role.as_str())
    }

    /// First group mapped to `role`. Diagnostics only: reconciliation never
    /// reasons from role back to group.
    pub fn group_for(&self, role: &str) -> Option<&str> {
        self.mappings
            .iter()
            .find(|m| m.role == role)
            .map(|m| m.group.as_str())
    }

    /// All rows, in declaration order.
    pub fn entries(&self) -> impl Iterator<Item = &RoleMapping> {
        self.mappings.iter()
    }

    /// Every row whose group is `group`, in declaration order.
    pub fn mappings_for_group<'a>(
        &'a self,
        group: &'a str,
    ) -> impl Iterator<Item = &'a RoleMapping> + 'a {
        self.mappings.iter().filter(move |m| m.group == group)
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}
