// SPDX-FileCopyrightText: 2026 Guildsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reconciliation engine.
//!
//! [`plan`] is a pure function of its inputs: the game-side state gathered for
//! one identity, the cached guild state, and the role table. It performs no
//! I/O and never retries. Intents come out in the order nick, ban, roles, and
//! the applier preserves that order.

use std::collections::BTreeSet;

use guildsync_config::FeatureToggles;
use guildsync_core::{ChatId, GameId, Mutation, MutationIntent, RoleId};
use tracing::{debug, warn};

use crate::cache::RemoteStateCache;
use crate::mapper::GroupRoleMapper;

/// Game-side desired state for one identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalState {
    pub display_name: String,
    pub banned: bool,
    pub groups: BTreeSet<String>,
}

/// Which role rows a pass looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RoleScope {
    #[default]
    None,
    All,
    /// Only rows whose group is in the set.
    Groups(BTreeSet<String>),
}

impl RoleScope {
    fn includes(&self, group: &str) -> bool {
        match self {
            RoleScope::None => false,
            RoleScope::All => true,
            RoleScope::Groups(groups) => groups.contains(group),
        }
    }

    fn union(self, other: RoleScope) -> RoleScope {
        match (self, other) {
            (RoleScope::All, _) | (_, RoleScope::All) => RoleScope::All,
            (RoleScope::None, other) | (other, RoleScope::None) => other,
            (RoleScope::Groups(mut a), RoleScope::Groups(b)) => {
                a.extend(b);
                RoleScope::Groups(a)
            }
        }
    }
}

/// The properties a trigger asks the engine to reconcile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    pub nick: bool,
    pub ban: bool,
    pub roles: RoleScope,
}

impl Scope {
    /// Every property: connect, link, resync.
    pub fn full() -> Self {
        Self {
            nick: true,
            ban: true,
            roles: RoleScope::All,
        }
    }

    pub fn nick_only() -> Self {
        Self {
            nick: true,
            ..Self::default()
        }
    }

    pub fn ban_only() -> Self {
        Self {
            ban: true,
            ..Self::default()
        }
    }

    pub fn all_roles() -> Self {
        Self {
            roles: RoleScope::All,
            ..Self::default()
        }
    }

    /// Only the role rows for `group`.
    pub fn group(group: impl Into<String>) -> Self {
        Self {
            roles: RoleScope::Groups(BTreeSet::from([group.into()])),
            ..Self::default()
        }
    }

    /// Widen to cover both scopes.
    pub fn union(self, other: Scope) -> Scope {
        Scope {
            nick: self.nick || other.nick,
            ban: self.ban || other.ban,
            roles: self.roles.union(other.roles),
        }
    }

    /// Drop properties whose sync feature is off.
    pub fn gated(self, features: FeatureToggles) -> Scope {
        Scope {
            nick: self.nick && features.nick,
            ban: self.ban && features.ban,
            roles: if features.roles {
                self.roles
            } else {
                RoleScope::None
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.nick && !self.ban && self.roles == RoleScope::None
    }
}

/// Everything the engine needs for one pass over one linked identity.
#[derive(Debug, Clone)]
pub struct PassInput {
    pub game_id: GameId,
    pub chat_id: ChatId,
    pub local: LocalState,
    pub scope: Scope,
    pub features: FeatureToggles,
}

/// Non-fatal findings from a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanDiagnostic {
    /// A configured role name has no match in the guild's role catalog.
    UnknownRole { group: String, role: String },
    /// The chat account is not a guild member; the pass was skipped.
    NotAMember,
}

/// Output of [`plan`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub intents: Vec<MutationIntent>,
    pub diagnostics: Vec<PlanDiagnostic>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }

    fn push(&mut self, intent: MutationIntent) {
        if !self.intents.contains(&intent) {
            self.intents.push(intent);
        }
    }
}

/// Compute the intents that bring the guild in line with `input.local`.
pub fn plan(input: &PassInput, cache: &RemoteStateCache, mapper: &GroupRoleMapper) -> Plan {
    let mut out = Plan::default();
    let scope = input.scope.clone().gated(input.features);
    if scope.is_empty() {
        return out;
    }

    // Every property needs the member record; bans of non-members are no-ops.
    let Some(member) = cache.member_of(&input.chat_id) else {
        debug!(
            game_id = %input.game_id,
            chat_id = %input.chat_id,
            "chat account is not a guild member, skipping pass"
        );
        out.diagnostics.push(PlanDiagnostic::NotAMember);
        return out;
    };

    let intent = |mutation| {
        MutationIntent::new(input.game_id.clone(), input.chat_id.clone(), mutation)
    };

    if scope.nick && member.nick.as_deref() != Some(input.local.display_name.as_str()) {
        out.push(intent(Mutation::SetNick(input.local.display_name.clone())));
    }

    if scope.ban {
        match (input.local.banned, cache.is_banned(&input.chat_id)) {
            (true, false) => out.push(intent(Mutation::Ban)),
            (false, true) => out.push(intent(Mutation::Unban)),
            _ => {}
        }
    }

    if scope.roles != RoleScope::None {
        let catalog = cache.roles_named(mapper.entries().map(|m| m.role.as_str()));

        // A role stays wanted while any held group maps to it, even when the
        // row under inspection does not.
        let granted: BTreeSet<&RoleId> = mapper
            .entries()
            .filter(|m| input.local.groups.contains(&m.group))
            .filter_map(|m| catalog.get(&m.role).and_then(Option::as_ref))
            .collect();

        for row in mapper.entries().filter(|m| scope.roles.includes(&m.group)) {
            let Some(role_id) = catalog.get(&row.role).and_then(Option::as_ref) else {
                warn!(
                    game_id = %input.game_id,
                    group = row.group.as_str(),
                    role = row.role.as_str(),
                    "mapped role not found in guild, skipping"
                );
                out.diagnostics.push(PlanDiagnostic::UnknownRole {
                    group: row.group.clone(),
                    role: row.role.clone(),
                });
                continue;
            };

            let desired = input.local.groups.contains(&row.group);
            let actual = member.has_role(role_id);
            if desired && !actual {
                out.push(intent(Mutation::AddRole {
                    role_id: role_id.clone(),
                    role_name: row.role.clone(),
                }));
            } else if !desired && actual && !granted.contains(role_id) {
                out.push(intent(Mutation::RemoveRole {
                    role_id: role_id.clone(),
                    role_name: row.role.clone(),
                }));
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use guildsync_core::{GuildId, GuildMember, MutationKind};
    use guildsync_test_utils::MockChatDirectory;
    use tracing_test::traced_test;

    use super::*;
    use crate::cache::GuildSnapshot;
    use crate::mapper::RoleMapping;

    fn cache(members: Vec<GuildMember>, bans: Vec<&str>) -> RemoteStateCache {
        let snapshot = GuildSnapshot::new(
            members,
            bans.into_iter().map(ChatId::from),
            [
                ("Member".to_string(), RoleId::from("r-member")),
                ("Donator".to_string(), RoleId::from("r-donator")),
                ("Supporter".to_string(), RoleId::from("r-supporter")),
            ],
        );
        RemoteStateCache::with_snapshot(
            Arc::new(MockChatDirectory::new()),
            GuildId::from("guild"),
            Duration::from_secs(1),
            snapshot,
        )
    }

    fn mapper() -> GroupRoleMapper {
        GroupRoleMapper::new(vec![
            RoleMapping::new("default", "Member"),
            RoleMapping::new("vip", "Donator"),
        ])
    }

    fn input(groups: &[&str], scope: Scope) -> PassInput {
        PassInput {
            game_id: GameId::from("P"),
            chat_id: ChatId::from("c-1"),
            local: LocalState {
                display_name: "Alice".into(),
                banned: false,
                groups: groups.iter().map(|g| g.to_string()).collect(),
            },
            scope,
            features: FeatureToggles::all(),
        }
    }

    fn member() -> GuildMember {
        GuildMember::new("c-1").with_nick("Alice").with_role("r-member")
    }

    #[test]
    fn converged_identity_yields_nothing() {
        let cache = cache(vec![member()], vec![]);
        let plan = plan(&input(&["default"], Scope::full()), &cache, &mapper());
        assert!(plan.is_empty());
        assert!(plan.diagnostics.is_empty());
    }

    #[test]
    fn vip_gain_emits_exactly_one_add_role() {
        let cache = cache(vec![member()], vec![]);
        let plan = plan(&input(&["default", "vip"], Scope::group("vip")), &cache, &mapper());
        assert_eq!(plan.intents.len(), 1);
        assert_eq!(plan.intents[0].to_string(), "AddRole(P, Donator)");
    }

    #[test]
    fn intents_come_out_nick_ban_roles() {
        let cache = cache(vec![GuildMember::new("c-1").with_nick("old")], vec![]);
        let mut input = input(&["default"], Scope::full());
        input.local.banned = true;

        let kinds: Vec<MutationKind> = plan(&input, &cache, &mapper())
            .intents
            .iter()
            .map(|i| i.kind())
            .collect();
        assert_eq!(
            kinds,
            vec![MutationKind::SetNick, MutationKind::Ban, MutationKind::AddRole]
        );
    }

    #[test]
    fn missing_nick_differs_from_any_name() {
        let cache = cache(vec![GuildMember::new("c-1").with_role("r-member")], vec![]);
        let plan = plan(&input(&["default"], Scope::nick_only()), &cache, &mapper());
        assert_eq!(plan.intents[0].mutation, Mutation::SetNick("Alice".into()));
    }

    #[test]
    fn nick_comparison_is_case_sensitive() {
        let cache = cache(vec![GuildMember::new("c-1").with_nick("alice")], vec![]);
        let plan = plan(&input(&[], Scope::nick_only()), &cache, &mapper());
        assert_eq!(plan.intents.len(), 1);
    }

    #[test]
    fn unban_when_locally_cleared() {
        let cache = cache(vec![member()], vec!["c-1"]);
        let plan = plan(&input(&["default"], Scope::ban_only()), &cache, &mapper());
        assert_eq!(plan.intents.len(), 1);
        assert_eq!(plan.intents[0].mutation, Mutation::Unban);
    }

    #[test]
    fn banned_non_member_is_skipped_without_error() {
        let cache = cache(vec![], vec![]);
        let mut input = input(&["default"], Scope::full());
        input.local.banned = true;

        let plan = plan(&input, &cache, &mapper());
        assert!(plan.is_empty());
        assert_eq!(plan.diagnostics, vec![PlanDiagnostic::NotAMember]);
    }

    #[test]
    fn lost_group_removes_role() {
        let cache = cache(
            vec![member().with_role("r-donator")],
            vec![],
        );
        let plan = plan(&input(&["default"], Scope::all_roles()), &cache, &mapper());
        assert_eq!(plan.intents.len(), 1);
        assert_eq!(plan.intents[0].to_string(), "RemoveRole(P, Donator)");
    }

    #[test]
    fn group_scope_ignores_other_rows() {
        // Nick and the "default" row are both off, but only "vip" is in scope.
        let cache = cache(vec![GuildMember::new("c-1").with_nick("old")], vec![]);
        let plan = plan(&input(&["default"], Scope::group("vip")), &cache, &mapper());
        assert!(plan.is_empty());
    }

    #[test]
    fn disabled_features_gate_the_scope() {
        let cache = cache(vec![GuildMember::new("c-1").with_nick("old")], vec!["c-1"]);
        let mut input = input(&["default", "vip"], Scope::full());
        input.features = FeatureToggles::default();

        let kinds: Vec<MutationKind> = plan(&input, &cache, &mapper())
            .intents
            .iter()
            .map(|i| i.kind())
            .collect();
        assert_eq!(kinds, vec![MutationKind::AddRole, MutationKind::AddRole]);
    }

    #[test]
    #[traced_test]
    fn misspelled_role_is_logged_and_skipped() {
        let cache = cache(vec![member()], vec![]);
        let mapper = GroupRoleMapper::new(vec![
            RoleMapping::new("vip", "Supportter"),
            RoleMapping::new("vip", "Donator"),
        ]);
        let plan = plan(&input(&["vip"], Scope::all_roles()), &cache, &mapper);

        assert_eq!(plan.intents.len(), 1);
        assert_eq!(plan.intents[0].to_string(), "AddRole(P, Donator)");
        assert_eq!(
            plan.diagnostics,
            vec![PlanDiagnostic::UnknownRole {
                group: "vip".into(),
                role: "Supportter".into(),
            }]
        );
        assert!(logs_contain("mapped role not found in guild"));
    }

    #[test]
    fn role_shared_by_two_groups_is_kept_while_either_is_held() {
        let cache = cache(vec![member()], vec![]);
        let mapper = GroupRoleMapper::new(vec![
            RoleMapping::new("admin", "Member"),
            RoleMapping::new("default", "Member"),
        ]);
        let plan = plan(&input(&["default"], Scope::all_roles()), &cache, &mapper);
        assert!(plan.is_empty());
    }

    #[test]
    fn group_mapped_to_several_roles_applies_each_row() {
        let cache = cache(vec![GuildMember::new("c-1")], vec![]);
        let mapper = GroupRoleMapper::new(vec![
            RoleMapping::new("vip", "Donator"),
            RoleMapping::new("vip", "Supporter"),
            RoleMapping::new("vip", "Donator"),
        ]);
        let names: Vec<String> = plan(&input(&["vip"], Scope::group("vip")), &cache, &mapper)
            .intents
            .iter()
            .map(|i| i.to_string())
            .collect();
        assert_eq!(names, vec!["AddRole(P, Donator)", "AddRole(P, Supporter)"]);
    }

    #[test]
    fn scope_union_widens() {
        let merged = Scope::group("a").union(Scope::group("b")).union(Scope::nick_only());
        assert!(merged.nick);
        assert!(!merged.ban);
        assert_eq!(
            merged.roles,
            RoleScope::Groups(BTreeSet::from(["a".to_string(), "b".to_string()]))
        );
        assert_eq!(Scope::group("a").union(Scope::full()), Scope::full());
    }
}
