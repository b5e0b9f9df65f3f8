// SPDX-FileCopyrightText: 2026 Guildsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bidirectional reconciliation core for guildsync.
//!
//! Given events from the game server or the chat guild, computes and applies
//! the minimal set of guild writes that bring nicknames, bans and roles in
//! line with the game-side state:
//!
//! - [`linker`] resolves game accounts to chat accounts per pass.
//! - [`cache`] mirrors the guild in memory and coalesces refreshes.
//! - [`mapper`] holds the ordered group -> role table.
//! - [`engine`] plans the writes for one identity as a pure function.
//! - [`applier`] issues writes with duplicate suppression and deadlines.
//! - [`router`] schedules passes per identity and filters echoes.
//! - [`service`] wires everything together and runs the refresh timer.

pub mod applier;
pub mod cache;
pub mod echo;
pub mod engine;
pub mod linker;
pub mod mapper;
pub mod router;
pub mod service;

pub use applier::{Ack, BatchReport, MutationApplier};
pub use cache::{Change, GuildSnapshot, RemoteStateCache};
pub use echo::EchoLedger;
pub use engine::{LocalState, PassInput, Plan, PlanDiagnostic, RoleScope, Scope, plan};
pub use linker::{IdentityLinker, Link, LinkScope};
pub use mapper::{GroupRoleMapper, RoleMapping};
pub use router::{EventRouter, FailureRecord, PassRequest, RouterState};
pub use service::{Collaborators, SyncService};
