// SPDX-FileCopyrightText: 2026 Guildsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits consumed by the reconciliation core.
//!
//! Implementations (gateway clients, plugin bridges, link databases) live
//! outside the core and are injected as `Arc<dyn Trait>`. All traits use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod chat;
pub mod game;
pub mod link;

pub use chat::ChatDirectory;
pub use game::GameRegistry;
pub use link::LinkService;
