// SPDX-FileCopyrightText: 2026 Guildsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for guildsync.
//!
//! Provides in-memory collaborators and a harness for fast, deterministic
//! tests without a game server or chat platform.
//!
//! # Components
//!
//! - [`MockChatDirectory`] - Fake guild with write capture and event queue
//! - [`MockGameRegistry`] - Mutable player table
//! - [`MockLinkService`] - Game <-> chat link table
//! - [`TestHarness`] - `SyncService` wired to the three mocks

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod harness;
pub mod mock_chat;
pub mod mock_game;
pub mod mock_link;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_chat::{MockChatDirectory, WriteCall};
pub use mock_game::MockGameRegistry;
pub use mock_link::MockLinkService;

/// A panicking test must not hide the fake's state from the next assertion.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
