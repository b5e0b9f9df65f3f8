// SPDX-FileCopyrightText: 2026 Guildsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for guildsync.
//!
//! Every failure here is scoped to a single identity or intent. Nothing in the
//! reconciliation core treats a `SyncError` as fatal to the process.

use std::time::Duration;

use thiserror::Error;

/// The error type used by the collaborator traits and the reconciliation core.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Configuration snapshot is unusable (missing guild id, bad mapping).
    #[error("configuration error: {0}")]
    Config(String),

    /// The identity link service could not be reached or answered badly.
    #[error("link service error: {message}")]
    Link {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The game-server registry failed to answer a state query.
    #[error("game registry error: {message}")]
    Registry {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A chat directory call failed (transport, permission, unknown role).
    #[error("remote {operation} failed: {message}")]
    Remote {
        operation: String,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A chat directory call exceeded its deadline.
    #[error("remote call timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Pulling the guild snapshot failed. Transient: the next trigger retries.
    #[error("cache refresh failed: {message}")]
    CacheRefresh {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Shorthand for a [`SyncError::Remote`] without an underlying source.
    pub fn remote(operation: impl Into<String>, message: impl Into<String>) -> Self {
        SyncError::Remote {
            operation: operation.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Whether this error came from a chat directory write or read.
    ///
    /// Timeouts count as remote errors.
    pub fn is_remote(&self) -> bool {
        matches!(self, SyncError::Remote { .. } | SyncError::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_classified_as_remote() {
        let err = SyncError::Timeout {
            duration: Duration::from_millis(250),
        };
        assert!(err.is_remote());
        assert!(SyncError::remote("ban", "forbidden").is_remote());
        assert!(!SyncError::Internal("x".into()).is_remote());
    }

    #[test]
    fn remote_error_message_names_operation() {
        let err = SyncError::remote("add_role", "missing permission");
        assert_eq!(err.to_string(), "remote add_role failed: missing permission");
    }
}
