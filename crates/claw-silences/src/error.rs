//! Error types for the claw-silences crate.

use thiserror::Error;

use crate::types::SilenceId;

/// Errors that can occur in the silence store.
#[derive(Debug, Error)]
pub enum SilenceError {
    /// The silence is malformed (empty matchers, inverted window, bad regex).
    #[error("invalid silence: {reason}")]
    Validation {
        /// The reason the silence is invalid.
        reason: String,
    },

    /// No silence is stored under the given identifier.
    #[error("silence not found: {id}")]
    NotFound {
        /// The silence ID that was not found.
        id: SilenceId,
    },

    /// A stored row could not be decoded.
    #[error("corrupt silence {id}: {reason}")]
    CorruptData {
        /// The ID of the unreadable row.
        id: SilenceId,
        /// What failed to decode.
        reason: String,
    },

    /// The backing engine failed (connection, statement, or transaction).
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Configuration could not be read or is invalid.
    #[error("config error: {0}")]
    Config(String),
}

impl SilenceError {
    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Returns true for errors caused by the caller's input rather than the store.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

/// Result type for silence operations.
pub type Result<T> = std::result::Result<T, SilenceError>;
