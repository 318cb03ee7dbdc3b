//! Error types and handling for the Surge library

use thiserror::Error;

/// Result type alias for Surge operations
pub type Result<T> = std::result::Result<T, SurgeError>;

/// Main error type for the Surge library
#[derive(Error, Debug)]
pub enum SurgeError {
    /// The requested claim would overwrite a slot a gating consumer has
    /// not released yet.
    ///
    /// This is a unit variant so `try_next` call sites can signal and
    /// discriminate capacity exhaustion without allocating.
    #[error("insufficient capacity in ring buffer")]
    InsufficientCapacity,

    /// Invalid argument at a call site
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Error message describing the rejected argument
        message: String,
    },

    /// A sequence barrier was alerted while waiting
    #[error("sequence barrier alerted")]
    Alerted,

    /// A timed wait strategy reached its deadline
    #[error("wait strategy timed out")]
    TimedOut,

    /// Operation not permitted in the current processor state
    #[error("illegal state: {message}")]
    IllegalState {
        /// Error message describing the state violation
        message: String,
    },
}

impl SurgeError {
    /// Create a new invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a new illegal state error
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable by retrying the operation
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::InsufficientCapacity | Self::TimedOut)
    }

    /// Check if this error is a cooperative shutdown signal
    pub fn is_alert(&self) -> bool {
        matches!(self, Self::Alerted)
    }
}
