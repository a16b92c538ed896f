//! Error types for the sync engine.

use crate::apply::{PhaseFailure, SyncPhase};
use ledgersync_protocol::{ExpenseId, UserId, ValidationError};
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// A record failed validation at the boundary.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Update target does not exist remotely.
    #[error("expense {0} not found on the remote store")]
    NotFound(ExpenseId),

    /// Remote store answered with a non-success status.
    #[error("server error ({status}): {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body.
        message: String,
    },

    /// Malformed request or response body.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// One phase of a sync attempt failed; later phases were not run.
    #[error("sync failed during {} phase: {}", .0.phase, .0.cause)]
    Phase(Box<PhaseFailure>),

    /// Another sync attempt for the same user is still running.
    #[error("a sync is already in progress for user {0}")]
    SyncInProgress(UserId),

    /// Sync was cancelled.
    #[error("sync cancelled")]
    Cancelled,

    /// Timeout.
    #[error("operation timed out")]
    Timeout,

    /// Local cache could not be read, written or edited.
    #[error("local cache error: {0}")]
    Cache(String),

    /// A pull would overwrite local changes that were never synced.
    #[error("local cache has unsynced changes: {0}")]
    UnsyncedChanges(String),
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if the operation that produced this error can be retried.
    ///
    /// A failed sync attempt is retryable only if its cause is transient and
    /// re-running the attempt cannot duplicate remote effects.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Timeout => true,
            SyncError::Server { status, .. } => *status >= 500,
            SyncError::Phase(failure) => failure.is_retry_safe() && failure.cause.is_retryable(),
            _ => false,
        }
    }

    /// Returns false only when a blind retry could duplicate records.
    pub fn is_retry_safe(&self) -> bool {
        match self {
            SyncError::Phase(failure) => failure.is_retry_safe(),
            _ => true,
        }
    }

    /// Returns the phase a failed attempt stopped in, if any.
    pub fn phase(&self) -> Option<SyncPhase> {
        match self {
            SyncError::Phase(failure) => Some(failure.phase),
            _ => None,
        }
    }

    /// Returns the phase failure details, if this is a failed attempt.
    pub fn phase_failure(&self) -> Option<&PhaseFailure> {
        match self {
            SyncError::Phase(failure) => Some(failure),
            _ => None,
        }
    }
}

impl From<PhaseFailure> for SyncError {
    fn from(failure: PhaseFailure) -> Self {
        SyncError::Phase(Box::new(failure))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::transport_retryable("connection lost").is_retryable());
        assert!(!SyncError::transport_fatal("invalid certificate").is_retryable());
        assert!(SyncError::Timeout.is_retryable());
        assert!(SyncError::Server {
            status: 503,
            message: "unavailable".into()
        }
        .is_retryable());
        assert!(!SyncError::Server {
            status: 400,
            message: "Invalid data".into()
        }
        .is_retryable());
        assert!(!SyncError::Cancelled.is_retryable());
        assert!(!SyncError::NotFound(ExpenseId::new(1)).is_retryable());
    }

    #[test]
    fn insert_phase_failures_are_not_retry_safe() {
        let insert = SyncError::from(PhaseFailure::new(
            SyncPhase::Insert,
            SyncError::transport_retryable("reset by peer"),
        ));
        assert!(!insert.is_retry_safe());
        assert!(!insert.is_retryable());
        assert_eq!(insert.phase(), Some(SyncPhase::Insert));

        let delete = SyncError::from(PhaseFailure::new(
            SyncPhase::Delete,
            SyncError::transport_retryable("reset by peer"),
        ));
        assert!(delete.is_retry_safe());
        assert!(delete.is_retryable());
    }

    #[test]
    fn error_display() {
        let err = SyncError::SyncInProgress(UserId::new(3));
        assert_eq!(err.to_string(), "a sync is already in progress for user 3");

        let err = SyncError::from(PhaseFailure::new(SyncPhase::Update, SyncError::Timeout));
        assert_eq!(
            err.to_string(),
            "sync failed during update phase: operation timed out"
        );
    }
}
