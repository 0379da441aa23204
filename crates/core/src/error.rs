//! Domain error model.

use thiserror::Error;

use crate::id::UserId;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// vocabulary, lifecycle, conflicts). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A required field was missing/empty or malformed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A referenced edge/invite was absent when required.
    #[error("not found: {0}")]
    NotFound(String),

    /// The proposed group invitee does not exist.
    #[error("invalid invitee: {0}")]
    InvalidInvitee(UserId),

    /// Action outside the fixed vocabulary (or not applicable to the target).
    #[error("unsupported action: {0}")]
    UnsupportedAction(String),

    /// Approve/decline on a proposal that is no longer pending.
    #[error("already resolved: {0}")]
    AlreadyResolved(String),

    /// A conflict occurred (stale status / lost race).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedAction(msg.into())
    }

    pub fn already_resolved(msg: impl Into<String>) -> Self {
        Self::AlreadyResolved(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}
