//! Engine-level error model.

use thiserror::Error;
use tracing::warn;

use kindred_core::{DomainError, UserId};

use crate::store::StoreError;

pub type EngineResult<T> = Result<T, EngineError>;

/// Error surfaced by every engine operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// Missing/empty/malformed input, rejected before any store access.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid invitee: {0}")]
    InvalidInvitee(UserId),

    #[error("unsupported action: {0}")]
    UnsupportedAction(String),

    #[error("already resolved: {0}")]
    AlreadyResolved(String),

    /// Lost a concurrent transition. Retried internally before it is surfaced.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Transient backend failure or timeout. Retry policy belongs to the caller.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Non-transient backend failure (undecodable record).
    #[error("store error: {0}")]
    Store(String),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl From<DomainError> for EngineError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(m) | DomainError::InvalidId(m) => Self::Validation(m),
            DomainError::NotFound(m) => Self::NotFound(m),
            DomainError::InvalidInvitee(user) => Self::InvalidInvitee(user),
            DomainError::UnsupportedAction(m) => Self::UnsupportedAction(m),
            DomainError::AlreadyResolved(m) => Self::AlreadyResolved(m),
            DomainError::Conflict(m) => Self::Conflict(m),
            DomainError::InvariantViolation(m) => Self::InvariantViolation(m),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(m) => Self::Conflict(m),
            StoreError::Unavailable(m) => Self::StoreUnavailable(m),
            StoreError::Corrupt(m) => Self::Store(m),
        }
    }
}

impl EngineError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, EngineError::Conflict(_))
    }
}

/// Outcome of one optimistic attempt at a transition.
#[derive(Debug)]
pub(crate) enum Attempt<T> {
    Resolved(T),
    Conflict(String),
    Failed(EngineError),
}

impl<T> From<EngineResult<T>> for Attempt<T> {
    fn from(value: EngineResult<T>) -> Self {
        match value {
            Ok(v) => Attempt::Resolved(v),
            Err(EngineError::Conflict(reason)) => Attempt::Conflict(reason),
            Err(e) => Attempt::Failed(e),
        }
    }
}

/// Run `attempt` once, then up to `retries` more times while it loses races.
///
/// Exhausted retries come back as [`EngineError::Conflict`]; callers decide
/// whether that is benign.
pub(crate) fn retry_on_conflict<T>(
    operation: &'static str,
    retries: u32,
    mut attempt: impl FnMut() -> Attempt<T>,
) -> EngineResult<T> {
    let mut tries = 0;
    loop {
        match attempt() {
            Attempt::Resolved(v) => return Ok(v),
            Attempt::Failed(e) => return Err(e),
            Attempt::Conflict(reason) if tries < retries => {
                tries += 1;
                warn!(operation, attempt = tries, %reason, "lost concurrent transition, retrying");
            }
            Attempt::Conflict(reason) => return Err(EngineError::Conflict(reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_conflict_maps_to_engine_conflict() {
        let err: EngineError = StoreError::Conflict("edge".into()).into();
        assert!(err.is_conflict());
        let err: EngineError = StoreError::Unavailable("timeout".into()).into();
        assert!(matches!(err, EngineError::StoreUnavailable(_)));
    }

    #[test]
    fn invalid_id_is_a_validation_failure() {
        let err: EngineError = DomainError::invalid_id("nope").into();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn retry_stops_after_budget() {
        let mut calls = 0;
        let result: EngineResult<()> = retry_on_conflict("test", 1, || {
            calls += 1;
            Attempt::Conflict("raced".into())
        });
        assert_eq!(calls, 2);
        assert!(matches!(result, Err(EngineError::Conflict(_))));
    }

    #[test]
    fn retry_returns_first_resolution() {
        let mut calls = 0;
        let result = retry_on_conflict("test", 3, || {
            calls += 1;
            if calls == 1 {
                Attempt::Conflict("raced".into())
            } else {
                Attempt::Resolved(calls)
            }
        });
        assert_eq!(result, Ok(2));
    }

    #[test]
    fn failures_are_not_retried() {
        let mut calls = 0;
        let result: EngineResult<()> = retry_on_conflict("test", 3, || {
            calls += 1;
            Attempt::Failed(EngineError::StoreUnavailable("down".into()))
        });
        assert_eq!(calls, 1);
        assert!(matches!(result, Err(EngineError::StoreUnavailable(_))));
    }
}
