//! Optimistic concurrency preconditions for conditional writes.

use crate::error::{DomainError, DomainResult};

/// What a conditional write expects to find in the store before it applies.
///
/// Every status transition is persisted as a compare-and-swap against the
/// status the caller last observed. If another writer moved the record in the
/// meantime the write is rejected and the caller re-reads.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Expected<S> {
    /// Skip the check (unconditional upsert).
    Any,
    /// Require that no record exists yet (create-only).
    Absent,
    /// Require the record to exist and still be at this revision.
    Status(S),
}

impl<S: Copy + Eq + core::fmt::Debug> Expected<S> {
    /// Build the expectation that matches what was observed on read.
    pub fn observed(current: Option<S>) -> Self {
        match current {
            Some(status) => Expected::Status(status),
            None => Expected::Absent,
        }
    }

    pub fn matches(self, actual: Option<S>) -> bool {
        match (self, actual) {
            (Expected::Any, _) => true,
            (Expected::Absent, None) => true,
            (Expected::Status(want), Some(have)) => want == have,
            _ => false,
        }
    }

    pub fn check(self, actual: Option<S>) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "conditional write failed (expected: {self:?}, actual: {actual:?})"
            )))
        }
    }
}
