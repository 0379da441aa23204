//! The mutual-intent decision table.
//!
//! Given a validated intent and the two edges of the pair as last observed,
//! decide what the resolver must write. Pure: the resolver owns reads,
//! conditional writes and retries.

use serde::{Deserialize, Serialize};

use kindred_core::{DomainError, DomainResult, RelationshipId, UserId};

use crate::edge::{Action, EdgeKey, EdgeStatus, InteractionEdge, InteractionKind};

/// A one-directional intent as received from the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentRequest {
    pub sender: UserId,
    pub receiver: UserId,
    pub kind: InteractionKind,
    pub action: Action,
    pub message: Option<String>,
}

impl IntentRequest {
    pub fn key(&self) -> EdgeKey {
        EdgeKey::new(self.sender, self.receiver)
    }

    /// Reject malformed requests before any store access.
    pub fn validate(&self) -> DomainResult<()> {
        if self.sender == self.receiver {
            return Err(DomainError::validation("sender and receiver must differ"));
        }

        match self.action.implied_kind() {
            Some(kind) if kind != self.kind => {
                return Err(DomainError::validation(format!(
                    "action '{}' does not match kind '{}'",
                    self.action.as_str(),
                    self.kind.as_str()
                )));
            }
            None if self.kind != InteractionKind::Ping => {
                return Err(DomainError::unsupported(format!(
                    "'{}' applies to pings only (got kind '{}')",
                    self.action.as_str(),
                    self.kind.as_str()
                )));
            }
            _ => {}
        }

        match (self.action, self.message.as_deref()) {
            (Action::Ping, None) => Err(DomainError::validation("a ping requires a message")),
            (Action::Ping, Some(m)) if m.trim().is_empty() => {
                Err(DomainError::validation("ping message cannot be empty"))
            }
            (Action::Ping, Some(_)) | (_, None) => Ok(()),
            (_, Some(_)) => Err(DomainError::validation("only pings carry a message")),
        }
    }
}

/// What the resolver must do for one intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Write the sender's edge as `pending` (like without reciprocation, or a ping).
    Pending,
    /// Write the sender's edge as `declined`, independent of the counterpart.
    Decline,
    /// Both edges become `match` under one new relationship id.
    Mutual,
    /// The sender's edge is already matched; nothing to write.
    AlreadyMatched(RelationshipId),
    /// The counterpart's edge is still matched under this id: re-join it.
    Restore(RelationshipId),
    /// Explicit approval of the counterpart's pending ping.
    ApprovePing,
    /// Explicit rejection of the counterpart's pending ping.
    RejectPing,
}

/// Apply the decision table to the observed pair.
///
/// `own` is the sender's edge, `counterpart` the receiver's edge toward the sender.
pub fn decide(
    action: Action,
    own: Option<&InteractionEdge>,
    counterpart: Option<&InteractionEdge>,
) -> Decision {
    let matched = own.and_then(|e| match e.status() {
        EdgeStatus::Match => e.relationship_id(),
        _ => None,
    });

    let restorable = counterpart.and_then(|e| match e.status() {
        EdgeStatus::Match => e.relationship_id(),
        _ => None,
    });

    match action {
        Action::Dislike => Decision::Decline,
        Action::Approve => Decision::ApprovePing,
        Action::Reject => Decision::RejectPing,
        Action::Ping => match matched {
            Some(id) => Decision::AlreadyMatched(id),
            None => Decision::Pending,
        },
        Action::Like => match (matched, restorable) {
            (Some(id), _) => Decision::AlreadyMatched(id),
            (None, Some(id)) => Decision::Restore(id),
            (None, None) if counterpart.is_some_and(InteractionEdge::is_pending_like) => Decision::Mutual,
            (None, None) => Decision::Pending,
        },
    }
}
