use std::sync::Arc;

use thiserror::Error;

use kindred_core::{Expected, RelationshipId, UserId};
use kindred_interactions::{
    EdgeKey, EdgeRevision, EdgeStatus, InteractionEdge, Invite, InviteKey, InviteStatus, Relationship,
    RelationshipStatus, SeedMessage,
};

/// Repository operation error.
///
/// These are **infrastructure errors** (preconditions, availability, decoding)
/// as opposed to domain errors (validation, lifecycle).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A conditional write found the record in a different state than expected.
    #[error("conditional write failed: {0}")]
    Conflict(String),

    /// The backend failed or timed out; the call may be retried by the caller.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A stored record could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Typed access to interaction edges, relationships, seed messages and invites.
///
/// ## Consistency
///
/// - Point reads (`get_*`) are strongly consistent.
/// - Listings model secondary-index queries: they may lag behind concurrent
///   writes and must never drive a decision on their own. Decisions read the
///   record by key and commit with a conditional write.
///
/// ## Conditional writes
///
/// Every `put_*` takes an [`Expected`] precondition evaluated against the stored
/// record's revision atomically with the write:
///
/// - `Expected::Any` upserts unconditionally
/// - `Expected::Absent` creates only if no record exists
/// - `Expected::Status(r)` replaces only while the record is still at revision `r`
///
/// Relationships and invites are revisioned by status alone. Edges carry a
/// version as well ([`EdgeRevision`]), so an edge rewritten without a status
/// change (a like re-sent as a ping) still fails a stale precondition.
///
/// A failed precondition returns [`StoreError::Conflict`] and writes nothing.
///
/// ## Ordering
///
/// Edge and invite listings are returned newest first (`updated_at`, then
/// `created_at`, descending).
pub trait RelationshipStore: Send + Sync {
    fn get_edge(&self, key: EdgeKey) -> Result<Option<InteractionEdge>, StoreError>;

    fn put_edge(
        &self,
        edge: InteractionEdge,
        expected: Expected<EdgeRevision>,
    ) -> Result<(), StoreError>;

    /// Edges whose sender is `sender`.
    fn edges_sent(&self, sender: UserId) -> Result<Vec<InteractionEdge>, StoreError>;

    /// Edges whose receiver is `receiver` (receiver index).
    fn edges_received(&self, receiver: UserId) -> Result<Vec<InteractionEdge>, StoreError>;

    /// Edges sent by `sender` currently in `status` (status index).
    fn edges_by_status(
        &self,
        sender: UserId,
        status: EdgeStatus,
    ) -> Result<Vec<InteractionEdge>, StoreError>;

    fn get_relationship(&self, id: RelationshipId) -> Result<Option<Relationship>, StoreError>;

    fn put_relationship(
        &self,
        relationship: Relationship,
        expected: Expected<RelationshipStatus>,
    ) -> Result<(), StoreError>;

    /// Create-only: a message id can be written once.
    fn put_message(&self, message: SeedMessage) -> Result<(), StoreError>;

    /// All messages of a relationship, oldest first.
    fn messages(&self, relationship_id: RelationshipId) -> Result<Vec<SeedMessage>, StoreError>;

    fn latest_message(
        &self,
        relationship_id: RelationshipId,
    ) -> Result<Option<SeedMessage>, StoreError>;

    fn get_invite(&self, key: InviteKey) -> Result<Option<Invite>, StoreError>;

    fn put_invite(&self, invite: Invite, expected: Expected<InviteStatus>) -> Result<(), StoreError>;

    /// Proposal records naming `approver` (approver index).
    fn invites_by_approver(&self, approver: UserId) -> Result<Vec<Invite>, StoreError>;

    /// All records stored under `subject` (proposals they sent, memberships they hold).
    fn invites_by_subject(&self, subject: UserId) -> Result<Vec<Invite>, StoreError>;
}

impl<S> RelationshipStore for Arc<S>
where
    S: RelationshipStore + ?Sized,
{
    fn get_edge(&self, key: EdgeKey) -> Result<Option<InteractionEdge>, StoreError> {
        (**self).get_edge(key)
    }

    fn put_edge(
        &self,
        edge: InteractionEdge,
        expected: Expected<EdgeRevision>,
    ) -> Result<(), StoreError> {
        (**self).put_edge(edge, expected)
    }

    fn edges_sent(&self, sender: UserId) -> Result<Vec<InteractionEdge>, StoreError> {
        (**self).edges_sent(sender)
    }

    fn edges_received(&self, receiver: UserId) -> Result<Vec<InteractionEdge>, StoreError> {
        (**self).edges_received(receiver)
    }

    fn edges_by_status(
        &self,
        sender: UserId,
        status: EdgeStatus,
    ) -> Result<Vec<InteractionEdge>, StoreError> {
        (**self).edges_by_status(sender, status)
    }

    fn get_relationship(&self, id: RelationshipId) -> Result<Option<Relationship>, StoreError> {
        (**self).get_relationship(id)
    }

    fn put_relationship(
        &self,
        relationship: Relationship,
        expected: Expected<RelationshipStatus>,
    ) -> Result<(), StoreError> {
        (**self).put_relationship(relationship, expected)
    }

    fn put_message(&self, message: SeedMessage) -> Result<(), StoreError> {
        (**self).put_message(message)
    }

    fn messages(&self, relationship_id: RelationshipId) -> Result<Vec<SeedMessage>, StoreError> {
        (**self).messages(relationship_id)
    }

    fn latest_message(
        &self,
        relationship_id: RelationshipId,
    ) -> Result<Option<SeedMessage>, StoreError> {
        (**self).latest_message(relationship_id)
    }

    fn get_invite(&self, key: InviteKey) -> Result<Option<Invite>, StoreError> {
        (**self).get_invite(key)
    }

    fn put_invite(&self, invite: Invite, expected: Expected<InviteStatus>) -> Result<(), StoreError> {
        (**self).put_invite(invite, expected)
    }

    fn invites_by_approver(&self, approver: UserId) -> Result<Vec<Invite>, StoreError> {
        (**self).invites_by_approver(approver)
    }

    fn invites_by_subject(&self, subject: UserId) -> Result<Vec<Invite>, StoreError> {
        (**self).invites_by_subject(subject)
    }
}
