use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kindred_core::{DomainError, Entity, RelationshipId, StatusEntity, UserId};

/// Identity of an edge: the ordered pair (sender, receiver).
///
/// At most one live edge exists per ordered pair.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeKey {
    pub sender: UserId,
    pub receiver: UserId,
}

impl EdgeKey {
    pub fn new(sender: UserId, receiver: UserId) -> Self {
        Self { sender, receiver }
    }

    /// The counterpart direction (receiver → sender).
    pub fn reverse(&self) -> Self {
        Self {
            sender: self.receiver,
            receiver: self.sender,
        }
    }

    /// Both directions of the unordered pair, lower sender first.
    ///
    /// Mutual transitions always write in this order so that racing requests
    /// for the same pair contend on the same first record.
    pub fn claim_order(&self) -> (EdgeKey, EdgeKey) {
        if self.sender <= self.receiver {
            (*self, self.reverse())
        } else {
            (self.reverse(), *self)
        }
    }
}

impl core::fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}->{}", self.sender, self.receiver)
    }
}

/// What kind of intent an edge records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    Like,
    Dislike,
    Ping,
    Invite,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::Like => "like",
            InteractionKind::Dislike => "dislike",
            InteractionKind::Ping => "ping",
            InteractionKind::Invite => "invite",
        }
    }
}

impl FromStr for InteractionKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "like" => Ok(InteractionKind::Like),
            "dislike" => Ok(InteractionKind::Dislike),
            "ping" => Ok(InteractionKind::Ping),
            "invite" => Ok(InteractionKind::Invite),
            "" => Err(DomainError::validation("kind is required")),
            other => Err(DomainError::validation(format!(
                "kind must be one of: like, dislike, ping, invite (got '{other}')"
            ))),
        }
    }
}

/// Edge status lifecycle.
///
/// `rejected` and `approved` are part of the persisted vocabulary; the engine
/// itself writes `pending`, `match` and `declined`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeStatus {
    Pending,
    Match,
    Declined,
    Rejected,
    Approved,
}

impl EdgeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeStatus::Pending => "pending",
            EdgeStatus::Match => "match",
            EdgeStatus::Declined => "declined",
            EdgeStatus::Rejected => "rejected",
            EdgeStatus::Approved => "approved",
        }
    }

    pub fn is_declined(&self) -> bool {
        matches!(self, EdgeStatus::Declined | EdgeStatus::Rejected)
    }
}

impl FromStr for EdgeStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(EdgeStatus::Pending),
            "match" => Ok(EdgeStatus::Match),
            "declined" => Ok(EdgeStatus::Declined),
            "rejected" => Ok(EdgeStatus::Rejected),
            "approved" => Ok(EdgeStatus::Approved),
            other => Err(DomainError::validation(format!("unknown edge status '{other}'"))),
        }
    }
}

/// The fixed action vocabulary accepted by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Like,
    Dislike,
    Ping,
    Approve,
    Reject,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Like => "like",
            Action::Dislike => "dislike",
            Action::Ping => "ping",
            Action::Approve => "approve",
            Action::Reject => "reject",
        }
    }

    /// The edge kind this action records on the sender's own edge.
    ///
    /// `approve`/`reject` act on a counterpart's ping and record no kind of
    /// their own.
    pub fn implied_kind(&self) -> Option<InteractionKind> {
        match self {
            Action::Like => Some(InteractionKind::Like),
            Action::Dislike => Some(InteractionKind::Dislike),
            Action::Ping => Some(InteractionKind::Ping),
            Action::Approve | Action::Reject => None,
        }
    }
}

impl FromStr for Action {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "like" => Ok(Action::Like),
            "dislike" => Ok(Action::Dislike),
            "ping" => Ok(Action::Ping),
            "approve" => Ok(Action::Approve),
            "reject" | "decline" => Ok(Action::Reject),
            "" => Err(DomainError::validation("action is required")),
            other => Err(DomainError::unsupported(format!("'{other}'"))),
        }
    }
}

/// What a conditional edge write compares against.
///
/// The status alone cannot tell a pending like from a re-sent pending ping,
/// so every rewrite of an edge also bumps its version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeRevision {
    pub status: EdgeStatus,
    pub version: u64,
}

/// Directed intent record from `sender` toward `receiver`.
///
/// Created on first contact, mutated in place afterwards, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionEdge {
    key: EdgeKey,
    kind: InteractionKind,
    status: EdgeStatus,
    message: Option<String>,
    relationship_id: Option<RelationshipId>,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl InteractionEdge {
    /// First contact from `key.sender` toward `key.receiver`.
    pub fn new(
        key: EdgeKey,
        kind: InteractionKind,
        status: EdgeStatus,
        message: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            key,
            kind,
            status,
            message,
            relationship_id: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild an edge from persisted attributes.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        key: EdgeKey,
        kind: InteractionKind,
        status: EdgeStatus,
        message: Option<String>,
        relationship_id: Option<RelationshipId>,
        version: u64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key,
            kind,
            status,
            message,
            relationship_id,
            version,
            created_at,
            updated_at,
        }
    }

    /// Record a new explicit intent on this pair, replacing kind, status and message.
    ///
    /// A new intent clears any previously attached relationship id.
    pub fn with_intent(
        &self,
        kind: InteractionKind,
        status: EdgeStatus,
        message: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            key: self.key,
            kind,
            status,
            message,
            relationship_id: None,
            version: self.version + 1,
            created_at: self.created_at,
            updated_at: now,
        }
    }

    /// Move this edge to `match` under `relationship_id`, keeping kind and message.
    pub fn matched(&self, relationship_id: RelationshipId, now: DateTime<Utc>) -> Self {
        Self {
            status: EdgeStatus::Match,
            relationship_id: Some(relationship_id),
            version: self.version + 1,
            updated_at: now,
            ..self.clone()
        }
    }

    /// Move this edge to `declined`, keeping kind and message for audit.
    pub fn declined(&self, now: DateTime<Utc>) -> Self {
        Self {
            status: EdgeStatus::Declined,
            relationship_id: None,
            version: self.version + 1,
            updated_at: now,
            ..self.clone()
        }
    }

    /// Undo this edge back to the content of `prior`, as a new revision.
    pub fn reverted_to(&self, prior: &InteractionEdge, now: DateTime<Utc>) -> Self {
        Self {
            version: self.version + 1,
            updated_at: now,
            ..prior.clone()
        }
    }

    pub fn key(&self) -> EdgeKey {
        self.key
    }

    pub fn sender(&self) -> UserId {
        self.key.sender
    }

    pub fn receiver(&self) -> UserId {
        self.key.receiver
    }

    pub fn kind(&self) -> InteractionKind {
        self.kind
    }

    pub fn status(&self) -> EdgeStatus {
        self.status
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn relationship_id(&self) -> Option<RelationshipId> {
        self.relationship_id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn revision(&self) -> EdgeRevision {
        EdgeRevision {
            status: self.status,
            version: self.version,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// A like still waiting for the counterpart.
    pub fn is_pending_like(&self) -> bool {
        self.kind == InteractionKind::Like && self.status == EdgeStatus::Pending
    }

    /// A ping still waiting for an explicit approve/decline.
    pub fn is_pending_ping(&self) -> bool {
        self.kind == InteractionKind::Ping && self.status == EdgeStatus::Pending
    }
}

impl Entity for InteractionEdge {
    type Id = EdgeKey;

    fn id(&self) -> &Self::Id {
        &self.key
    }
}

impl StatusEntity for InteractionEdge {
    type Revision = EdgeRevision;

    fn revision(&self) -> Self::Revision {
        InteractionEdge::revision(self)
    }
}
