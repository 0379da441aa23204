use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kindred_core::{
    DomainError, DomainResult, Entity, InviteId, RelationshipId, StatusEntity, UserId,
};

/// Group invite lifecycle: `pending → {approved, declined}`.
///
/// An approved invite is what the group listing calls "active".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteStatus {
    Pending,
    #[serde(alias = "active")]
    Approved,
    Declined,
}

impl InviteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InviteStatus::Pending => "pending",
            InviteStatus::Approved => "approved",
            InviteStatus::Declined => "declined",
        }
    }
}

impl FromStr for InviteStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(InviteStatus::Pending),
            "approved" | "active" => Ok(InviteStatus::Approved),
            "declined" => Ok(InviteStatus::Declined),
            other => Err(DomainError::validation(format!("unknown invite status '{other}'"))),
        }
    }
}

/// The approver's answer to a pending invite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteDecision {
    Approved,
    Declined,
}

impl FromStr for InviteDecision {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "approved" | "approve" | "active" => Ok(InviteDecision::Approved),
            "declined" | "decline" | "rejected" | "reject" => Ok(InviteDecision::Declined),
            "" => Err(DomainError::validation("status is required")),
            other => Err(DomainError::validation(format!(
                "status must be 'approved' or 'declined' (got '{other}')"
            ))),
        }
    }
}

/// Which copy of an invite a record is.
///
/// The proposal lives under the inviter; once approved a membership copy is
/// written under the invitee so they can list their active groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteRecordKind {
    Proposal,
    Membership,
}

impl InviteRecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InviteRecordKind::Proposal => "proposal",
            InviteRecordKind::Membership => "membership",
        }
    }
}

impl FromStr for InviteRecordKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "proposal" => Ok(InviteRecordKind::Proposal),
            "membership" => Ok(InviteRecordKind::Membership),
            other => Err(DomainError::validation(format!("unknown invite record '{other}'"))),
        }
    }
}

/// Invite record identity: (subject user, proposal id).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InviteKey {
    pub subject: UserId,
    pub invite_id: InviteId,
}

/// Three-party proposal to form a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invite {
    key: InviteKey,
    record: InviteRecordKind,
    inviter: UserId,
    approver: UserId,
    invitee: UserId,
    status: InviteStatus,
    relationship_id: Option<RelationshipId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Invite {
    /// Open a new pending proposal, stored under the inviter.
    pub fn propose(
        invite_id: InviteId,
        inviter: UserId,
        approver: UserId,
        invitee: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if inviter == approver || inviter == invitee || approver == invitee {
            return Err(DomainError::validation(
                "inviter, approver and invitee must be three different users",
            ));
        }

        Ok(Self {
            key: InviteKey {
                subject: inviter,
                invite_id,
            },
            record: InviteRecordKind::Proposal,
            inviter,
            approver,
            invitee,
            status: InviteStatus::Pending,
            relationship_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuild from persisted attributes.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        key: InviteKey,
        record: InviteRecordKind,
        inviter: UserId,
        approver: UserId,
        invitee: UserId,
        status: InviteStatus,
        relationship_id: Option<RelationshipId>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key,
            record,
            inviter,
            approver,
            invitee,
            status,
            relationship_id,
            created_at,
            updated_at,
        }
    }

    fn ensure_pending(&self) -> DomainResult<()> {
        if self.status != InviteStatus::Pending {
            return Err(DomainError::already_resolved(format!(
                "invite {} is already {}",
                self.key.invite_id,
                self.status.as_str()
            )));
        }
        Ok(())
    }

    /// Approve the proposal, binding it to the relationship it produces.
    pub fn approve(&self, relationship_id: RelationshipId, now: DateTime<Utc>) -> DomainResult<Self> {
        self.ensure_pending()?;
        Ok(Self {
            status: InviteStatus::Approved,
            relationship_id: Some(relationship_id),
            updated_at: now,
            ..self.clone()
        })
    }

    pub fn decline(&self, now: DateTime<Utc>) -> DomainResult<Self> {
        self.ensure_pending()?;
        Ok(Self {
            status: InviteStatus::Declined,
            updated_at: now,
            ..self.clone()
        })
    }

    /// The copy written under the invitee once the proposal is approved.
    pub fn membership_record(&self) -> DomainResult<Self> {
        if self.status != InviteStatus::Approved || self.relationship_id.is_none() {
            return Err(DomainError::invariant(format!(
                "invite {} has not produced a relationship",
                self.key.invite_id
            )));
        }
        Ok(Self {
            key: InviteKey {
                subject: self.invitee,
                invite_id: self.key.invite_id,
            },
            record: InviteRecordKind::Membership,
            ..self.clone()
        })
    }

    pub fn key(&self) -> InviteKey {
        self.key
    }

    pub fn invite_id(&self) -> InviteId {
        self.key.invite_id
    }

    pub fn subject(&self) -> UserId {
        self.key.subject
    }

    pub fn record(&self) -> InviteRecordKind {
        self.record
    }

    pub fn inviter(&self) -> UserId {
        self.inviter
    }

    pub fn approver(&self) -> UserId {
        self.approver
    }

    pub fn invitee(&self) -> UserId {
        self.invitee
    }

    pub fn status(&self) -> InviteStatus {
        self.status
    }

    pub fn relationship_id(&self) -> Option<RelationshipId> {
        self.relationship_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Members of the group this invite would produce.
    pub fn members(&self) -> [UserId; 3] {
        [self.inviter, self.approver, self.invitee]
    }

    pub fn is_proposal(&self) -> bool {
        self.record == InviteRecordKind::Proposal
    }
}

impl Entity for Invite {
    type Id = InviteKey;

    fn id(&self) -> &Self::Id {
        &self.key
    }
}

impl StatusEntity for Invite {
    type Revision = InviteStatus;

    fn revision(&self) -> Self::Revision {
        self.status
    }
}
