use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kindred_core::{
    DomainError, DomainResult, Entity, MessageId, RelationshipId, StatusEntity, UserId,
};

/// Private match (two members) or group (three or more).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipKind {
    Private,
    Group,
}

impl RelationshipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipKind::Private => "private",
            RelationshipKind::Group => "group",
        }
    }
}

impl core::str::FromStr for RelationshipKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "private" => Ok(RelationshipKind::Private),
            "group" => Ok(RelationshipKind::Group),
            other => Err(DomainError::validation(format!("unknown relationship kind '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipStatus {
    Active,
    Archived,
}

impl RelationshipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipStatus::Active => "active",
            RelationshipStatus::Archived => "archived",
        }
    }
}

impl core::str::FromStr for RelationshipStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(RelationshipStatus::Active),
            "archived" => Ok(RelationshipStatus::Archived),
            other => Err(DomainError::validation(format!(
                "unknown relationship status '{other}'"
            ))),
        }
    }
}

/// Undirected aggregate for an established conversation.
///
/// Invariants:
/// - a private relationship has exactly two members, a group at least three
/// - membership is fixed once written; a larger group is a new relationship
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    id: RelationshipId,
    kind: RelationshipKind,
    status: RelationshipStatus,
    members: BTreeSet<UserId>,
    created_at: DateTime<Utc>,
}

impl Relationship {
    pub fn new(
        id: RelationshipId,
        kind: RelationshipKind,
        members: impl IntoIterator<Item = UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let members: BTreeSet<UserId> = members.into_iter().collect();
        match kind {
            RelationshipKind::Private if members.len() != 2 => {
                return Err(DomainError::validation(format!(
                    "a private relationship needs exactly 2 distinct members (got {})",
                    members.len()
                )));
            }
            RelationshipKind::Group if members.len() < 3 => {
                return Err(DomainError::validation(format!(
                    "a group needs at least 3 distinct members (got {})",
                    members.len()
                )));
            }
            _ => {}
        }

        Ok(Self {
            id,
            kind,
            status: RelationshipStatus::Active,
            members,
            created_at: now,
        })
    }

    /// Rebuild from persisted attributes (no validation beyond the member floor).
    pub fn from_parts(
        id: RelationshipId,
        kind: RelationshipKind,
        status: RelationshipStatus,
        members: BTreeSet<UserId>,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if members.len() < 2 {
            return Err(DomainError::invariant(format!(
                "relationship {id} has fewer than 2 members"
            )));
        }
        Ok(Self {
            id,
            kind,
            status,
            members,
            created_at,
        })
    }

    pub fn relationship_id(&self) -> RelationshipId {
        self.id
    }

    pub fn kind(&self) -> RelationshipKind {
        self.kind
    }

    pub fn status(&self) -> RelationshipStatus {
        self.status
    }

    pub fn members(&self) -> &BTreeSet<UserId> {
        &self.members
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_member(&self, user: UserId) -> bool {
        self.members.contains(&user)
    }

    /// Everyone in the relationship except `user`.
    pub fn counterparts(&self, user: UserId) -> Vec<UserId> {
        self.members.iter().copied().filter(|m| *m != user).collect()
    }
}

impl Entity for Relationship {
    type Id = RelationshipId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl StatusEntity for Relationship {
    type Revision = RelationshipStatus;

    fn revision(&self) -> Self::Revision {
        self.status
    }
}

/// First chat message of a relationship, written together with it.
///
/// The seed reuses the relationship's uuid as its message id, so a
/// relationship can never carry more than one seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedMessage {
    pub id: MessageId,
    pub relationship_id: RelationshipId,
    pub author: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl SeedMessage {
    /// Seed `relationship` with `content` authored by one of its members.
    pub fn for_relationship(
        relationship: &Relationship,
        author: UserId,
        content: impl Into<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(DomainError::validation("seed message content cannot be empty"));
        }
        if !relationship.is_member(author) {
            return Err(DomainError::invariant(format!(
                "seed author {author} is not a member of relationship {}",
                relationship.id
            )));
        }
        Ok(Self {
            id: MessageId::from_uuid(*relationship.id.as_uuid()),
            relationship_id: relationship.id,
            author,
            content,
            created_at: now,
        })
    }
}
