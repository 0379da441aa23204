//! Relationship materialization: the relationship record plus its seed message.

use chrono::Utc;
use tracing::{debug, info, instrument};

use kindred_core::{Expected, RelationshipId, UserId};
use kindred_interactions::{Relationship, RelationshipKind, SeedMessage};

use crate::error::{EngineError, EngineResult};
use crate::store::{RelationshipStore, StoreError};

/// Writes relationships and their seed message.
///
/// Every write is create-only, so materializing the same id twice converges on
/// one relationship with one seed. Callers that already committed edge
/// transitions under an id re-run [`Materializer::materialize_with_id`] to
/// finish an interrupted transition.
#[derive(Debug, Clone)]
pub struct Materializer<S> {
    store: S,
    default_seed: String,
}

impl<S> Materializer<S>
where
    S: RelationshipStore,
{
    pub fn new(store: S, default_seed: impl Into<String>) -> Self {
        Self {
            store,
            default_seed: default_seed.into(),
        }
    }

    /// Create a fresh relationship and return its id.
    pub fn materialize(
        &self,
        kind: RelationshipKind,
        members: impl IntoIterator<Item = UserId>,
        author: UserId,
        content: Option<&str>,
    ) -> EngineResult<RelationshipId> {
        let relationship =
            self.materialize_with_id(RelationshipId::new(), kind, members, author, content)?;
        Ok(relationship.relationship_id())
    }

    /// Ensure relationship `id` exists with `members` and carries its seed message.
    ///
    /// `content` falls back to the configured default seed when absent or blank.
    #[instrument(skip(self, members, content), fields(relationship_id = %id, kind = kind.as_str()))]
    pub fn materialize_with_id(
        &self,
        id: RelationshipId,
        kind: RelationshipKind,
        members: impl IntoIterator<Item = UserId>,
        author: UserId,
        content: Option<&str>,
    ) -> EngineResult<Relationship> {
        let now = Utc::now();
        let candidate = Relationship::new(id, kind, members, now)?;

        let relationship = match self
            .store
            .put_relationship(candidate.clone(), Expected::Absent)
        {
            Ok(()) => {
                info!(members = candidate.members().len(), "relationship materialized");
                candidate
            }
            Err(StoreError::Conflict(_)) => {
                let existing = self.store.get_relationship(id)?.ok_or_else(|| {
                    EngineError::Store(format!("relationship {id} rejected create but is missing"))
                })?;
                if existing.kind() != kind || !candidate.members().is_subset(existing.members()) {
                    return Err(EngineError::InvariantViolation(format!(
                        "relationship {id} already exists with different membership"
                    )));
                }
                debug!("relationship already present");
                existing
            }
            Err(e) => return Err(e.into()),
        };

        let content = content
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(self.default_seed.as_str());
        let seed = SeedMessage::for_relationship(&relationship, author, content, now)?;
        match self.store.put_message(seed) {
            Ok(()) => debug!("seed message written"),
            Err(StoreError::Conflict(_)) => debug!("seed message already present"),
            Err(e) => return Err(e.into()),
        }

        Ok(relationship)
    }

    /// Whether relationship `id` and its seed message are both persisted.
    pub fn is_complete(&self, id: RelationshipId) -> EngineResult<bool> {
        if self.store.get_relationship(id)?.is_none() {
            return Ok(false);
        }
        Ok(self.store.latest_message(id)?.is_some())
    }
}
