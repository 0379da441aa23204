use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use kindred_core::{Expected, MessageId, RelationshipId, StatusEntity, UserId};
use kindred_interactions::{
    EdgeKey, EdgeRevision, EdgeStatus, InteractionEdge, Invite, InviteKey, InviteStatus, Relationship,
    RelationshipStatus, SeedMessage,
};

use super::r#trait::{RelationshipStore, StoreError};

/// One keyed table with compare-and-swap on the entity revision.
#[derive(Debug)]
struct Table<T: StatusEntity> {
    rows: RwLock<HashMap<T::Id, T>>,
}

impl<T: StatusEntity> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
        }
    }
}

impl<T> Table<T>
where
    T: StatusEntity + Clone,
{
    fn get(&self, id: &T::Id) -> Result<Option<T>, StoreError> {
        let rows = self.rows.read().map_err(|_| poisoned())?;
        Ok(rows.get(id).cloned())
    }

    fn put(&self, row: T, expected: Expected<T::Revision>) -> Result<(), StoreError> {
        let mut rows = self.rows.write().map_err(|_| poisoned())?;
        let current = rows.get(row.id()).map(StatusEntity::revision);
        expected
            .check(current)
            .map_err(|e| StoreError::Conflict(format!("{:?}: {e}", row.id())))?;
        rows.insert(row.id().clone(), row);
        Ok(())
    }

    fn scan(&self, filter: impl Fn(&T) -> bool) -> Result<Vec<T>, StoreError> {
        let rows = self.rows.read().map_err(|_| poisoned())?;
        Ok(rows.values().filter(|r| filter(r)).cloned().collect())
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("lock poisoned".to_string())
}

fn newest_first<T>(rows: &mut [T], key: impl Fn(&T) -> (DateTime<Utc>, DateTime<Utc>)) {
    rows.sort_by(|a, b| key(b).cmp(&key(a)));
}

/// In-memory relationship store.
///
/// Intended for tests/dev. Listings are full scans; every write is atomic
/// under the table's lock, which is what makes the conditional writes sound.
#[derive(Debug, Default)]
pub struct InMemoryRelationshipStore {
    edges: Table<InteractionEdge>,
    relationships: Table<Relationship>,
    invites: Table<Invite>,
    messages: RwLock<HashMap<MessageId, SeedMessage>>,
}

impl InMemoryRelationshipStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted_edges(
        &self,
        filter: impl Fn(&InteractionEdge) -> bool,
    ) -> Result<Vec<InteractionEdge>, StoreError> {
        let mut edges = self.edges.scan(filter)?;
        newest_first(&mut edges, |e| (e.updated_at(), e.created_at()));
        Ok(edges)
    }

    fn sorted_invites(&self, filter: impl Fn(&Invite) -> bool) -> Result<Vec<Invite>, StoreError> {
        let mut invites = self.invites.scan(filter)?;
        newest_first(&mut invites, |i| (i.updated_at(), i.created_at()));
        Ok(invites)
    }
}

impl RelationshipStore for InMemoryRelationshipStore {
    fn get_edge(&self, key: EdgeKey) -> Result<Option<InteractionEdge>, StoreError> {
        self.edges.get(&key)
    }

    fn put_edge(
        &self,
        edge: InteractionEdge,
        expected: Expected<EdgeRevision>,
    ) -> Result<(), StoreError> {
        self.edges.put(edge, expected)
    }

    fn edges_sent(&self, sender: UserId) -> Result<Vec<InteractionEdge>, StoreError> {
        self.sorted_edges(|e| e.sender() == sender)
    }

    fn edges_received(&self, receiver: UserId) -> Result<Vec<InteractionEdge>, StoreError> {
        self.sorted_edges(|e| e.receiver() == receiver)
    }

    fn edges_by_status(
        &self,
        sender: UserId,
        status: EdgeStatus,
    ) -> Result<Vec<InteractionEdge>, StoreError> {
        self.sorted_edges(|e| e.sender() == sender && e.status() == status)
    }

    fn get_relationship(&self, id: RelationshipId) -> Result<Option<Relationship>, StoreError> {
        self.relationships.get(&id)
    }

    fn put_relationship(
        &self,
        relationship: Relationship,
        expected: Expected<RelationshipStatus>,
    ) -> Result<(), StoreError> {
        self.relationships.put(relationship, expected)
    }

    fn put_message(&self, message: SeedMessage) -> Result<(), StoreError> {
        let mut messages = self.messages.write().map_err(|_| poisoned())?;
        if messages.contains_key(&message.id) {
            return Err(StoreError::Conflict(format!("message {} already exists", message.id)));
        }
        messages.insert(message.id, message);
        Ok(())
    }

    fn messages(&self, relationship_id: RelationshipId) -> Result<Vec<SeedMessage>, StoreError> {
        let messages = self.messages.read().map_err(|_| poisoned())?;
        let mut found: Vec<SeedMessage> = messages
            .values()
            .filter(|m| m.relationship_id == relationship_id)
            .cloned()
            .collect();
        found.sort_by_key(|m| m.created_at);
        Ok(found)
    }

    fn latest_message(
        &self,
        relationship_id: RelationshipId,
    ) -> Result<Option<SeedMessage>, StoreError> {
        Ok(self.messages(relationship_id)?.pop())
    }

    fn get_invite(&self, key: InviteKey) -> Result<Option<Invite>, StoreError> {
        self.invites.get(&key)
    }

    fn put_invite(&self, invite: Invite, expected: Expected<InviteStatus>) -> Result<(), StoreError> {
        self.invites.put(invite, expected)
    }

    fn invites_by_approver(&self, approver: UserId) -> Result<Vec<Invite>, StoreError> {
        self.sorted_invites(|i| i.is_proposal() && i.approver() == approver)
    }

    fn invites_by_subject(&self, subject: UserId) -> Result<Vec<Invite>, StoreError> {
        self.sorted_invites(|i| i.subject() == subject)
    }
}
