//! Ping approval workflow.
//!
//! A ping is a pending edge that only an explicit answer from its receiver can
//! settle. Approving matches both directions under a new relationship seeded
//! with the ping's message; declining settles both directions as `declined`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use kindred_core::{Expected, RelationshipId, UserId};
use kindred_interactions::{
    EdgeKey, EdgeRevision, EdgeStatus, InteractionEdge, InteractionKind, RelationshipKind,
};

use crate::error::{retry_on_conflict, EngineError, EngineResult};
use crate::materializer::Materializer;
use crate::store::{RelationshipStore, StoreError};

/// Result of an interaction operation: the caller's resulting edge status and
/// the relationship it belongs to, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub status: EdgeStatus,
    pub relationship_id: Option<RelationshipId>,
}

impl Resolution {
    pub fn pending() -> Self {
        Self {
            status: EdgeStatus::Pending,
            relationship_id: None,
        }
    }

    pub fn declined() -> Self {
        Self {
            status: EdgeStatus::Declined,
            relationship_id: None,
        }
    }

    pub fn matched(relationship_id: RelationshipId) -> Self {
        Self {
            status: EdgeStatus::Match,
            relationship_id: Some(relationship_id),
        }
    }

    /// What `edge` currently says, from its owner's point of view.
    pub fn of_edge(edge: Option<&InteractionEdge>) -> Self {
        match edge {
            Some(e) if e.status() == EdgeStatus::Match => Self {
                status: EdgeStatus::Match,
                relationship_id: e.relationship_id(),
            },
            Some(e) => Self {
                status: e.status(),
                relationship_id: None,
            },
            None => Self::pending(),
        }
    }
}

/// Write `first` then `second`, undoing `first` if `second` is rejected.
///
/// Each write carries `(next, expected)`; `undo` is the content `first` held
/// before. A rejected `second` whose record already holds the same match
/// counts as applied: a concurrent writer landed it first.
/// Returns the error of the rejected write after compensating.
pub(crate) fn write_pair<S: RelationshipStore>(
    store: &S,
    first: (InteractionEdge, Expected<EdgeRevision>),
    second: (InteractionEdge, Expected<EdgeRevision>),
    undo: InteractionEdge,
) -> EngineResult<()> {
    let (first_next, first_expected) = first;
    let first_key = first_next.key();

    debug!(edge = %first_key, status = first_next.status().as_str(), "conditional write");
    store.put_edge(first_next.clone(), first_expected)?;

    let (second_next, second_expected) = second;
    debug!(edge = %second_next.key(), status = second_next.status().as_str(), "conditional write");
    let err = match store.put_edge(second_next.clone(), second_expected) {
        Ok(()) => return Ok(()),
        Err(err) => err,
    };
    if matches!(err, StoreError::Conflict(_)) && already_matched(store, &second_next) {
        debug!(edge = %second_next.key(), "second write landed concurrently");
        return Ok(());
    }

    warn!(edge = %first_key, error = %err, "second write rejected, compensating first");
    let revert = first_next.reverted_to(&undo, Utc::now());
    match store.put_edge(revert, Expected::Status(first_next.revision())) {
        Ok(()) | Err(StoreError::Conflict(_)) => {}
        Err(undo_err) => {
            warn!(edge = %first_key, error = %undo_err, "compensation failed");
        }
    }
    Err(err.into())
}

/// Whether the store already holds `next` as a match under the same relationship.
fn already_matched<S: RelationshipStore>(store: &S, next: &InteractionEdge) -> bool {
    next.status() == EdgeStatus::Match
        && matches!(
            store.get_edge(next.key()),
            Ok(Some(current))
                if current.status() == EdgeStatus::Match
                    && current.relationship_id() == next.relationship_id()
        )
}

/// The reply was rewritten after `ping` was settled: that is the replier's
/// newer intent, not a half-finished transition.
fn superseded(reply: Option<&InteractionEdge>, ping: &InteractionEdge) -> bool {
    reply.is_some_and(|e| e.updated_at() > ping.updated_at())
}

/// Explicit approve/decline of pending pings.
#[derive(Debug, Clone)]
pub struct PingApprovals<S> {
    store: S,
    materializer: Materializer<S>,
    conflict_retries: u32,
}

impl<S> PingApprovals<S>
where
    S: RelationshipStore + Clone,
{
    pub fn new(store: S, materializer: Materializer<S>, conflict_retries: u32) -> Self {
        Self {
            store,
            materializer,
            conflict_retries,
        }
    }

    fn load_ping(&self, key: EdgeKey) -> EngineResult<InteractionEdge> {
        match self.store.get_edge(key)? {
            Some(edge) if edge.kind() == InteractionKind::Ping => Ok(edge),
            _ => Err(EngineError::NotFound(format!("no ping from {} to {}", key.sender, key.receiver))),
        }
    }

    /// Approve the ping `pinger → approver`.
    #[instrument(skip(self), fields(approver = %approver, pinger = %pinger))]
    pub fn approve(&self, approver: UserId, pinger: UserId) -> EngineResult<Resolution> {
        let ping_key = EdgeKey::new(pinger, approver);
        let outcome = retry_on_conflict("approve_ping", self.conflict_retries, || {
            self.try_approve(ping_key).into()
        });
        self.settle(ping_key, outcome)
    }

    /// Decline the ping `pinger → approver`. Both directions end `declined`.
    #[instrument(skip(self), fields(approver = %approver, pinger = %pinger))]
    pub fn decline(&self, approver: UserId, pinger: UserId) -> EngineResult<Resolution> {
        let ping_key = EdgeKey::new(pinger, approver);
        let outcome = retry_on_conflict("decline_ping", self.conflict_retries, || {
            self.try_decline(ping_key).into()
        });
        self.settle(ping_key, outcome)
    }

    /// Exhausted conflicts report whatever the ping edge settled on.
    fn settle(&self, ping_key: EdgeKey, outcome: EngineResult<Resolution>) -> EngineResult<Resolution> {
        match outcome {
            Err(EngineError::Conflict(reason)) => {
                warn!(%reason, "ping still contended after retries");
                let ping = self.store.get_edge(ping_key)?;
                Ok(Resolution::of_edge(ping.as_ref()))
            }
            other => other,
        }
    }

    fn try_approve(&self, ping_key: EdgeKey) -> EngineResult<Resolution> {
        let ping = self.load_ping(ping_key)?;
        let reply_key = ping_key.reverse();
        let reply = self.store.get_edge(reply_key)?;

        match (ping.status(), ping.relationship_id()) {
            (EdgeStatus::Pending, _) => {
                let now = Utc::now();
                let id = RelationshipId::new();

                let reply_next = match &reply {
                    Some(e) => e.with_intent(InteractionKind::Like, EdgeStatus::Pending, None, now),
                    None => InteractionEdge::new(
                        reply_key,
                        InteractionKind::Like,
                        EdgeStatus::Pending,
                        None,
                        now,
                    ),
                }
                .matched(id, now);
                let reply_expected = Expected::observed(reply.as_ref().map(InteractionEdge::revision));

                write_pair(
                    &self.store,
                    (ping.matched(id, now), Expected::Status(ping.revision())),
                    (reply_next, reply_expected),
                    ping.clone(),
                )?;

                self.materializer.materialize_with_id(
                    id,
                    RelationshipKind::Private,
                    [ping_key.sender, ping_key.receiver],
                    ping_key.sender,
                    ping.message(),
                )?;
                Ok(Resolution::matched(id))
            }
            (EdgeStatus::Match, Some(id)) => self.repair_approval(&ping, reply.as_ref(), id),
            (status, _) => Err(EngineError::AlreadyResolved(format!(
                "ping from {} is already {}",
                ping_key.sender,
                status.as_str()
            ))),
        }
    }

    /// Finish an approval whose reply edge or relationship never landed.
    fn repair_approval(
        &self,
        ping: &InteractionEdge,
        reply: Option<&InteractionEdge>,
        id: RelationshipId,
    ) -> EngineResult<Resolution> {
        let reply_done = reply.is_some_and(|e| e.relationship_id() == Some(id));
        if (!reply_done && superseded(reply, ping))
            || (reply_done && self.materializer.is_complete(id)?)
        {
            return Err(EngineError::AlreadyResolved(format!(
                "ping from {} is already approved",
                ping.sender()
            )));
        }

        warn!(relationship_id = %id, "repairing incomplete ping approval");
        if !reply_done {
            let now = Utc::now();
            let reply_next = match reply {
                Some(e) => e.with_intent(InteractionKind::Like, EdgeStatus::Pending, None, now),
                None => InteractionEdge::new(
                    ping.key().reverse(),
                    InteractionKind::Like,
                    EdgeStatus::Pending,
                    None,
                    now,
                ),
            }
            .matched(id, now);
            self.store
                .put_edge(reply_next, Expected::observed(reply.map(InteractionEdge::revision)))?;
        }

        self.materializer.materialize_with_id(
            id,
            RelationshipKind::Private,
            [ping.sender(), ping.receiver()],
            ping.sender(),
            ping.message(),
        )?;
        Ok(Resolution::matched(id))
    }

    fn try_decline(&self, ping_key: EdgeKey) -> EngineResult<Resolution> {
        let ping = self.load_ping(ping_key)?;
        let reply_key = ping_key.reverse();
        let reply = self.store.get_edge(reply_key)?;
        let now = Utc::now();

        let reply_next = match &reply {
            Some(e) => e.with_intent(InteractionKind::Dislike, EdgeStatus::Declined, None, now),
            None => InteractionEdge::new(
                reply_key,
                InteractionKind::Dislike,
                EdgeStatus::Declined,
                None,
                now,
            ),
        };
        let reply_expected = Expected::observed(reply.as_ref().map(InteractionEdge::revision));

        match ping.status() {
            EdgeStatus::Pending => {
                write_pair(
                    &self.store,
                    (ping.declined(now), Expected::Status(ping.revision())),
                    (reply_next, reply_expected),
                    ping.clone(),
                )?;
                Ok(Resolution::declined())
            }
            EdgeStatus::Declined
                if !reply.as_ref().is_some_and(|e| e.status().is_declined())
                    && !superseded(reply.as_ref(), &ping) =>
            {
                warn!("repairing incomplete ping decline");
                self.store.put_edge(reply_next, reply_expected)?;
                Ok(Resolution::declined())
            }
            status => Err(EngineError::AlreadyResolved(format!(
                "ping from {} is already {}",
                ping_key.sender,
                status.as_str()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryRelationshipStore;
    use std::sync::Arc;

    type Store = Arc<InMemoryRelationshipStore>;

    fn setup() -> (Store, PingApprovals<Store>) {
        let store: Store = Arc::new(InMemoryRelationshipStore::new());
        let materializer = Materializer::new(store.clone(), "welcome");
        (store.clone(), PingApprovals::new(store, materializer, 1))
    }

    fn ping(store: &Store, from: UserId, to: UserId, message: &str) {
        let edge = InteractionEdge::new(
            EdgeKey::new(from, to),
            InteractionKind::Ping,
            EdgeStatus::Pending,
            Some(message.to_string()),
            Utc::now(),
        );
        store.put_edge(edge, Expected::Absent).unwrap();
    }

    #[test]
    fn approve_seeds_relationship_with_ping_message() {
        let (store, pings) = setup();
        let (a, b) = (UserId::new(), UserId::new());
        ping(&store, a, b, "hi");

        let resolution = pings.approve(b, a).unwrap();
        let id = resolution.relationship_id.unwrap();
        assert_eq!(resolution.status, EdgeStatus::Match);

        let forward = store.get_edge(EdgeKey::new(a, b)).unwrap().unwrap();
        let reply = store.get_edge(EdgeKey::new(b, a)).unwrap().unwrap();
        assert_eq!(forward.relationship_id(), Some(id));
        assert_eq!(reply.relationship_id(), Some(id));

        let seed = store.latest_message(id).unwrap().unwrap();
        assert_eq!(seed.content, "hi");
        assert_eq!(seed.author, a);
    }

    #[test]
    fn approve_without_ping_is_not_found() {
        let (_, pings) = setup();
        let err = pings.approve(UserId::new(), UserId::new()).unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[test]
    fn decline_is_final() {
        let (store, pings) = setup();
        let (a, b) = (UserId::new(), UserId::new());
        ping(&store, a, b, "hi");

        assert_eq!(pings.decline(b, a).unwrap(), Resolution::declined());
        assert!(store.get_edge(EdgeKey::new(b, a)).unwrap().unwrap().status().is_declined());

        let err = pings.approve(b, a).unwrap_err();
        assert!(matches!(err, EngineError::AlreadyResolved(_)));
        let err = pings.decline(b, a).unwrap_err();
        assert!(matches!(err, EngineError::AlreadyResolved(_)));
    }

    #[test]
    fn second_approval_of_complete_match_is_already_resolved() {
        let (store, pings) = setup();
        let (a, b) = (UserId::new(), UserId::new());
        ping(&store, a, b, "hi");
        pings.approve(b, a).unwrap();

        let err = pings.approve(b, a).unwrap_err();
        assert!(matches!(err, EngineError::AlreadyResolved(_)));
    }

    #[test]
    fn approval_is_not_replayed_over_a_later_dislike() {
        let (store, pings) = setup();
        let (a, b) = (UserId::new(), UserId::new());
        ping(&store, a, b, "hi");
        let id = pings.approve(b, a).unwrap().relationship_id.unwrap();

        // b changes their mind after the match.
        let reply = store.get_edge(EdgeKey::new(b, a)).unwrap().unwrap();
        let later = Utc::now() + chrono::Duration::seconds(1);
        let disliked = reply.with_intent(InteractionKind::Dislike, EdgeStatus::Declined, None, later);
        store.put_edge(disliked.clone(), Expected::Status(reply.revision())).unwrap();

        let err = pings.approve(b, a).unwrap_err();
        assert!(matches!(err, EngineError::AlreadyResolved(_)));
        assert_eq!(store.get_edge(EdgeKey::new(b, a)).unwrap(), Some(disliked));
        assert!(store.get_relationship(id).unwrap().is_some());
    }

    #[test]
    fn decline_is_not_replayed_over_a_later_like() {
        let (store, pings) = setup();
        let (a, b) = (UserId::new(), UserId::new());
        ping(&store, a, b, "hi");
        pings.decline(b, a).unwrap();

        let reply = store.get_edge(EdgeKey::new(b, a)).unwrap().unwrap();
        let later = Utc::now() + chrono::Duration::seconds(1);
        let liked = reply.with_intent(InteractionKind::Like, EdgeStatus::Pending, None, later);
        store.put_edge(liked.clone(), Expected::Status(reply.revision())).unwrap();

        let err = pings.decline(b, a).unwrap_err();
        assert!(matches!(err, EngineError::AlreadyResolved(_)));
        assert_eq!(store.get_edge(EdgeKey::new(b, a)).unwrap(), Some(liked));
    }

    #[test]
    fn reapproval_repairs_missing_relationship() {
        let (store, pings) = setup();
        let (a, b) = (UserId::new(), UserId::new());
        let id = RelationshipId::new();
        let now = Utc::now();
        // Ping edge matched but neither reply nor relationship were written.
        let edge = InteractionEdge::new(
            EdgeKey::new(a, b),
            InteractionKind::Ping,
            EdgeStatus::Pending,
            Some("hey".to_string()),
            now,
        )
        .matched(id, now);
        store.put_edge(edge, Expected::Absent).unwrap();

        assert_eq!(pings.approve(b, a).unwrap(), Resolution::matched(id));
        assert_eq!(
            store.get_edge(EdgeKey::new(b, a)).unwrap().unwrap().relationship_id(),
            Some(id)
        );
        assert_eq!(store.latest_message(id).unwrap().unwrap().content, "hey");
    }
}
