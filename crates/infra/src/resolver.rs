//! Mutual-intent resolution.
//!
//! Every transition is read → [`decide`] → conditional write. Two requests
//! racing on the same pair both read, but only one of their conditional writes
//! can land; the other re-reads and re-decides against the new state.
//!
//! ## Matching a pair
//!
//! A mutual like writes both edges as `match` under one freshly generated
//! relationship id. The two writes always go in the pair's canonical claim
//! order ([`EdgeKey::claim_order`]) so racing requests contend on the same
//! first record. If the second write is rejected the first is compensated back
//! to its prior state. The relationship itself is materialized last; a request
//! that finds its edge already matched re-materializes the same id, which is
//! what makes an interrupted match repairable by repeating the like.
//!
//! ## Never zero
//!
//! Two simultaneous first likes can each observe "no counterpart" and both
//! write `pending`. After writing its own pending like, a request re-reads the
//! counterpart; if that is a pending like too, it claims the match itself.

use chrono::Utc;
use tracing::{debug, instrument, warn};

use kindred_core::{Expected, RelationshipId};
use kindred_interactions::{
    Action, Decision, EdgeKey, EdgeStatus, IntentRequest, InteractionEdge, InteractionKind,
    RelationshipKind, decide,
};

use crate::error::{retry_on_conflict, EngineError, EngineResult};
use crate::materializer::Materializer;
use crate::ping::{write_pair, PingApprovals, Resolution};
use crate::store::{RelationshipStore, StoreError};

/// Resolves like/dislike/ping intents and routes approve/reject to the ping workflow.
#[derive(Debug, Clone)]
pub struct MutualIntentResolver<S> {
    store: S,
    materializer: Materializer<S>,
    pings: PingApprovals<S>,
    conflict_retries: u32,
}

impl<S> MutualIntentResolver<S>
where
    S: RelationshipStore + Clone,
{
    pub fn new(store: S, default_seed: impl Into<String>, conflict_retries: u32) -> Self {
        let materializer = Materializer::new(store.clone(), default_seed);
        let pings = PingApprovals::new(store.clone(), materializer.clone(), conflict_retries);
        Self {
            store,
            materializer,
            pings,
            conflict_retries,
        }
    }

    pub fn pings(&self) -> &PingApprovals<S> {
        &self.pings
    }

    pub fn materializer(&self) -> &Materializer<S> {
        &self.materializer
    }

    #[instrument(
        skip(self, request),
        fields(
            sender = %request.sender,
            receiver = %request.receiver,
            action = request.action.as_str(),
        )
    )]
    pub fn resolve(&self, request: IntentRequest) -> EngineResult<Resolution> {
        request.validate()?;
        let key = request.key();

        let outcome = match request.action {
            Action::Approve => return self.pings.approve(request.sender, request.receiver),
            Action::Reject => return self.pings.decline(request.sender, request.receiver),
            Action::Like => retry_on_conflict("like", self.conflict_retries, || {
                self.try_like(key).into()
            }),
            Action::Dislike => retry_on_conflict("dislike", self.conflict_retries, || {
                self.try_dislike(key).into()
            }),
            Action::Ping => retry_on_conflict("ping", self.conflict_retries, || {
                self.try_ping(key, request.message.as_deref()).into()
            }),
        };

        match outcome {
            // A lost race is benign: report what the sender's edge says now.
            Err(EngineError::Conflict(reason)) => {
                warn!(%reason, "intent still contended after retries");
                let own = self.store.get_edge(key)?;
                Ok(Resolution::of_edge(own.as_ref()))
            }
            other => other,
        }
    }

    fn try_like(&self, key: EdgeKey) -> EngineResult<Resolution> {
        let own = self.store.get_edge(key)?;
        let counterpart = self.store.get_edge(key.reverse())?;

        match decide(Action::Like, own.as_ref(), counterpart.as_ref()) {
            Decision::Pending => {
                let written = self.write_intent(key, own.as_ref(), InteractionKind::Like, None)?;

                // Re-read: a concurrent first like may have landed meanwhile.
                let counterpart = self.store.get_edge(key.reverse())?;
                match counterpart {
                    Some(c) if c.is_pending_like() => self.claim_mutual(key, Some(&written), &c),
                    Some(c) if c.status() == EdgeStatus::Match => {
                        // The counterpart matched us under an id we have not seen yet.
                        Err(EngineError::Conflict(format!("{} matched concurrently", c.key())))
                    }
                    _ => Ok(Resolution::pending()),
                }
            }
            Decision::Mutual => match counterpart.as_ref() {
                Some(c) => self.claim_mutual(key, own.as_ref(), c),
                None => Err(EngineError::Conflict(format!("{} vanished", key.reverse()))),
            },
            Decision::Restore(id) => self.restore(key, own.as_ref(), id),
            Decision::AlreadyMatched(id) => self.ensure_matched(key, counterpart.as_ref(), id),
            other => Err(EngineError::InvariantViolation(format!(
                "like produced decision {other:?}"
            ))),
        }
    }

    /// Move both edges of the pair to `match` under one new relationship id.
    fn claim_mutual(
        &self,
        key: EdgeKey,
        own: Option<&InteractionEdge>,
        counterpart: &InteractionEdge,
    ) -> EngineResult<Resolution> {
        let now = Utc::now();
        let id = RelationshipId::new();

        let own_pending = self.like_edge(key, own, now);
        let own_claim = (
            own_pending.matched(id, now),
            Expected::observed(own.map(InteractionEdge::revision)),
        );
        let counterpart_claim = (
            counterpart.matched(id, now),
            Expected::Status(counterpart.revision()),
        );

        let (first, _) = key.claim_order();
        if first == key {
            write_pair(&self.store, own_claim, counterpart_claim, own_pending)?;
        } else {
            write_pair(&self.store, counterpart_claim, own_claim, counterpart.clone())?;
        }

        self.materializer.materialize_with_id(
            id,
            RelationshipKind::Private,
            [key.sender, key.receiver],
            key.sender,
            None,
        )?;
        Ok(Resolution::matched(id))
    }

    /// Re-join a relationship the counterpart is still matched under.
    fn restore(
        &self,
        key: EdgeKey,
        own: Option<&InteractionEdge>,
        id: RelationshipId,
    ) -> EngineResult<Resolution> {
        let now = Utc::now();
        let next = self.like_edge(key, own, now).matched(id, now);
        debug!(edge = %key, relationship_id = %id, "restoring match");
        self.store
            .put_edge(next, Expected::observed(own.map(InteractionEdge::revision)))?;
        self.ensure_materialized(key, id)?;
        Ok(Resolution::matched(id))
    }

    /// The sender is already matched: finish whatever part of the match is missing.
    fn ensure_matched(
        &self,
        key: EdgeKey,
        counterpart: Option<&InteractionEdge>,
        id: RelationshipId,
    ) -> EngineResult<Resolution> {
        if let Some(c) = counterpart.filter(|c| c.is_pending_like()) {
            warn!(edge = %c.key(), relationship_id = %id, "completing half-written match");
            match self
                .store
                .put_edge(c.matched(id, Utc::now()), Expected::Status(c.revision()))
            {
                Ok(()) | Err(StoreError::Conflict(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        self.ensure_materialized(key, id)?;
        Ok(Resolution::matched(id))
    }

    fn ensure_materialized(&self, key: EdgeKey, id: RelationshipId) -> EngineResult<()> {
        if !self.materializer.is_complete(id)? {
            warn!(relationship_id = %id, "repairing incomplete relationship");
            self.materializer.materialize_with_id(
                id,
                RelationshipKind::Private,
                [key.sender, key.receiver],
                key.sender,
                None,
            )?;
        }
        Ok(())
    }

    fn try_dislike(&self, key: EdgeKey) -> EngineResult<Resolution> {
        let own = self.store.get_edge(key)?;
        if own
            .as_ref()
            .is_some_and(|e| e.kind() == InteractionKind::Dislike && e.status() == EdgeStatus::Declined)
        {
            return Ok(Resolution::declined());
        }

        let now = Utc::now();
        let next = match &own {
            Some(e) => e.with_intent(InteractionKind::Dislike, EdgeStatus::Declined, None, now),
            None => InteractionEdge::new(key, InteractionKind::Dislike, EdgeStatus::Declined, None, now),
        };
        debug!(edge = %key, "conditional write");
        self.store
            .put_edge(next, Expected::observed(own.as_ref().map(InteractionEdge::revision)))?;
        Ok(Resolution::declined())
    }

    fn try_ping(&self, key: EdgeKey, message: Option<&str>) -> EngineResult<Resolution> {
        let own = self.store.get_edge(key)?;
        let counterpart = self.store.get_edge(key.reverse())?;

        match decide(Action::Ping, own.as_ref(), counterpart.as_ref()) {
            Decision::AlreadyMatched(id) => self.ensure_matched(key, counterpart.as_ref(), id),
            Decision::Pending => {
                self.write_intent(key, own.as_ref(), InteractionKind::Ping, message)?;
                Ok(Resolution::pending())
            }
            other => Err(EngineError::InvariantViolation(format!(
                "ping produced decision {other:?}"
            ))),
        }
    }

    /// Write the sender's edge as a pending intent of `kind`.
    fn write_intent(
        &self,
        key: EdgeKey,
        own: Option<&InteractionEdge>,
        kind: InteractionKind,
        message: Option<&str>,
    ) -> EngineResult<InteractionEdge> {
        let now = Utc::now();
        let message = message.map(str::to_string);
        let next = match own {
            Some(e) => e.with_intent(kind, EdgeStatus::Pending, message, now),
            None => InteractionEdge::new(key, kind, EdgeStatus::Pending, message, now),
        };
        debug!(edge = %key, kind = kind.as_str(), "conditional write");
        self.store
            .put_edge(next.clone(), Expected::observed(own.map(InteractionEdge::revision)))?;
        Ok(next)
    }

    fn like_edge(
        &self,
        key: EdgeKey,
        own: Option<&InteractionEdge>,
        now: chrono::DateTime<Utc>,
    ) -> InteractionEdge {
        match own {
            Some(e) if e.is_pending_like() => e.clone(),
            Some(e) => e.with_intent(InteractionKind::Like, EdgeStatus::Pending, None, now),
            None => InteractionEdge::new(key, InteractionKind::Like, EdgeStatus::Pending, None, now),
        }
    }
}
