//! Integration tests for the full engine.
//!
//! Tests: InteractionService → resolver / workflows → RelationshipStore
//!
//! Verifies:
//! - Mutual likes produce exactly one relationship and one seed message
//! - Ping approval and decline finality
//! - Group invites end up in every member's active groups
//! - Concurrent likes on the same pair converge on one relationship
//! - Interrupted transitions are repaired by re-issuing the same action

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier, Mutex};

    use kindred_core::{Expected, RelationshipId, UserId};
    use kindred_interactions::{
        EdgeKey, EdgeRevision, EdgeStatus, InteractionEdge, InteractionKind, Invite, InviteKey,
        InviteStatus, Relationship, RelationshipStatus, SeedMessage,
    };

    use crate::config::EngineConfig;
    use crate::directory::InMemoryProfileDirectory;
    use crate::error::EngineError;
    use crate::ping::Resolution;
    use crate::service::InteractionService;
    use crate::store::{InMemoryRelationshipStore, RelationshipStore, StoreError};

    type Engine<S> = InteractionService<Arc<S>, Arc<InMemoryProfileDirectory>>;

    struct Harness<S> {
        store: Arc<S>,
        directory: Arc<InMemoryProfileDirectory>,
        engine: Engine<S>,
    }

    impl<S: RelationshipStore> Harness<S> {
        fn with_store(store: S) -> Self {
            Self::with_config(store, &EngineConfig::default())
        }

        fn with_config(store: S, config: &EngineConfig) -> Self {
            kindred_observability::init();
            let store = Arc::new(store);
            let directory = Arc::new(InMemoryProfileDirectory::new());
            let engine = InteractionService::new(store.clone(), directory.clone(), config);
            Self {
                store,
                directory,
                engine,
            }
        }

        fn user(&self, name: &str) -> UserId {
            let id = UserId::new();
            self.directory.register(id, name, None).unwrap();
            id
        }

        fn edge(&self, sender: UserId, receiver: UserId) -> InteractionEdge {
            self.store
                .get_edge(EdgeKey::new(sender, receiver))
                .unwrap()
                .expect("edge should exist")
        }

        fn like(&self, sender: UserId, receiver: UserId) -> Result<Resolution, EngineError> {
            self.engine
                .create_or_update_interaction(sender, receiver, "like", "like", None)
        }

        fn dislike(&self, sender: UserId, receiver: UserId) -> Result<Resolution, EngineError> {
            self.engine
                .create_or_update_interaction(sender, receiver, "dislike", "dislike", None)
        }

        fn ping(&self, sender: UserId, receiver: UserId, message: &str) -> Result<Resolution, EngineError> {
            self.engine
                .create_or_update_interaction(sender, receiver, "ping", "ping", Some(message))
        }
    }

    fn harness() -> Harness<InMemoryRelationshipStore> {
        Harness::with_store(InMemoryRelationshipStore::new())
    }

    #[test]
    fn like_without_reciprocation_stays_pending() {
        let h = harness();
        let (a, b) = (h.user("a"), h.user("b"));

        let r = h.like(a, b).unwrap();
        assert_eq!(r.status, EdgeStatus::Pending);
        assert_eq!(r.relationship_id, None);
        assert!(h.edge(a, b).is_pending_like());
        assert!(h.engine.mutual_relationships(a).unwrap().is_empty());
    }

    #[test]
    fn reciprocal_like_creates_one_relationship_with_one_seed() {
        let h = harness();
        let (a, b) = (h.user("a"), h.user("b"));

        h.like(a, b).unwrap();
        let r = h.like(b, a).unwrap();
        let id = r.relationship_id.expect("match should carry a relationship id");

        assert_eq!(h.edge(a, b).relationship_id(), Some(id));
        assert_eq!(h.edge(b, a).relationship_id(), Some(id));
        let rel = h.store.get_relationship(id).unwrap().unwrap();
        assert_eq!(rel.members().len(), 2);
        let messages = h.store.messages(id).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, crate::config::DEFAULT_SEED_MESSAGE);

        let mutual = h.engine.mutual_relationships(a).unwrap();
        assert_eq!(mutual.len(), 1);
        assert_eq!(mutual[0].relationship_id, id);
        assert_eq!(mutual[0].counterpart, b);
        assert_eq!(mutual[0].counterpart_profile.as_ref().unwrap().display_name, "b");
        assert!(mutual[0].last_message.is_some());
    }

    #[test]
    fn dislike_twice_is_idempotent() {
        let h = harness();
        let (a, b) = (h.user("a"), h.user("b"));

        assert_eq!(h.dislike(a, b).unwrap(), Resolution::declined());
        assert_eq!(h.dislike(a, b).unwrap(), Resolution::declined());

        let edge = h.edge(a, b);
        assert_eq!(edge.status(), EdgeStatus::Declined);
        assert_eq!(edge.relationship_id(), None);
        assert!(h.store.edges_by_status(a, EdgeStatus::Match).unwrap().is_empty());
    }

    #[test]
    fn concurrent_likes_produce_exactly_one_relationship() {
        for _ in 0..50 {
            let h = Arc::new(harness());
            let (a, b) = (h.user("a"), h.user("b"));
            let barrier = Arc::new(Barrier::new(2));

            let handles: Vec<_> = [(a, b), (b, a)]
                .into_iter()
                .map(|(sender, receiver)| {
                    let h = h.clone();
                    let barrier = barrier.clone();
                    std::thread::spawn(move || {
                        barrier.wait();
                        h.like(sender, receiver).unwrap()
                    })
                })
                .collect();
            let results: Vec<Resolution> = handles.into_iter().map(|t| t.join().unwrap()).collect();

            let forward = h.edge(a, b);
            let backward = h.edge(b, a);
            assert_eq!(forward.status(), EdgeStatus::Match, "never zero");
            assert_eq!(backward.status(), EdgeStatus::Match, "never zero");
            let id = forward.relationship_id().unwrap();
            assert_eq!(backward.relationship_id(), Some(id), "never two");

            for r in results.iter().filter(|r| r.status == EdgeStatus::Match) {
                assert_eq!(r.relationship_id, Some(id));
            }
            assert!(h.store.get_relationship(id).unwrap().is_some());
            assert_eq!(h.store.messages(id).unwrap().len(), 1);
        }
    }

    #[test]
    fn ping_approval_seeds_with_ping_message() {
        let h = harness();
        let (a, b) = (h.user("a"), h.user("b"));

        assert_eq!(h.ping(a, b, "hi").unwrap(), Resolution::pending());
        let received = h.engine.received_interactions(b).unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].edge.message(), Some("hi"));
        assert_eq!(received[0].counterpart, a);

        let r = h.engine.approve_ping(b, a).unwrap();
        let id = r.relationship_id.unwrap();
        let rel = h.store.get_relationship(id).unwrap().unwrap();
        assert!(rel.is_member(a) && rel.is_member(b));
        assert_eq!(h.store.latest_message(id).unwrap().unwrap().content, "hi");
    }

    #[test]
    fn approve_through_interaction_action() {
        let h = harness();
        let (a, b) = (h.user("a"), h.user("b"));
        h.ping(a, b, "coffee?").unwrap();

        let r = h
            .engine
            .create_or_update_interaction(b, a, "ping", "approve", None)
            .unwrap();
        assert_eq!(r.status, EdgeStatus::Match);
        assert_eq!(h.edge(b, a).relationship_id(), r.relationship_id);
    }

    #[test]
    fn declined_ping_cannot_be_approved() {
        let h = harness();
        let (a, b) = (h.user("a"), h.user("b"));
        h.ping(a, b, "hi").unwrap();

        assert_eq!(h.engine.decline_ping(b, a).unwrap(), EdgeStatus::Declined);
        assert_eq!(h.edge(a, b).status(), EdgeStatus::Declined);
        assert_eq!(h.edge(b, a).status(), EdgeStatus::Declined);
        assert!(h.engine.mutual_relationships(a).unwrap().is_empty());

        let err = h.engine.approve_ping(b, a).unwrap_err();
        assert!(matches!(err, EngineError::AlreadyResolved(_)));
        let err = h
            .engine
            .create_or_update_interaction(b, a, "ping", "reject", None)
            .unwrap_err();
        assert!(matches!(err, EngineError::AlreadyResolved(_)));
    }

    #[test]
    fn pinged_users_dislike_leaves_ping_pending() {
        let h = harness();
        let (a, b) = (h.user("a"), h.user("b"));
        h.ping(a, b, "hi").unwrap();

        h.dislike(b, a).unwrap();
        assert!(h.edge(a, b).is_pending_ping());

        // The ping can still be answered explicitly.
        let r = h.engine.approve_ping(b, a).unwrap();
        assert_eq!(r.status, EdgeStatus::Match);
    }

    #[test]
    fn pingers_dislike_withdraws_the_ping() {
        let h = harness();
        let (a, b) = (h.user("a"), h.user("b"));
        h.ping(a, b, "hi").unwrap();

        h.dislike(a, b).unwrap();
        let edge = h.edge(a, b);
        assert_eq!(edge.kind(), InteractionKind::Dislike);
        assert_eq!(edge.status(), EdgeStatus::Declined);

        let err = h.engine.approve_ping(b, a).unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[test]
    fn like_toward_pending_ping_does_not_match() {
        let h = harness();
        let (a, b) = (h.user("a"), h.user("b"));
        h.ping(a, b, "hi").unwrap();

        assert_eq!(h.like(b, a).unwrap(), Resolution::pending());
        assert!(h.edge(a, b).is_pending_ping());
    }

    #[test]
    fn dislike_after_match_keeps_the_relationship() {
        let h = harness();
        let (a, b) = (h.user("a"), h.user("b"));
        h.like(a, b).unwrap();
        let id = h.like(b, a).unwrap().relationship_id.unwrap();

        h.dislike(a, b).unwrap();
        assert_eq!(h.edge(a, b).status(), EdgeStatus::Declined);
        let rel = h.store.get_relationship(id).unwrap().unwrap();
        assert_eq!(rel.status(), RelationshipStatus::Active);
        assert!(h.engine.mutual_relationships(a).unwrap().is_empty());
        assert_eq!(h.engine.mutual_relationships(b).unwrap().len(), 1);
    }

    #[test]
    fn sent_interactions_are_newest_first_with_profiles() {
        let h = harness();
        let (a, b, c) = (h.user("a"), h.user("b"), h.user("c"));
        h.like(a, b).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        h.dislike(a, c).unwrap();

        let sent = h.engine.sent_interactions(a).unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].counterpart, c);
        assert_eq!(sent[0].counterpart_profile.as_ref().unwrap().display_name, "c");
        assert_eq!(sent[1].counterpart, b);
    }

    #[test]
    fn malformed_requests_are_rejected_before_any_write() {
        let h = harness();
        let (a, b) = (h.user("a"), h.user("b"));

        let err = h
            .engine
            .create_or_update_interaction(a, b, "like", "superlike", None)
            .unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedAction(_)));

        let err = h
            .engine
            .create_or_update_interaction(a, b, "", "like", None)
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        let err = h
            .engine
            .create_or_update_interaction(a, b, "ping", "ping", None)
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        assert!(h.engine.sent_interactions(a).unwrap().is_empty());
    }

    #[test]
    fn group_invite_requires_known_invitee() {
        let h = harness();
        let (a, b) = (h.user("a"), h.user("b"));
        let c = UserId::new();

        let err = h.engine.create_group_invite(a, b, c).unwrap_err();
        assert_eq!(err, EngineError::InvalidInvitee(c));
        assert!(h.engine.sent_invites(a).unwrap().is_empty());
        assert!(h.engine.pending_approvals(b).unwrap().is_empty());
    }

    #[test]
    fn approved_group_invite_is_visible_in_active_groups() {
        let h = harness();
        let (a, b, c) = (h.user("a"), h.user("b"), h.user("c"));

        let invite_id = h.engine.create_group_invite(a, b, c).unwrap();
        let pending = h.engine.pending_approvals(b).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].invite_id(), invite_id);

        let r = h
            .engine
            .approve_or_decline_group_invite(b, c, "approved")
            .unwrap();
        assert_eq!(r.status, InviteStatus::Approved);
        let id = r.relationship_id.unwrap();

        let groups = h.engine.active_groups(c).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].relationship_id, id);
        assert_eq!(groups[0].members.len(), 3);
        assert_eq!(groups[0].member_profiles.len(), 3);

        let sent = h.engine.sent_invites(a).unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].status(), InviteStatus::Approved);

        let err = h
            .engine
            .approve_or_decline_group_invite(b, c, "declined")
            .unwrap_err();
        assert!(matches!(err, EngineError::AlreadyResolved(_)));
    }

    #[test]
    fn unknown_invite_status_is_a_validation_error() {
        let h = harness();
        let err = h
            .engine
            .approve_or_decline_group_invite(UserId::new(), UserId::new(), "maybe")
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    type EdgeHook = Box<dyn FnOnce(&InMemoryRelationshipStore, &InteractionEdge) + Send>;

    /// Store wrapper that rejects selected writes once, or lets another
    /// writer touch an edge right before a write to it lands.
    #[derive(Default)]
    struct FlakyStore {
        inner: InMemoryRelationshipStore,
        fail_edge: Mutex<Option<(EdgeKey, StoreError)>>,
        fail_relationship: Mutex<Option<StoreError>>,
        before_edge_write: Mutex<Option<(EdgeKey, EdgeHook)>>,
    }

    impl FlakyStore {
        fn before_edge_write_once(
            &self,
            key: EdgeKey,
            hook: impl FnOnce(&InMemoryRelationshipStore, &InteractionEdge) + Send + 'static,
        ) {
            *self.before_edge_write.lock().unwrap() = Some((key, Box::new(hook)));
        }

        fn fail_edge_once(&self, key: EdgeKey, err: StoreError) {
            *self.fail_edge.lock().unwrap() = Some((key, err));
        }

        fn fail_relationship_once(&self, err: StoreError) {
            *self.fail_relationship.lock().unwrap() = Some(err);
        }
    }

    impl RelationshipStore for FlakyStore {
        fn get_edge(&self, key: EdgeKey) -> Result<Option<InteractionEdge>, StoreError> {
            self.inner.get_edge(key)
        }

        fn put_edge(&self, edge: InteractionEdge, expected: Expected<EdgeRevision>) -> Result<(), StoreError> {
            let hook = {
                let mut slot = self.before_edge_write.lock().unwrap();
                match slot.take() {
                    Some((key, hook)) if key == edge.key() => Some(hook),
                    other => {
                        *slot = other;
                        None
                    }
                }
            };
            if let Some(hook) = hook {
                hook(&self.inner, &edge);
            }

            let mut fail = self.fail_edge.lock().unwrap();
            if fail.as_ref().is_some_and(|(key, _)| *key == edge.key()) {
                if let Some((_, err)) = fail.take() {
                    return Err(err);
                }
            }
            drop(fail);
            self.inner.put_edge(edge, expected)
        }

        fn edges_sent(&self, sender: UserId) -> Result<Vec<InteractionEdge>, StoreError> {
            self.inner.edges_sent(sender)
        }

        fn edges_received(&self, receiver: UserId) -> Result<Vec<InteractionEdge>, StoreError> {
            self.inner.edges_received(receiver)
        }

        fn edges_by_status(&self, sender: UserId, status: EdgeStatus) -> Result<Vec<InteractionEdge>, StoreError> {
            self.inner.edges_by_status(sender, status)
        }

        fn get_relationship(&self, id: RelationshipId) -> Result<Option<Relationship>, StoreError> {
            self.inner.get_relationship(id)
        }

        fn put_relationship(
            &self,
            relationship: Relationship,
            expected: Expected<RelationshipStatus>,
        ) -> Result<(), StoreError> {
            if let Some(err) = self.fail_relationship.lock().unwrap().take() {
                return Err(err);
            }
            self.inner.put_relationship(relationship, expected)
        }

        fn put_message(&self, message: SeedMessage) -> Result<(), StoreError> {
            self.inner.put_message(message)
        }

        fn messages(&self, relationship_id: RelationshipId) -> Result<Vec<SeedMessage>, StoreError> {
            self.inner.messages(relationship_id)
        }

        fn latest_message(&self, relationship_id: RelationshipId) -> Result<Option<SeedMessage>, StoreError> {
            self.inner.latest_message(relationship_id)
        }

        fn get_invite(&self, key: InviteKey) -> Result<Option<Invite>, StoreError> {
            self.inner.get_invite(key)
        }

        fn put_invite(&self, invite: Invite, expected: Expected<InviteStatus>) -> Result<(), StoreError> {
            self.inner.put_invite(invite, expected)
        }

        fn invites_by_approver(&self, approver: UserId) -> Result<Vec<Invite>, StoreError> {
            self.inner.invites_by_approver(approver)
        }

        fn invites_by_subject(&self, subject: UserId) -> Result<Vec<Invite>, StoreError> {
            self.inner.invites_by_subject(subject)
        }
    }

    #[test]
    fn failed_second_edge_write_is_compensated() {
        let h = Harness::with_store(FlakyStore::default());
        let (a, b) = (h.user("a"), h.user("b"));
        h.like(a, b).unwrap();

        let (_, second) = EdgeKey::new(b, a).claim_order();
        h.store
            .fail_edge_once(second, StoreError::Unavailable("injected".into()));

        let err = h.like(b, a).unwrap_err();
        assert!(matches!(err, EngineError::StoreUnavailable(_)));
        assert!(h.edge(a, b).is_pending_like(), "first write reverted");
        assert!(h.edge(b, a).is_pending_like());

        // Re-issuing the same like completes the match.
        let r = h.like(b, a).unwrap();
        assert_eq!(r.status, EdgeStatus::Match);
        assert_eq!(h.edge(a, b).relationship_id(), r.relationship_id);
    }

    #[test]
    fn lost_race_on_second_edge_is_retried_internally() {
        let h = Harness::with_store(FlakyStore::default());
        let (a, b) = (h.user("a"), h.user("b"));
        h.like(a, b).unwrap();

        let (_, second) = EdgeKey::new(b, a).claim_order();
        h.store
            .fail_edge_once(second, StoreError::Conflict("injected".into()));

        let r = h.like(b, a).unwrap();
        assert_eq!(r.status, EdgeStatus::Match);
        let id = r.relationship_id.unwrap();
        assert_eq!(h.edge(a, b).relationship_id(), Some(id));
        assert_eq!(h.edge(b, a).relationship_id(), Some(id));
        assert_eq!(h.store.messages(id).unwrap().len(), 1);
    }

    #[test]
    fn interrupted_materialization_is_repaired_on_reissue() {
        let h = Harness::with_store(FlakyStore::default());
        let (a, b) = (h.user("a"), h.user("b"));
        h.like(a, b).unwrap();
        h.store
            .fail_relationship_once(StoreError::Unavailable("injected".into()));

        let err = h.like(b, a).unwrap_err();
        assert!(matches!(err, EngineError::StoreUnavailable(_)));
        let id = h.edge(b, a).relationship_id().unwrap();
        assert!(h.store.get_relationship(id).unwrap().is_none());

        let r = h.like(b, a).unwrap();
        assert_eq!(r, Resolution::matched(id));
        assert!(h.store.get_relationship(id).unwrap().is_some());
        assert_eq!(h.store.messages(id).unwrap().len(), 1);
    }

    #[test]
    fn ping_resent_during_a_match_claim_is_not_matched() {
        let h = Harness::with_store(FlakyStore::default());
        let (a, b) = (h.user("a"), h.user("b"));
        h.like(a, b).unwrap();

        // a turns their like into a ping while b's like is claiming the match.
        h.store.before_edge_write_once(EdgeKey::new(a, b), move |inner, _| {
            let like = inner.get_edge(EdgeKey::new(a, b)).unwrap().unwrap();
            let ping = like.with_intent(
                InteractionKind::Ping,
                EdgeStatus::Pending,
                Some("hi there".to_string()),
                chrono::Utc::now(),
            );
            inner.put_edge(ping, Expected::Status(like.revision())).unwrap();
        });

        let r = h.like(b, a).unwrap();
        assert_eq!(r, Resolution::pending());
        let ping = h.edge(a, b);
        assert!(ping.is_pending_ping());
        assert_eq!(ping.message(), Some("hi there"));
        assert!(h.edge(b, a).is_pending_like());
        assert!(h.store.edges_by_status(b, EdgeStatus::Match).unwrap().is_empty());

        // The ping still resolves only through an explicit approval.
        let id = h.engine.approve_ping(b, a).unwrap().relationship_id.unwrap();
        assert_eq!(h.store.latest_message(id).unwrap().unwrap().content, "hi there");
    }

    #[test]
    fn second_edge_already_matched_concurrently_is_not_undone() {
        let config = EngineConfig {
            conflict_retries: 0,
            ..EngineConfig::default()
        };
        let h = Harness::with_config(FlakyStore::default(), &config);
        let (a, b) = (h.user("a"), h.user("b"));
        h.like(b, a).unwrap();

        // The counterpart restores the same match right before our second write.
        let (first, second) = EdgeKey::new(a, b).claim_order();
        h.store.before_edge_write_once(second, |inner, incoming| {
            inner.put_edge(incoming.clone(), Expected::Any).unwrap();
        });

        let r = h.like(a, b).unwrap();
        assert_eq!(r.status, EdgeStatus::Match);
        let id = r.relationship_id.unwrap();

        let first_edge = h.store.get_edge(first).unwrap().unwrap();
        let second_edge = h.store.get_edge(second).unwrap().unwrap();
        assert_eq!(first_edge.status(), EdgeStatus::Match, "first write kept");
        assert_eq!(first_edge.relationship_id(), Some(id));
        assert_eq!(second_edge.relationship_id(), Some(id));
        assert_eq!(h.store.messages(id).unwrap().len(), 1);
    }

    #[test]
    fn approving_again_after_a_later_dislike_is_already_resolved() {
        let h = harness();
        let (a, b) = (h.user("a"), h.user("b"));
        h.ping(a, b, "hi").unwrap();
        let id = h.engine.approve_ping(b, a).unwrap().relationship_id.unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        h.dislike(b, a).unwrap();

        let err = h.engine.approve_ping(b, a).unwrap_err();
        assert!(matches!(err, EngineError::AlreadyResolved(_)));
        let reply = h.edge(b, a);
        assert_eq!(reply.kind(), InteractionKind::Dislike);
        assert_eq!(reply.status(), EdgeStatus::Declined);
        assert!(h.store.get_relationship(id).unwrap().is_some());
    }
}
