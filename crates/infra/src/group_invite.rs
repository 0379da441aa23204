//! Three-party group invites.
//!
//! The proposal record lives under the inviter and is indexed by approver.
//! Approval is a compare-and-swap on the proposal (`pending → approved`) that
//! binds a fresh relationship id; the group and the invitee's membership record
//! are written after it. Re-issuing an approval finishes whichever of those
//! writes is missing.

use std::collections::BTreeSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use kindred_core::{Expected, InviteId, RelationshipId, UserId};
use kindred_interactions::{
    Invite, InviteDecision, InviteKey, InviteStatus, Relationship, RelationshipKind,
    RelationshipStatus,
};

use crate::directory::ProfileDirectory;
use crate::error::{retry_on_conflict, EngineError, EngineResult};
use crate::materializer::Materializer;
use crate::store::{RelationshipStore, StoreError};

/// Outcome of approving or declining an invite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteResolution {
    pub status: InviteStatus,
    pub relationship_id: Option<RelationshipId>,
}

#[derive(Debug, Clone)]
pub struct GroupInvites<S, D> {
    store: S,
    directory: D,
    materializer: Materializer<S>,
    conflict_retries: u32,
}

impl<S, D> GroupInvites<S, D>
where
    S: RelationshipStore + Clone,
    D: ProfileDirectory,
{
    pub fn new(store: S, directory: D, materializer: Materializer<S>, conflict_retries: u32) -> Self {
        Self {
            store,
            directory,
            materializer,
            conflict_retries,
        }
    }

    /// Propose adding `invitee` to a group with `inviter` and `approver`.
    ///
    /// Nothing is written unless the invitee exists.
    #[instrument(skip(self), fields(inviter = %inviter, approver = %approver, invitee = %invitee))]
    pub fn create(&self, inviter: UserId, approver: UserId, invitee: UserId) -> EngineResult<InviteId> {
        let invite = Invite::propose(InviteId::new(), inviter, approver, invitee, Utc::now())?;

        if !self.directory.exists(invitee)? {
            return Err(EngineError::InvalidInvitee(invitee));
        }

        let duplicate = self
            .store
            .invites_by_subject(inviter)?
            .into_iter()
            .any(|i| {
                i.is_proposal()
                    && i.status() == InviteStatus::Pending
                    && i.approver() == approver
                    && i.invitee() == invitee
            });
        if duplicate {
            return Err(EngineError::Validation(format!(
                "a pending invite for {invitee} already awaits {approver}"
            )));
        }

        let id = invite.invite_id();
        self.store.put_invite(invite, Expected::Absent)?;
        info!(invite_id = %id, "group invite created");
        Ok(id)
    }

    /// Approve or decline the invite of `invitee` awaiting `approver`.
    #[instrument(skip(self), fields(approver = %approver, invitee = %invitee, decision = ?decision))]
    pub fn decide(
        &self,
        approver: UserId,
        invitee: UserId,
        decision: InviteDecision,
    ) -> EngineResult<InviteResolution> {
        retry_on_conflict("decide_invite", self.conflict_retries, || {
            self.try_decide(approver, invitee, decision).into()
        })
    }

    /// Pick the proposal to act on: a pending one if any, else the newest.
    fn find_proposal(&self, approver: UserId, invitee: UserId) -> EngineResult<Invite> {
        let candidates: Vec<Invite> = self
            .store
            .invites_by_approver(approver)?
            .into_iter()
            .filter(|i| i.invitee() == invitee)
            .collect();

        let listed = candidates
            .iter()
            .find(|i| i.status() == InviteStatus::Pending)
            .or_else(|| candidates.first())
            .ok_or_else(|| {
                EngineError::NotFound(format!("no invite for {invitee} awaiting {approver}"))
            })?;

        // The approver index may lag; decide on the record itself.
        self.store
            .get_invite(listed.key())?
            .ok_or_else(|| EngineError::NotFound(format!("invite {} is gone", listed.invite_id())))
    }

    fn try_decide(
        &self,
        approver: UserId,
        invitee: UserId,
        decision: InviteDecision,
    ) -> EngineResult<InviteResolution> {
        let invite = self.find_proposal(approver, invitee)?;
        let now = Utc::now();

        match (invite.status(), decision) {
            (InviteStatus::Pending, InviteDecision::Approved) => {
                let approved = invite.approve(RelationshipId::new(), now)?;
                self.store
                    .put_invite(approved.clone(), Expected::Status(InviteStatus::Pending))?;
                self.complete_approval(&approved)
            }
            (InviteStatus::Pending, InviteDecision::Declined) => {
                let declined = invite.decline(now)?;
                self.store
                    .put_invite(declined, Expected::Status(InviteStatus::Pending))?;
                Ok(InviteResolution {
                    status: InviteStatus::Declined,
                    relationship_id: None,
                })
            }
            (InviteStatus::Approved, InviteDecision::Approved) if self.needs_repair(&invite)? => {
                warn!(invite_id = %invite.invite_id(), "repairing incomplete group approval");
                self.complete_approval(&invite)
            }
            (status, _) => Err(EngineError::AlreadyResolved(format!(
                "invite {} is already {}",
                invite.invite_id(),
                status.as_str()
            ))),
        }
    }

    fn needs_repair(&self, invite: &Invite) -> EngineResult<bool> {
        let Some(id) = invite.relationship_id() else {
            return Ok(false);
        };
        let membership = self.store.get_invite(InviteKey {
            subject: invite.invitee(),
            invite_id: invite.invite_id(),
        })?;
        Ok(membership.is_none() || !self.materializer.is_complete(id)?)
    }

    /// Write the group and the invitee's membership record for an approved proposal.
    fn complete_approval(&self, approved: &Invite) -> EngineResult<InviteResolution> {
        let membership = approved.membership_record()?;
        let id = membership.relationship_id().ok_or_else(|| {
            EngineError::InvariantViolation("approved invite without relationship".to_string())
        })?;

        self.materializer.materialize_with_id(
            id,
            RelationshipKind::Group,
            approved.members(),
            approved.approver(),
            None,
        )?;

        match self.store.put_invite(membership, Expected::Absent) {
            Ok(()) | Err(StoreError::Conflict(_)) => {}
            Err(e) => return Err(e.into()),
        }

        Ok(InviteResolution {
            status: InviteStatus::Approved,
            relationship_id: Some(id),
        })
    }

    /// Proposals awaiting `approver`'s decision.
    pub fn pending_approvals(&self, approver: UserId) -> EngineResult<Vec<Invite>> {
        Ok(self
            .store
            .invites_by_approver(approver)?
            .into_iter()
            .filter(|i| i.status() == InviteStatus::Pending)
            .collect())
    }

    /// Every proposal `inviter` created, whatever its status.
    pub fn sent_invites(&self, inviter: UserId) -> EngineResult<Vec<Invite>> {
        Ok(self
            .store
            .invites_by_subject(inviter)?
            .into_iter()
            .filter(Invite::is_proposal)
            .collect())
    }

    /// Active groups `user` belongs to through an approved invite in any role.
    pub fn active_groups(&self, user: UserId) -> EngineResult<Vec<Relationship>> {
        let mut invites = self.store.invites_by_subject(user)?;
        invites.extend(self.store.invites_by_approver(user)?);

        let mut seen = BTreeSet::new();
        let mut groups = Vec::new();
        for id in invites
            .iter()
            .filter(|i| i.status() == InviteStatus::Approved)
            .filter_map(Invite::relationship_id)
        {
            if !seen.insert(id) {
                continue;
            }
            // Listings tolerate a group that is still being written.
            if let Some(group) = self.store.get_relationship(id)? {
                if group.kind() == RelationshipKind::Group
                    && group.status() == RelationshipStatus::Active
                    && group.is_member(user)
                {
                    groups.push(group);
                }
            }
        }
        Ok(groups)
    }
}
