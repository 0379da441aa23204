//! Engine facade: the operation contract exposed to callers.
//!
//! ```text
//! CreateOrUpdateInteraction ─┬─ like/dislike/ping ──→ MutualIntentResolver
//!                            └─ approve/reject ─────→ PingApprovals
//! ApprovePing / DeclinePing ────────────────────────→ PingApprovals
//! CreateGroupInvite / ApproveOrDeclineGroupInvite ──→ GroupInvites
//! Get* listings ────────────→ RelationshipStore indexes + ProfileDirectory
//! ```
//!
//! String vocabularies (kind, action, invite status) are parsed here so that
//! malformed input fails before any store access. Listings read secondary
//! indexes and may trail concurrent writes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::instrument;

use kindred_core::{InviteId, RelationshipId, UserId};
use kindred_interactions::{
    Action, EdgeStatus, IntentRequest, InteractionEdge, InteractionKind, Invite, InviteDecision,
    RelationshipKind,
};

use crate::config::EngineConfig;
use crate::directory::{ProfileDirectory, ProfileSummary};
use crate::error::EngineResult;
use crate::group_invite::{GroupInvites, InviteResolution};
use crate::materializer::Materializer;
use crate::ping::Resolution;
use crate::resolver::MutualIntentResolver;
use crate::store::RelationshipStore;

/// Longest last-message preview, in characters.
pub const PREVIEW_CHARS: usize = 80;

/// An edge as seen from one of its endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InteractionView {
    pub edge: InteractionEdge,
    pub counterpart: UserId,
    pub counterpart_profile: Option<ProfileSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessagePreview {
    pub author: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// One private match of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutualView {
    pub relationship_id: RelationshipId,
    pub counterpart: UserId,
    pub counterpart_profile: Option<ProfileSummary>,
    pub last_message: Option<MessagePreview>,
}

/// One active group of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupView {
    pub relationship_id: RelationshipId,
    pub members: Vec<UserId>,
    pub member_profiles: Vec<ProfileSummary>,
    pub created_at: DateTime<Utc>,
}

pub struct InteractionService<S, D> {
    store: S,
    directory: D,
    resolver: MutualIntentResolver<S>,
    invites: GroupInvites<S, D>,
}

impl<S, D> InteractionService<S, D>
where
    S: RelationshipStore + Clone,
    D: ProfileDirectory + Clone,
{
    pub fn new(store: S, directory: D, config: &EngineConfig) -> Self {
        let resolver = MutualIntentResolver::new(
            store.clone(),
            config.default_seed_message.clone(),
            config.conflict_retries,
        );
        let materializer = Materializer::new(store.clone(), config.default_seed_message.clone());
        let invites = GroupInvites::new(
            store.clone(),
            directory.clone(),
            materializer,
            config.conflict_retries,
        );
        Self {
            store,
            directory,
            resolver,
            invites,
        }
    }

    /// `CreateOrUpdateInteraction(sender, receiver, kind, action, message?)`.
    #[instrument(skip(self, message), fields(sender = %sender, receiver = %receiver))]
    pub fn create_or_update_interaction(
        &self,
        sender: UserId,
        receiver: UserId,
        kind: &str,
        action: &str,
        message: Option<&str>,
    ) -> EngineResult<Resolution> {
        let kind: InteractionKind = kind.parse()?;
        let action: Action = action.parse()?;
        self.resolver.resolve(IntentRequest {
            sender,
            receiver,
            kind,
            action,
            message: message.map(str::to_string),
        })
    }

    /// `sender` approves the pending ping `receiver → sender`.
    pub fn approve_ping(&self, sender: UserId, receiver: UserId) -> EngineResult<Resolution> {
        self.resolver.pings().approve(sender, receiver)
    }

    /// `sender` declines the pending ping `receiver → sender`.
    pub fn decline_ping(&self, sender: UserId, receiver: UserId) -> EngineResult<EdgeStatus> {
        Ok(self.resolver.pings().decline(sender, receiver)?.status)
    }

    #[instrument(skip(self))]
    pub fn sent_interactions(&self, user: UserId) -> EngineResult<Vec<InteractionView>> {
        let edges = self.store.edges_sent(user)?;
        self.views(edges, InteractionEdge::receiver)
    }

    #[instrument(skip(self))]
    pub fn received_interactions(&self, user: UserId) -> EngineResult<Vec<InteractionView>> {
        let edges = self.store.edges_received(user)?;
        self.views(edges, InteractionEdge::sender)
    }

    fn views(
        &self,
        edges: Vec<InteractionEdge>,
        counterpart_of: impl Fn(&InteractionEdge) -> UserId,
    ) -> EngineResult<Vec<InteractionView>> {
        edges
            .into_iter()
            .map(|edge| -> EngineResult<InteractionView> {
                let counterpart = counterpart_of(&edge);
                Ok(InteractionView {
                    counterpart_profile: self.directory.summary(counterpart)?,
                    counterpart,
                    edge,
                })
            })
            .collect()
    }

    /// Private matches of `user`, newest first, each with its last-message preview.
    #[instrument(skip(self))]
    pub fn mutual_relationships(&self, user: UserId) -> EngineResult<Vec<MutualView>> {
        let mut views: Vec<MutualView> = Vec::new();
        for edge in self.store.edges_by_status(user, EdgeStatus::Match)? {
            let Some(id) = edge.relationship_id() else {
                continue;
            };
            if views.iter().any(|v| v.relationship_id == id) {
                continue;
            }
            // Skip matches whose relationship is still being written.
            let Some(relationship) = self.store.get_relationship(id)? else {
                continue;
            };
            if relationship.kind() != RelationshipKind::Private {
                continue;
            }

            let counterpart = edge.receiver();
            let last_message = self.store.latest_message(id)?.map(|m| MessagePreview {
                author: m.author,
                content: preview(&m.content),
                created_at: m.created_at,
            });
            views.push(MutualView {
                relationship_id: id,
                counterpart,
                counterpart_profile: self.directory.summary(counterpart)?,
                last_message,
            });
        }
        Ok(views)
    }

    /// `CreateGroupInvite(inviter, approver, invitee)`.
    pub fn create_group_invite(
        &self,
        inviter: UserId,
        approver: UserId,
        invitee: UserId,
    ) -> EngineResult<InviteId> {
        self.invites.create(inviter, approver, invitee)
    }

    pub fn pending_approvals(&self, approver: UserId) -> EngineResult<Vec<Invite>> {
        self.invites.pending_approvals(approver)
    }

    pub fn sent_invites(&self, inviter: UserId) -> EngineResult<Vec<Invite>> {
        self.invites.sent_invites(inviter)
    }

    /// `ApproveOrDeclineGroupInvite(approver, invitee, status)`.
    pub fn approve_or_decline_group_invite(
        &self,
        approver: UserId,
        invitee: UserId,
        status: &str,
    ) -> EngineResult<InviteResolution> {
        let decision: InviteDecision = status.parse()?;
        self.invites.decide(approver, invitee, decision)
    }

    #[instrument(skip(self))]
    pub fn active_groups(&self, user: UserId) -> EngineResult<Vec<GroupView>> {
        self.invites
            .active_groups(user)?
            .into_iter()
            .map(|group| -> EngineResult<GroupView> {
                let members: Vec<UserId> = group.members().iter().copied().collect();
                let member_profiles = members
                    .iter()
                    .filter_map(|m| self.directory.summary(*m).transpose())
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(GroupView {
                    relationship_id: group.relationship_id(),
                    members,
                    member_profiles,
                    created_at: group.created_at(),
                })
            })
            .collect()
    }
}

fn preview(content: &str) -> String {
    match content.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}…", &content[..cut]),
        None => content.to_string(),
    }
}
