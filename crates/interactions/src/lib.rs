//! Interactions domain module (intents, relationships, invites).
//!
//! This crate contains the business rules for one-directional intents between
//! users and the relationships they produce, implemented purely as
//! deterministic domain logic (no IO, no storage, no clocks read implicitly).

pub mod decision;
pub mod edge;
pub mod invite;
pub mod relationship;

pub use decision::{Decision, IntentRequest, decide};
pub use edge::{Action, EdgeKey, EdgeRevision, EdgeStatus, InteractionEdge, InteractionKind};
pub use invite::{Invite, InviteDecision, InviteKey, InviteRecordKind, InviteStatus};
pub use relationship::{Relationship, RelationshipKind, RelationshipStatus, SeedMessage};
