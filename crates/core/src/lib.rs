//! `kindred-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the domain error model, entity traits and the write
//! precondition used for compare-and-swap persistence.

pub mod entity;
pub mod error;
pub mod id;
pub mod precondition;

pub use entity::{Entity, StatusEntity};
pub use error::{DomainError, DomainResult};
pub use id::{InviteId, MessageId, RelationshipId, UserId};
pub use precondition::Expected;
