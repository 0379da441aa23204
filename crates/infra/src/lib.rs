//! Infrastructure layer: persistence, the interaction engine and its configuration.
//!
//! Everything here composes the pure `kindred-interactions` rules with a
//! [`store::RelationshipStore`] and a [`directory::ProfileDirectory`].

pub mod config;
pub mod directory;
pub mod error;
pub mod group_invite;
pub mod materializer;
pub mod ping;
pub mod resolver;
pub mod service;
pub mod store;

pub use config::EngineConfig;
pub use directory::{InMemoryProfileDirectory, ProfileDirectory, ProfileSummary};
pub use error::{EngineError, EngineResult};
pub use group_invite::{GroupInvites, InviteResolution};
pub use materializer::Materializer;
pub use ping::{PingApprovals, Resolution};
pub use resolver::MutualIntentResolver;
pub use service::{GroupView, InteractionService, InteractionView, MessagePreview, MutualView};
pub use store::{InMemoryRelationshipStore, PostgresRelationshipStore, RelationshipStore, StoreError};

#[cfg(test)]
mod integration_tests;
