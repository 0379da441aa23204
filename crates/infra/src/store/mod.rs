//! Relationship persistence (trait + implementations).

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

use std::sync::Arc;

use tracing::info;

pub use in_memory::InMemoryRelationshipStore;
pub use postgres::PostgresRelationshipStore;
pub use r#trait::{RelationshipStore, StoreError};

use crate::config::EngineConfig;

/// The store `config` selects: Postgres when `database_url` is set, in-memory otherwise.
///
/// The Postgres schema is not applied here; call
/// [`PostgresRelationshipStore::migrate`] during deployment.
pub fn open(config: &EngineConfig) -> Result<Arc<dyn RelationshipStore>, StoreError> {
    match PostgresRelationshipStore::from_config(config)? {
        Some(store) => {
            info!(timeout_ms = store.timeout().as_millis() as u64, "using postgres relationship store");
            Ok(Arc::new(store))
        }
        None => {
            info!("DATABASE_URL unset, using in-memory relationship store");
            Ok(Arc::new(InMemoryRelationshipStore::new()))
        }
    }
}
