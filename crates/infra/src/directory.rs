//! Profile directory seam.
//!
//! Profiles are owned by another service; the engine only needs to know
//! whether a user exists and how to label them in listings.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use kindred_core::UserId;

use crate::store::StoreError;

/// Display data attached to listing rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub user_id: UserId,
    pub display_name: String,
    pub photo_url: Option<String>,
}

pub trait ProfileDirectory: Send + Sync {
    fn exists(&self, user: UserId) -> Result<bool, StoreError>;

    fn summary(&self, user: UserId) -> Result<Option<ProfileSummary>, StoreError>;
}

impl<D> ProfileDirectory for Arc<D>
where
    D: ProfileDirectory + ?Sized,
{
    fn exists(&self, user: UserId) -> Result<bool, StoreError> {
        (**self).exists(user)
    }

    fn summary(&self, user: UserId) -> Result<Option<ProfileSummary>, StoreError> {
        (**self).summary(user)
    }
}

/// In-memory directory for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryProfileDirectory {
    profiles: RwLock<HashMap<UserId, ProfileSummary>>,
}

impl InMemoryProfileDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a profile.
    pub fn register(
        &self,
        user_id: UserId,
        display_name: impl Into<String>,
        photo_url: Option<String>,
    ) -> Result<(), StoreError> {
        let mut profiles = self
            .profiles
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        profiles.insert(
            user_id,
            ProfileSummary {
                user_id,
                display_name: display_name.into(),
                photo_url,
            },
        );
        Ok(())
    }
}

impl ProfileDirectory for InMemoryProfileDirectory {
    fn exists(&self, user: UserId) -> Result<bool, StoreError> {
        Ok(self.summary(user)?.is_some())
    }

    fn summary(&self, user: UserId) -> Result<Option<ProfileSummary>, StoreError> {
        let profiles = self
            .profiles
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        Ok(profiles.get(&user).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_users_exist() {
        let directory = InMemoryProfileDirectory::new();
        let user = UserId::new();
        assert!(!directory.exists(user).unwrap());

        directory.register(user, "Ada", None).unwrap();
        assert!(directory.exists(user).unwrap());
        assert_eq!(directory.summary(user).unwrap().unwrap().display_name, "Ada");
    }
}
