//! InMemory DriverDirectory 実装

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{DriverDirectory, DriverProfile, RepositoryError, UserId};

/// インメモリ DriverDirectory
#[derive(Default)]
pub struct InMemoryDriverDirectory {
    profiles: RwLock<HashMap<UserId, DriverProfile>>,
}

impl InMemoryDriverDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DriverDirectory for InMemoryDriverDirectory {
    async fn upsert(&self, profile: DriverProfile) -> Result<(), RepositoryError> {
        let mut profiles = self.profiles.write().await;
        profiles.insert(profile.driver.clone(), profile);
        Ok(())
    }

    async fn get(&self, driver: &UserId) -> Result<Option<DriverProfile>, RepositoryError> {
        let profiles = self.profiles.read().await;
        Ok(profiles.get(driver).cloned())
    }

    async fn list(&self) -> Result<Vec<DriverProfile>, RepositoryError> {
        let profiles = self.profiles.read().await;
        let mut list: Vec<DriverProfile> = profiles.values().cloned().collect();
        list.sort_by(|a, b| a.driver.cmp(&b.driver));
        Ok(list)
    }

    async fn set_available(
        &self,
        driver: &UserId,
        available: bool,
    ) -> Result<(), RepositoryError> {
        let mut profiles = self.profiles.write().await;
        if let Some(profile) = profiles.get_mut(driver) {
            profile.is_available = available;
        }
        Ok(())
    }
}
