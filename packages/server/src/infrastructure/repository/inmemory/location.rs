//! InMemory LocationStore 実装

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{LocationSample, LocationStore, RepositoryError, UserId};

/// インメモリ LocationStore（ドライバーごとに最新サンプルのみ保持）
#[derive(Default)]
pub struct InMemoryLocationStore {
    latest: RwLock<HashMap<UserId, LocationSample>>,
}

impl InMemoryLocationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocationStore for InMemoryLocationStore {
    async fn save_sample(&self, sample: LocationSample) -> Result<(), RepositoryError> {
        let mut latest = self.latest.write().await;
        latest.insert(sample.driver.clone(), sample);
        Ok(())
    }

    async fn latest(&self, driver: &UserId) -> Result<Option<LocationSample>, RepositoryError> {
        let latest = self.latest.read().await;
        Ok(latest.get(driver).cloned())
    }

    async fn all_latest(&self) -> Result<Vec<LocationSample>, RepositoryError> {
        let latest = self.latest.read().await;
        Ok(latest.values().cloned().collect())
    }
}
