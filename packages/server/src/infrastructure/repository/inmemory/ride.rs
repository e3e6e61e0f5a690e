//! InMemory RideStore 実装

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{RepositoryError, Ride, RideId, RideRequestId, RideStore, UserId};

#[derive(Default)]
struct RideTable {
    rides: HashMap<RideId, Ride>,
    by_request: HashMap<RideRequestId, RideId>,
    current_ride: HashMap<UserId, RideId>,
}

/// インメモリ RideStore
#[derive(Default)]
pub struct InMemoryRideStore {
    table: Mutex<RideTable>,
}

impl InMemoryRideStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RideStore for InMemoryRideStore {
    async fn insert_ride(&self, ride: &Ride) -> Result<(), RepositoryError> {
        let mut table = self.table.lock().await;
        if table.by_request.contains_key(&ride.request_id) {
            return Err(RepositoryError::DuplicateRide(
                ride.request_id.to_string(),
            ));
        }
        table
            .by_request
            .insert(ride.request_id.clone(), ride.id.clone());
        table.rides.insert(ride.id.clone(), ride.clone());
        Ok(())
    }

    async fn save_ride(&self, ride: &Ride) -> Result<(), RepositoryError> {
        let mut table = self.table.lock().await;
        match table.rides.get_mut(&ride.id) {
            Some(stored) => {
                *stored = ride.clone();
                Ok(())
            }
            None => Err(RepositoryError::RideNotFound(ride.id.to_string())),
        }
    }

    async fn get_ride(&self, ride_id: &RideId) -> Result<Option<Ride>, RepositoryError> {
        let table = self.table.lock().await;
        Ok(table.rides.get(ride_id).cloned())
    }

    async fn find_ride_by_request(
        &self,
        request_id: &RideRequestId,
    ) -> Result<Option<Ride>, RepositoryError> {
        let table = self.table.lock().await;
        Ok(table
            .by_request
            .get(request_id)
            .and_then(|ride_id| table.rides.get(ride_id))
            .cloned())
    }

    async fn current_ride_for(&self, driver: &UserId) -> Result<Option<RideId>, RepositoryError> {
        let table = self.table.lock().await;
        Ok(table.current_ride.get(driver).cloned())
    }

    async fn assign_current_ride(
        &self,
        driver: &UserId,
        ride_id: Option<RideId>,
    ) -> Result<(), RepositoryError> {
        let mut table = self.table.lock().await;
        match ride_id {
            Some(ride_id) => {
                table.current_ride.insert(driver.clone(), ride_id);
            }
            None => {
                table.current_ride.remove(driver);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Coordinate, RideClass, RideRequest, RideStatus, Timestamp};

    fn user(id: &str) -> UserId {
        UserId::new(id.to_string()).unwrap()
    }

    fn create_test_ride(request_id: &str) -> Ride {
        let request = RideRequest::new(
            RideRequestId::new(request_id.to_string()).unwrap(),
            user("passenger"),
            Coordinate::new(3.38, 6.52).unwrap(),
            RideClass::Urban,
            Timestamp::new(0),
        );
        Ride::from_request(RideId::generate(), &request, user("driver"), Timestamp::new(1))
    }

    #[tokio::test]
    async fn test_insert_and_find_by_request() {
        // テスト項目: 保存した Ride を ID とリクエスト ID の両方で引ける
        // given (前提条件):
        let store = InMemoryRideStore::new();
        let ride = create_test_ride("req-1");

        // when (操作):
        store.insert_ride(&ride).await.unwrap();

        // then (期待する結果):
        assert_eq!(store.get_ride(&ride.id).await.unwrap(), Some(ride.clone()));
        assert_eq!(
            store.find_ride_by_request(&ride.request_id).await.unwrap(),
            Some(ride)
        );
    }

    #[tokio::test]
    async fn test_insert_duplicate_request_is_rejected() {
        // テスト項目: 同じリクエストに 2 つ目の Ride は作れない
        // given (前提条件):
        let store = InMemoryRideStore::new();
        store.insert_ride(&create_test_ride("req-1")).await.unwrap();

        // when (操作):
        let result = store.insert_ride(&create_test_ride("req-1")).await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(RepositoryError::DuplicateRide("req-1".to_string()))
        );
    }

    #[tokio::test]
    async fn test_save_ride_updates_status() {
        // テスト項目: 上書き保存で状態が更新され、未保存の Ride はエラー
        // given (前提条件):
        let store = InMemoryRideStore::new();
        let mut ride = create_test_ride("req-1");
        store.insert_ride(&ride).await.unwrap();

        // when (操作):
        ride.transition_to(RideStatus::Started).unwrap();
        store.save_ride(&ride).await.unwrap();
        let unknown = store.save_ride(&create_test_ride("req-2")).await;

        // then (期待する結果):
        let stored = store.get_ride(&ride.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RideStatus::Started);
        assert!(matches!(unknown, Err(RepositoryError::RideNotFound(_))));
    }

    #[tokio::test]
    async fn test_assign_and_clear_current_ride() {
        // テスト項目: ドライバーの担当 Ride を設定・解除できる
        // given (前提条件):
        let store = InMemoryRideStore::new();
        let ride_id = RideId::new("ride-1".to_string()).unwrap();

        // when (操作):
        store
            .assign_current_ride(&user("driver"), Some(ride_id.clone()))
            .await
            .unwrap();
        let assigned = store.current_ride_for(&user("driver")).await.unwrap();
        store.assign_current_ride(&user("driver"), None).await.unwrap();
        let cleared = store.current_ride_for(&user("driver")).await.unwrap();

        // then (期待する結果):
        assert_eq!(assigned, Some(ride_id));
        assert_eq!(cleared, None);
    }
}
