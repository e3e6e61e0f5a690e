//! UseCase: マッチング後の Ride の状態遷移（到着・開始・完了）

use std::sync::Arc;

use crate::domain::{
    ConnectionRegistry, DriverDirectory, Ride, RideId, RideStatus, RideStore, ServerEvent, UserId,
};

use super::error::RideLifecycleError;

/// Ride の状態遷移のユースケース
pub struct RideLifecycleUseCase {
    rides: Arc<dyn RideStore>,
    drivers: Arc<dyn DriverDirectory>,
    registry: Arc<dyn ConnectionRegistry>,
}

impl RideLifecycleUseCase {
    pub fn new(
        rides: Arc<dyn RideStore>,
        drivers: Arc<dyn DriverDirectory>,
        registry: Arc<dyn ConnectionRegistry>,
    ) -> Self {
        Self {
            rides,
            drivers,
            registry,
        }
    }

    /// 乗車地点への到着。乗客に `rider:arrived` を通知する
    pub async fn arrived(
        &self,
        ride_id: &RideId,
        driver: &UserId,
    ) -> Result<Ride, RideLifecycleError> {
        let ride = self.transition(ride_id, driver, RideStatus::Arrived).await?;

        let event = ServerEvent::RiderArrived {
            ride_id: ride.id.clone(),
            driver_id: driver.clone(),
        };
        if let Err(e) = self.registry.push_event(&ride.requester, &event) {
            tracing::debug!(rider = %ride.requester, error = %e, "rider:arrived not delivered");
        }
        Ok(ride)
    }

    pub async fn start(
        &self,
        ride_id: &RideId,
        driver: &UserId,
    ) -> Result<Ride, RideLifecycleError> {
        self.transition(ride_id, driver, RideStatus::Started).await
    }

    /// Ride を完了し、ドライバーを空車に戻す
    pub async fn complete(
        &self,
        ride_id: &RideId,
        driver: &UserId,
    ) -> Result<Ride, RideLifecycleError> {
        let ride = self.transition(ride_id, driver, RideStatus::Completed).await?;
        self.rides.assign_current_ride(driver, None).await?;
        self.drivers.set_available(driver, true).await?;
        Ok(ride)
    }

    async fn transition(
        &self,
        ride_id: &RideId,
        driver: &UserId,
        next: RideStatus,
    ) -> Result<Ride, RideLifecycleError> {
        let mut ride = self
            .rides
            .get_ride(ride_id)
            .await?
            .ok_or_else(|| RideLifecycleError::RideNotFound(ride_id.to_string()))?;
        if &ride.driver != driver {
            return Err(RideLifecycleError::Unauthorized(driver.to_string()));
        }

        let from = ride.status;
        ride.transition_to(next)?;
        self.rides.save_ride(&ride).await?;

        tracing::info!(ride_id = %ride.id, %from, to = %next, "ride status changed");
        Ok(ride)
    }
}
