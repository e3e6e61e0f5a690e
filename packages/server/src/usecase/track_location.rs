//! UseCase: ドライバー位置情報の保存と ride tracking ルームへの配信

use std::sync::Arc;

use ridelink_shared::time::Clock;

use crate::domain::{
    Coordinate, LocationSample, LocationStore, RideId, RideStore, RoomId, RoomMembership,
    ServerEvent, Timestamp, UserId,
};

use super::error::LocationError;

/// 位置情報のユースケース
pub struct TrackLocationUseCase {
    locations: Arc<dyn LocationStore>,
    rides: Arc<dyn RideStore>,
    rooms: Arc<dyn RoomMembership>,
    clock: Arc<dyn Clock>,
}

impl TrackLocationUseCase {
    pub fn new(
        locations: Arc<dyn LocationStore>,
        rides: Arc<dyn RideStore>,
        rooms: Arc<dyn RoomMembership>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            locations,
            rides,
            rooms,
            clock,
        }
    }

    /// 位置情報を保存し、担当中の Ride の追跡ルームへ配信する
    ///
    /// 配信できたメンバー数を返す。担当 Ride がない、または追跡者がいない場合は 0。
    pub async fn publish(
        &self,
        driver: &UserId,
        coordinate: Coordinate,
    ) -> Result<usize, LocationError> {
        let sample = LocationSample {
            driver: driver.clone(),
            coordinate,
            recorded_at: Timestamp::new(self.clock.now_millis()),
        };
        self.locations.save_sample(sample.clone()).await?;

        let Some(ride_id) = self.rides.current_ride_for(driver).await? else {
            return Ok(0);
        };
        let room_id = RoomId::ride_tracking(&ride_id);
        if !self.rooms.has_members(&room_id) {
            return Ok(0);
        }

        let event = ServerEvent::RideLocationUpdate {
            ride_id,
            driver_id: sample.driver,
            coordinates: sample.coordinate,
            recorded_at: sample.recorded_at,
        };
        let delivered = self.rooms.broadcast_event(&room_id, &event)?;
        tracing::trace!(driver = %driver, room_id = %room_id, delivered, "location broadcast");
        Ok(delivered)
    }

    /// Ride の追跡ルームに参加する（過去の位置情報は送らない）
    pub fn subscribe(&self, identity: &UserId, ride_id: &RideId) -> bool {
        self.rooms.join(identity, &RoomId::ride_tracking(ride_id))
    }

    /// ドライバーの最新の位置情報
    pub async fn latest(&self, driver: &UserId) -> Result<Option<LocationSample>, LocationError> {
        Ok(self.locations.latest(driver).await?)
    }
}
