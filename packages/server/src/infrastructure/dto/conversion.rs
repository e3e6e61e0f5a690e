//! Conversion logic between DTOs and domain entities.

use ridelink_shared::time::timestamp_to_rfc3339;

use crate::domain::{
    Coordinate, DriverProfile, Ride, RideRequest, RideRequestId, Timestamp, UserId,
    ValueObjectError,
};
use crate::infrastructure::dto::http as dto;

// ========================================
// DTO → Domain Entity
// ========================================

impl TryFrom<dto::RegisterDriverRequestDto> for DriverProfile {
    type Error = ValueObjectError;

    fn try_from(dto: dto::RegisterDriverRequestDto) -> Result<Self, Self::Error> {
        if !(0.0..=5.0).contains(&dto.vehicle_rating) {
            return Err(ValueObjectError::OutOfRange {
                field: "vehicle_rating",
                value: dto.vehicle_rating as f64,
            });
        }
        Ok(Self {
            driver: UserId::new(dto.driver_id)?,
            vehicle_rating: dto.vehicle_rating,
            is_online: dto.is_online,
            is_available: dto.is_available,
        })
    }
}

impl dto::DispatchRequestDto {
    /// Build the domain request, generating an id when the client did not send one
    pub fn into_request(self, requested_at: Timestamp) -> Result<RideRequest, ValueObjectError> {
        let id = match self.request_id {
            Some(id) => RideRequestId::new(id)?,
            None => RideRequestId::generate(),
        };
        let request = RideRequest::new(
            id,
            UserId::new(self.requester_id)?,
            Coordinate::try_from(self.pickup)?,
            self.ride_class,
            requested_at,
        );
        Ok(match self.destination {
            Some(destination) => request.with_destination(Coordinate::try_from(destination)?),
            None => request,
        })
    }
}

// ========================================
// Domain Entity → DTO
// ========================================

impl From<Ride> for dto::RideDto {
    fn from(model: Ride) -> Self {
        Self {
            ride_id: model.id.into_string(),
            request_id: model.request_id.into_string(),
            requester_id: model.requester.into_string(),
            driver_id: model.driver.into_string(),
            pickup: model.pickup.into(),
            ride_class: model.ride_class,
            status: model.status.to_string(),
            created_at: timestamp_to_rfc3339(model.created_at.value()),
        }
    }
}

impl From<DriverProfile> for dto::DriverDto {
    fn from(model: DriverProfile) -> Self {
        Self {
            driver_id: model.driver.into_string(),
            vehicle_rating: model.vehicle_rating,
            is_online: model.is_online,
            is_available: model.is_available,
        }
    }
}
