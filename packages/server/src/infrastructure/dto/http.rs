//! HTTP API DTOs.

use serde::{Deserialize, Serialize};

use crate::domain::RideClass;

/// `POST /api/drivers` request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterDriverRequestDto {
    pub driver_id: String,
    pub vehicle_rating: f32,
    #[serde(default = "default_true")]
    pub is_online: bool,
    #[serde(default = "default_true")]
    pub is_available: bool,
}

fn default_true() -> bool {
    true
}

/// Driver profile in API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverDto {
    pub driver_id: String,
    pub vehicle_rating: f32,
    pub is_online: bool,
    pub is_available: bool,
}

/// `POST /api/rides/dispatch` request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchRequestDto {
    /// Generated when omitted
    #[serde(default)]
    pub request_id: Option<String>,
    pub requester_id: String,
    /// `[longitude, latitude]`
    pub pickup: [f64; 2],
    pub ride_class: RideClass,
    /// `[longitude, latitude]`, used for the fare estimate in ride offers
    #[serde(default)]
    pub destination: Option<[f64; 2]>,
}

/// Ride in API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideDto {
    pub ride_id: String,
    pub request_id: String,
    pub requester_id: String,
    pub driver_id: String,
    pub pickup: [f64; 2],
    pub ride_class: RideClass,
    pub status: String,
    /// RFC 3339 (UTC)
    pub created_at: String,
}

/// `POST /api/rides/dispatch` response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResponseDto {
    pub request_id: String,
    /// `matched` or `cancelled`
    pub status: String,
    pub ride: Option<RideDto>,
}

/// `POST /api/rides/{request_id}/cancel` response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponseDto {
    pub request_id: String,
    pub ride: Option<RideDto>,
}

/// `POST /api/rides/{ride_id}/arrived|start|complete` request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideActionRequestDto {
    pub driver_id: String,
}

/// Error body for non-2xx responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponseDto {
    pub error: String,
}
