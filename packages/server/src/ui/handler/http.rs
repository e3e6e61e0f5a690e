//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    domain::{DriverProfile, RideId, RideRequestId, Timestamp, UserId},
    infrastructure::dto::http::{
        CancelResponseDto, DispatchRequestDto, DispatchResponseDto, DriverDto, ErrorResponseDto,
        RegisterDriverRequestDto, RideActionRequestDto, RideDto,
    },
    ui::state::AppState,
    usecase::{
        CancelOutcome, DispatchError, DispatchOutcome, INTERNAL_ERROR_MESSAGE, RideLifecycleError,
    },
};

type ApiError = (StatusCode, Json<ErrorResponseDto>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponseDto {
            error: message.into(),
        }),
    )
}

fn internal_error(detail: &dyn std::fmt::Display) -> ApiError {
    tracing::error!("Internal error: {}", detail);
    api_error(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE)
}

fn dispatch_error(e: DispatchError) -> ApiError {
    match &e {
        DispatchError::AlreadyDispatching(_)
        | DispatchError::AlreadyMatched(_)
        | DispatchError::InvalidTransition(_) => {
            api_error(StatusCode::CONFLICT, e.client_message())
        }
        DispatchError::RequestNotFound(_) => api_error(StatusCode::NOT_FOUND, e.client_message()),
        DispatchError::NoPendingOffer(_) => {
            api_error(StatusCode::BAD_REQUEST, e.client_message())
        }
        DispatchError::CandidateQuery(_) | DispatchError::Repository(_) => internal_error(&e),
    }
}

fn lifecycle_error(e: RideLifecycleError) -> ApiError {
    match &e {
        RideLifecycleError::RideNotFound(_) => {
            api_error(StatusCode::NOT_FOUND, e.client_message())
        }
        RideLifecycleError::Unauthorized(_) => {
            api_error(StatusCode::FORBIDDEN, e.client_message())
        }
        RideLifecycleError::InvalidTransition(_) => {
            api_error(StatusCode::CONFLICT, e.client_message())
        }
        RideLifecycleError::Repository(_) => internal_error(&e),
    }
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Register or update a driver profile
pub async fn register_driver(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterDriverRequestDto>,
) -> Result<(StatusCode, Json<DriverDto>), ApiError> {
    let profile = DriverProfile::try_from(body)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    state
        .drivers
        .upsert(profile.clone())
        .await
        .map_err(|e| internal_error(&e))?;
    tracing::info!("Driver '{}' registered", profile.driver);

    Ok((StatusCode::CREATED, Json(profile.into())))
}

/// List registered drivers
pub async fn list_drivers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<DriverDto>>, ApiError> {
    let drivers = state.drivers.list().await.map_err(|e| internal_error(&e))?;

    // Domain Model から DTO への変換
    Ok(Json(drivers.into_iter().map(DriverDto::from).collect()))
}

/// Run a dispatch and wait for its outcome
pub async fn dispatch_ride(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DispatchRequestDto>,
) -> Result<Json<DispatchResponseDto>, ApiError> {
    let requested_at = Timestamp::new(state.clock.now_millis());
    let request = body
        .into_request(requested_at)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;
    let request_id = request.id.to_string();

    match state.dispatch.dispatch(request).await {
        Ok(DispatchOutcome::Matched(ride)) => Ok(Json(DispatchResponseDto {
            request_id,
            status: "matched".to_string(),
            ride: Some(RideDto::from(ride)),
        })),
        Ok(DispatchOutcome::Cancelled) => Ok(Json(DispatchResponseDto {
            request_id,
            status: "cancelled".to_string(),
            ride: None,
        })),
        Ok(DispatchOutcome::Exhausted) => {
            Err(api_error(StatusCode::NOT_FOUND, "No riders available"))
        }
        Err(e) => Err(dispatch_error(e)),
    }
}

/// Cancel an in-flight dispatch or a matched ride
pub async fn cancel_ride(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<String>,
) -> Result<Json<CancelResponseDto>, ApiError> {
    let request_id = RideRequestId::try_from(request_id)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    let outcome = state
        .dispatch
        .cancel(&request_id)
        .await
        .map_err(dispatch_error)?;
    let ride = match outcome {
        CancelOutcome::DispatchCancelled => None,
        CancelOutcome::RideCancelled(ride) => Some(RideDto::from(ride)),
    };

    Ok(Json(CancelResponseDto {
        request_id: request_id.into_string(),
        ride,
    }))
}

fn parse_action(
    ride_id: String,
    body: RideActionRequestDto,
) -> Result<(RideId, UserId), ApiError> {
    let ride_id =
        RideId::try_from(ride_id).map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;
    let driver = UserId::try_from(body.driver_id)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;
    Ok((ride_id, driver))
}

/// Driver arrived at the pickup point
pub async fn ride_arrived(
    State(state): State<Arc<AppState>>,
    Path(ride_id): Path<String>,
    Json(body): Json<RideActionRequestDto>,
) -> Result<Json<RideDto>, ApiError> {
    let (ride_id, driver) = parse_action(ride_id, body)?;
    let ride = state
        .lifecycle
        .arrived(&ride_id, &driver)
        .await
        .map_err(lifecycle_error)?;
    Ok(Json(ride.into()))
}

/// Driver started the ride
pub async fn ride_start(
    State(state): State<Arc<AppState>>,
    Path(ride_id): Path<String>,
    Json(body): Json<RideActionRequestDto>,
) -> Result<Json<RideDto>, ApiError> {
    let (ride_id, driver) = parse_action(ride_id, body)?;
    let ride = state
        .lifecycle
        .start(&ride_id, &driver)
        .await
        .map_err(lifecycle_error)?;
    Ok(Json(ride.into()))
}

/// Driver completed the ride
pub async fn ride_complete(
    State(state): State<Arc<AppState>>,
    Path(ride_id): Path<String>,
    Json(body): Json<RideActionRequestDto>,
) -> Result<Json<RideDto>, ApiError> {
    let (ride_id, driver) = parse_action(ride_id, body)?;
    let ride = state
        .lifecycle
        .complete(&ride_id, &driver)
        .await
        .map_err(lifecycle_error)?;
    Ok(Json(ride.into()))
}
