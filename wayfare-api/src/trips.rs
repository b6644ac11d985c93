use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wayfare_booking::TripDraft;
use wayfare_core::models::{Trip, TripStatus};

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTripRequest {
    origin: String,
    destination: String,
    capacity: i32,
    departure_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct UpdateTripRequest {
    status: TripStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TripResponse {
    pub id: Uuid,
    pub publisher_id: Uuid,
    pub origin: String,
    pub destination: String,
    pub capacity: i32,
    pub booked_seats: i32,
    pub status: TripStatus,
    pub departure_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<Trip> for TripResponse {
    fn from(trip: Trip) -> Self {
        Self {
            id: trip.id,
            publisher_id: trip.publisher_id,
            origin: trip.origin,
            destination: trip.destination,
            capacity: trip.capacity,
            booked_seats: trip.booked_seats,
            status: trip.status,
            departure_at: trip.departure_at,
            created_at: trip.created_at,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/trips", post(create_trip))
        .route("/v1/trips/{id}", get(get_trip).patch(update_trip))
}

async fn create_trip(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateTripRequest>,
) -> Result<(StatusCode, Json<TripResponse>), AppError> {
    let trip = state
        .coordinator
        .publish_trip(
            user.user_id,
            TripDraft {
                origin: req.origin,
                destination: req.destination,
                capacity: req.capacity,
                departure_at: req.departure_at,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(trip.into())))
}

async fn get_trip(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(trip_id): Path<Uuid>,
) -> Result<Json<TripResponse>, AppError> {
    let trip = state.coordinator.get_trip(trip_id).await?;
    Ok(Json(trip.into()))
}

/// Trip-level status change: COMPLETED or CANCELLED, publisher only.
async fn update_trip(
    State(state): State<AppState>,
    user: AuthUser,
    Path(trip_id): Path<Uuid>,
    Json(req): Json<UpdateTripRequest>,
) -> Result<Json<TripResponse>, AppError> {
    let trip = match req.status {
        TripStatus::Completed => state.coordinator.complete_trip(trip_id, user.user_id).await?,
        TripStatus::Cancelled => state.coordinator.cancel_trip(trip_id, user.user_id).await?,
        TripStatus::Published => {
            return Err(AppError::BadRequest(
                "a trip cannot be moved back to PUBLISHED".into(),
            ));
        }
    };
    Ok(Json(trip.into()))
}
