use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wayfare_core::models::{DeliveryRequest, RequestStatus};

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRequestRequest {
    trip_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct UpdateStatusRequest {
    status: RequestStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResponse {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub applicant_id: Uuid,
    pub status: RequestStatus,
    pub accepted_at: Option<DateTime<Utc>>,
    pub in_transit_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<DeliveryRequest> for RequestResponse {
    fn from(request: DeliveryRequest) -> Self {
        Self {
            id: request.id,
            trip_id: request.trip_id,
            applicant_id: request.applicant_id,
            status: request.status,
            accepted_at: request.accepted_at,
            in_transit_at: request.in_transit_at,
            delivered_at: request.delivered_at,
            cancelled_at: request.cancelled_at,
            created_at: request.created_at,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/requests", post(create_request))
        .route("/v1/requests/{id}", get(get_request))
        .route("/v1/requests/{id}/status", patch(update_status))
}

async fn create_request(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateRequestRequest>,
) -> Result<(StatusCode, Json<RequestResponse>), AppError> {
    let request = state
        .coordinator
        .create_request(req.trip_id, user.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(request.into())))
}

async fn get_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(request_id): Path<Uuid>,
) -> Result<Json<RequestResponse>, AppError> {
    let request = state
        .coordinator
        .get_request(request_id, user.user_id)
        .await?;
    Ok(Json(request.into()))
}

/// Single entry point for every request-level transition; the coordinator
/// routes the target status to the operation that owns it.
async fn update_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(request_id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<RequestResponse>, AppError> {
    let request = state
        .coordinator
        .update_request_status(request_id, req.status, user.user_id)
        .await?;
    Ok(Json(request.into()))
}
