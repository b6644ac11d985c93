use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use wayfare_booking::BookingError;

#[derive(Debug)]
pub enum AppError {
    Unauthenticated(String),
    BadRequest(String),
    Booking(BookingError),
    Anyhow(anyhow::Error),
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        Self::Booking(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}

/// Machine-readable kind plus status for every core failure. Internal
/// failures keep their detail in the logs, not the response.
fn booking_status(err: &BookingError) -> (StatusCode, &'static str) {
    use BookingError::*;
    match err {
        TripNotFound | RequestNotFound => (StatusCode::NOT_FOUND, "not_found"),
        Forbidden => (StatusCode::FORBIDDEN, "forbidden"),
        InvalidTransition { .. } | InvalidTripTransition { .. } => {
            (StatusCode::BAD_REQUEST, "invalid_transition")
        }
        TripNotBookable => (StatusCode::BAD_REQUEST, "trip_not_bookable"),
        NoAvailableCapacity => (StatusCode::BAD_REQUEST, "no_available_capacity"),
        CannotCancelCompleted => (StatusCode::BAD_REQUEST, "cannot_cancel_completed"),
        SelfRequest => (StatusCode::BAD_REQUEST, "self_request"),
        InvalidCapacity => (StatusCode::BAD_REQUEST, "invalid_capacity"),
        DuplicateActiveRequest => (StatusCode::CONFLICT, "duplicate_active_request"),
        Timeout | Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            AppError::Unauthenticated(msg) => (StatusCode::UNAUTHORIZED, "unauthenticated", msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            AppError::Booking(err) => {
                let (status, kind) = booking_status(&err);
                let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!("booking operation failed: {err}");
                    "Internal Server Error".to_string()
                } else {
                    err.to_string()
                };
                (status, kind, message)
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "kind": kind,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
