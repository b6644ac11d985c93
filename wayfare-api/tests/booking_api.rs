use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wayfare_api::auth::issue_token;
use wayfare_api::state::{AppState, AuthConfig};
use wayfare_api::app;
use wayfare_booking::{BookingCoordinator, LogNotifier, MemoryBookingStore};

const SECRET: &str = "test-secret";

fn test_app() -> Router {
    let store = Arc::new(MemoryBookingStore::new());
    let coordinator = Arc::new(BookingCoordinator::new(store, Arc::new(LogNotifier)));
    app(AppState {
        coordinator,
        auth: AuthConfig {
            secret: SECRET.into(),
            expiration: 3600,
        },
    })
}

fn token_for(user_id: Uuid) -> String {
    issue_token(user_id, "USER", SECRET, 3600).unwrap()
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn trip_body(capacity: i32) -> Value {
    json!({
        "origin": "Bordeaux",
        "destination": "Toulouse",
        "capacity": capacity,
        "departureAt": "2026-09-01T08:00:00Z",
    })
}

async fn create_trip(app: &Router, publisher: &str, capacity: i32) -> Value {
    let (status, body) = send(
        app,
        Method::POST,
        "/v1/trips",
        Some(publisher),
        Some(trip_body(capacity)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body
}

async fn create_request(app: &Router, applicant: &str, trip_id: &str) -> Value {
    let (status, body) = send(
        app,
        Method::POST,
        "/v1/requests",
        Some(applicant),
        Some(json!({ "tripId": trip_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body
}

async fn patch_status(
    app: &Router,
    actor: &str,
    request_id: &str,
    target: &str,
) -> (StatusCode, Value) {
    send(
        app,
        Method::PATCH,
        &format!("/v1/requests/{request_id}/status"),
        Some(actor),
        Some(json!({ "status": target })),
    )
    .await
}

#[tokio::test]
async fn test_requests_need_a_valid_token() {
    let app = test_app();

    let (status, body) = send(&app, Method::POST, "/v1/trips", None, Some(trip_body(2))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["kind"], "unauthenticated");

    let (status, _) = send(
        &app,
        Method::POST,
        "/v1/trips",
        Some("not-a-jwt"),
        Some(trip_body(2)),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_full_booking_flow_over_http() {
    let app = test_app();
    let publisher = token_for(Uuid::new_v4());
    let applicant = token_for(Uuid::new_v4());

    let trip = create_trip(&app, &publisher, 2).await;
    assert_eq!(trip["status"], "PUBLISHED");
    assert_eq!(trip["bookedSeats"], 0);
    let trip_id = trip["id"].as_str().unwrap().to_owned();

    let request = create_request(&app, &applicant, &trip_id).await;
    assert_eq!(request["status"], "PENDING");
    let request_id = request["id"].as_str().unwrap().to_owned();

    let (status, accepted) = patch_status(&app, &publisher, &request_id, "ACCEPTED").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(accepted["status"], "ACCEPTED");
    assert!(accepted["acceptedAt"].is_string());

    let (status, trip_now) = send(
        &app,
        Method::GET,
        &format!("/v1/trips/{trip_id}"),
        Some(&applicant),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(trip_now["bookedSeats"], 1);

    for target in ["IN_TRANSIT", "DELIVERED", "COMPLETED"] {
        let (status, body) = patch_status(&app, &publisher, &request_id, target).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], target);
    }

    // Completed requests are terminal for cancellation.
    let (status, body) = patch_status(&app, &applicant, &request_id, "CANCELLED").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "cannot_cancel_completed");
}

#[tokio::test]
async fn test_create_request_failure_modes() {
    let app = test_app();
    let publisher_id = Uuid::new_v4();
    let publisher = token_for(publisher_id);
    let applicant = token_for(Uuid::new_v4());

    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/requests",
        Some(&applicant),
        Some(json!({ "tripId": Uuid::new_v4() })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "not_found");

    let trip = create_trip(&app, &publisher, 1).await;
    let trip_id = trip["id"].as_str().unwrap().to_owned();

    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/requests",
        Some(&publisher),
        Some(json!({ "tripId": trip_id })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "self_request");

    create_request(&app, &applicant, &trip_id).await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/requests",
        Some(&applicant),
        Some(json!({ "tripId": trip_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["kind"], "duplicate_active_request");
}

#[tokio::test]
async fn test_filled_trip_rejects_and_cancels() {
    let app = test_app();
    let publisher = token_for(Uuid::new_v4());
    let applicant_x = token_for(Uuid::new_v4());
    let applicant_y = token_for(Uuid::new_v4());

    let trip = create_trip(&app, &publisher, 1).await;
    let trip_id = trip["id"].as_str().unwrap().to_owned();

    let x = create_request(&app, &applicant_x, &trip_id).await;
    let y = create_request(&app, &applicant_y, &trip_id).await;
    let x_id = x["id"].as_str().unwrap().to_owned();
    let y_id = y["id"].as_str().unwrap().to_owned();

    let (status, _) = patch_status(&app, &publisher, &x_id, "ACCEPTED").await;
    assert_eq!(status, StatusCode::OK);

    // The surplus pending request was swept up by the fill cascade.
    let (status, y_now) = send(
        &app,
        Method::GET,
        &format!("/v1/requests/{y_id}"),
        Some(&applicant_y),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(y_now["status"], "CANCELLED");

    // And a full trip takes no new requests.
    let late = token_for(Uuid::new_v4());
    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/requests",
        Some(&late),
        Some(json!({ "tripId": trip_id })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "no_available_capacity");
}

#[tokio::test]
async fn test_transition_authorization_over_http() {
    let app = test_app();
    let publisher = token_for(Uuid::new_v4());
    let applicant = token_for(Uuid::new_v4());
    let stranger = token_for(Uuid::new_v4());

    let trip = create_trip(&app, &publisher, 2).await;
    let trip_id = trip["id"].as_str().unwrap().to_owned();
    let request = create_request(&app, &applicant, &trip_id).await;
    let request_id = request["id"].as_str().unwrap().to_owned();

    let (status, body) = patch_status(&app, &stranger, &request_id, "ACCEPTED").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["kind"], "forbidden");

    // The applicant may not drive publisher-only edges.
    let (status, _) = patch_status(&app, &applicant, &request_id, "ACCEPTED").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Skipping a stage is an invalid transition.
    let (status, body) = patch_status(&app, &publisher, &request_id, "DELIVERED").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "invalid_transition");

    // Strangers cannot even read the request.
    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/v1/requests/{request_id}"),
        Some(&stranger),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_trip_patch_endpoints() {
    let app = test_app();
    let publisher = token_for(Uuid::new_v4());
    let applicant = token_for(Uuid::new_v4());

    let trip = create_trip(&app, &publisher, 2).await;
    let trip_id = trip["id"].as_str().unwrap().to_owned();
    let request = create_request(&app, &applicant, &trip_id).await;
    let request_id = request["id"].as_str().unwrap().to_owned();

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/v1/trips/{trip_id}"),
        Some(&applicant),
        Some(json!({ "status": "CANCELLED" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["kind"], "forbidden");

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/v1/trips/{trip_id}"),
        Some(&publisher),
        Some(json!({ "status": "CANCELLED" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CANCELLED");

    // The cascade reached the outstanding request.
    let (_, request_now) = send(
        &app,
        Method::GET,
        &format!("/v1/requests/{request_id}"),
        Some(&applicant),
        None,
    )
    .await;
    assert_eq!(request_now["status"], "CANCELLED");

    // Trip status moves out of PUBLISHED exactly once.
    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/v1/trips/{trip_id}"),
        Some(&publisher),
        Some(json!({ "status": "COMPLETED" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "invalid_transition");
}

#[tokio::test]
async fn test_invalid_capacity_is_rejected() {
    let app = test_app();
    let publisher = token_for(Uuid::new_v4());

    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/trips",
        Some(&publisher),
        Some(trip_body(0)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "invalid_capacity");
}

#[tokio::test]
async fn test_guest_login_issues_usable_token() {
    let app = test_app();

    let (status, body) = send(&app, Method::POST, "/v1/auth/guest", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_owned();

    let trip = create_trip(&app, &token, 3).await;
    assert_eq!(trip["publisherId"], body["user_id"]);
}
