use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of booking lifecycle event emitted after a committed transition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    RequestCreated,
    RequestAccepted,
    RequestRejected,
    RequestInTransit,
    RequestDelivered,
    RequestCompleted,
    RequestCancelled,
    RatingRequested,
    TripCancelled,
    TripCompleted,
}

/// A lifecycle event addressed to one recipient. Delivery is best-effort and
/// strictly post-commit; the booking outcome never depends on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub kind: EventKind,
    pub recipient: Uuid,
    pub trip_id: Uuid,
    pub request_id: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Downstream notification dispatcher. Implementations must not be awaited
/// for durability before the caller is answered.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, event: &LifecycleEvent) -> Result<(), NotifyError>;
}
