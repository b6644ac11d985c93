use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Trip status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripStatus {
    Published,
    Completed,
    Cancelled,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Published => "PUBLISHED",
            TripStatus::Completed => "COMPLETED",
            TripStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PUBLISHED" => Some(TripStatus::Published),
            "COMPLETED" => Some(TripStatus::Completed),
            "CANCELLED" => Some(TripStatus::Cancelled),
            _ => None,
        }
    }
}

/// Delivery request status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
    InTransit,
    Delivered,
    Completed,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::Accepted => "ACCEPTED",
            RequestStatus::Rejected => "REJECTED",
            RequestStatus::InTransit => "IN_TRANSIT",
            RequestStatus::Delivered => "DELIVERED",
            RequestStatus::Completed => "COMPLETED",
            RequestStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(RequestStatus::Pending),
            "ACCEPTED" => Some(RequestStatus::Accepted),
            "REJECTED" => Some(RequestStatus::Rejected),
            "IN_TRANSIT" => Some(RequestStatus::InTransit),
            "DELIVERED" => Some(RequestStatus::Delivered),
            "COMPLETED" => Some(RequestStatus::Completed),
            "CANCELLED" => Some(RequestStatus::Cancelled),
            _ => None,
        }
    }

    /// Active requests count towards the one-active-request-per-applicant rule.
    pub fn is_active(&self) -> bool {
        !matches!(self, RequestStatus::Cancelled | RequestStatus::Rejected)
    }

    /// Whether a request in this status holds one unit of trip capacity.
    pub fn holds_capacity(&self) -> bool {
        matches!(
            self,
            RequestStatus::Accepted | RequestStatus::InTransit | RequestStatus::Delivered
        )
    }

    /// Statuses swept up by a trip-level cancellation.
    pub fn is_trip_cancellable(&self) -> bool {
        matches!(
            self,
            RequestStatus::Pending
                | RequestStatus::Accepted
                | RequestStatus::InTransit
                | RequestStatus::Delivered
        )
    }
}

/// A publisher's offer of transport/delivery capacity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: Uuid,
    pub publisher_id: Uuid,
    pub origin: String,
    pub destination: String,
    pub capacity: i32,
    pub booked_seats: i32,
    pub status: TripStatus,
    pub departure_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trip {
    pub fn publish(
        publisher_id: Uuid,
        origin: String,
        destination: String,
        capacity: i32,
        departure_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            publisher_id,
            origin,
            destination,
            capacity,
            booked_seats: 0,
            status: TripStatus::Published,
            departure_at,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_full(&self) -> bool {
        self.booked_seats >= self.capacity
    }

    pub fn update_status(&mut self, new_status: TripStatus) {
        self.status = new_status;
        self.updated_at = Utc::now();
    }
}

/// An applicant's claim against a trip's capacity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRequest {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub applicant_id: Uuid,
    pub status: RequestStatus,
    pub accepted_at: Option<DateTime<Utc>>,
    pub in_transit_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeliveryRequest {
    pub fn new(trip_id: Uuid, applicant_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            trip_id,
            applicant_id,
            status: RequestStatus::Pending,
            accepted_at: None,
            in_transit_at: None,
            delivered_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `new_status` and stamp the milestone timestamp that belongs
    /// to it. REJECTED and COMPLETED carry no dedicated timestamp column.
    pub fn record_status(&mut self, new_status: RequestStatus, at: DateTime<Utc>) {
        self.status = new_status;
        self.updated_at = at;
        match new_status {
            RequestStatus::Accepted => self.accepted_at = Some(at),
            RequestStatus::InTransit => self.in_transit_at = Some(at),
            RequestStatus::Delivered => self.delivered_at = Some(at),
            RequestStatus::Cancelled => self.cancelled_at = Some(at),
            RequestStatus::Pending | RequestStatus::Rejected | RequestStatus::Completed => {}
        }
    }
}
