use uuid::Uuid;

use crate::models::{DeliveryRequest, Trip};

/// An actor's role relative to one booking. Transition authority is decided
/// against this, not against the account-level role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripRole {
    Publisher,
    Applicant,
}

impl TripRole {
    /// Resolve the caller against a (trip, request) pair. Returns `None` for
    /// callers that are party to neither side.
    pub fn resolve(actor_id: Uuid, trip: &Trip, request: &DeliveryRequest) -> Option<Self> {
        if actor_id == trip.publisher_id {
            Some(TripRole::Publisher)
        } else if actor_id == request.applicant_id {
            Some(TripRole::Applicant)
        } else {
            None
        }
    }
}
