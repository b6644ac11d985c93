use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use wayfare_core::events::EventKind;
use wayfare_core::models::{RequestStatus, Trip, TripStatus};

use crate::coordinator::BookingCoordinator;
use crate::error::BookingError;
use crate::outbox::Outbox;

/// Input for publishing a new trip.
#[derive(Debug, Clone, Deserialize)]
pub struct TripDraft {
    pub origin: String,
    pub destination: String,
    pub capacity: i32,
    pub departure_at: DateTime<Utc>,
}

/// Trip-level lifecycle gate: publish, complete, cancel.
///
/// Trip status moves out of PUBLISHED exactly once, by explicit publisher
/// action. Cancelling cascades over outstanding requests; completing
/// deliberately does not, each request settles its own delivery axis.
impl BookingCoordinator {
    pub async fn publish_trip(
        &self,
        publisher_id: Uuid,
        draft: TripDraft,
    ) -> Result<Trip, BookingError> {
        if draft.capacity < 1 {
            return Err(BookingError::InvalidCapacity);
        }
        let trip = Trip::publish(
            publisher_id,
            draft.origin,
            draft.destination,
            draft.capacity,
            draft.departure_at,
        );
        self.store().insert_trip(&trip).await?;
        info!(trip_id = %trip.id, capacity = trip.capacity, "trip published");
        Ok(trip)
    }

    /// Cancel a trip and every request still outstanding on it, in one unit
    /// of work. booked_seats is left as-is: once the trip is cancelled no
    /// reservation can happen against it, the count is a historical artifact.
    pub async fn cancel_trip(&self, trip_id: Uuid, actor_id: Uuid) -> Result<Trip, BookingError> {
        let (trip, outbox) = self.run(|| self.try_cancel_trip(trip_id, actor_id)).await?;
        info!(trip_id = %trip.id, "trip cancelled");
        self.dispatch(outbox).await;
        Ok(trip)
    }

    /// Mark a trip complete. Does not touch request statuses: a publisher
    /// closing out a trip is independent of each request's own
    /// DELIVERED/COMPLETED progression.
    pub async fn complete_trip(&self, trip_id: Uuid, actor_id: Uuid) -> Result<Trip, BookingError> {
        let (trip, outbox) = self
            .run(|| self.try_complete_trip(trip_id, actor_id))
            .await?;
        info!(trip_id = %trip.id, "trip completed");
        self.dispatch(outbox).await;
        Ok(trip)
    }

    async fn try_cancel_trip(
        &self,
        trip_id: Uuid,
        actor_id: Uuid,
    ) -> Result<(Trip, Outbox), BookingError> {
        let mut tx = self.lock(trip_id).await?;
        let mut trip = tx.trip().await?;

        if trip.publisher_id != actor_id {
            return Err(BookingError::Forbidden);
        }
        if trip.status != TripStatus::Published {
            return Err(BookingError::InvalidTripTransition {
                from: trip.status,
                to: TripStatus::Cancelled,
            });
        }

        let now = Utc::now();
        let mut outbox = Outbox::new();
        for mut request in tx.cancellable_requests().await? {
            request.record_status(RequestStatus::Cancelled, now);
            tx.save_request(&request).await?;
            outbox.push(
                EventKind::RequestCancelled,
                request.applicant_id,
                trip.id,
                Some(request.id),
                now,
            );
        }

        trip.update_status(TripStatus::Cancelled);
        tx.save_trip(&trip).await?;
        tx.commit().await?;

        outbox.push(EventKind::TripCancelled, trip.publisher_id, trip.id, None, now);
        Ok((trip, outbox))
    }

    async fn try_complete_trip(
        &self,
        trip_id: Uuid,
        actor_id: Uuid,
    ) -> Result<(Trip, Outbox), BookingError> {
        let mut tx = self.lock(trip_id).await?;
        let mut trip = tx.trip().await?;

        if trip.publisher_id != actor_id {
            return Err(BookingError::Forbidden);
        }
        if trip.status != TripStatus::Published {
            return Err(BookingError::InvalidTripTransition {
                from: trip.status,
                to: TripStatus::Completed,
            });
        }

        trip.update_status(TripStatus::Completed);
        tx.save_trip(&trip).await?;
        tx.commit().await?;

        let mut outbox = Outbox::new();
        outbox.push(
            EventKind::TripCompleted,
            trip.publisher_id,
            trip.id,
            None,
            trip.updated_at,
        );
        Ok((trip, outbox))
    }
}
