use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;
use wayfare_core::events::{EventKind, NotificationSink};
use wayfare_core::identity::TripRole;
use wayfare_core::models::{DeliveryRequest, RequestStatus, Trip};
use wayfare_core::store::{BookingStore, StoreError};

use crate::error::BookingError;
use crate::ledger;
use crate::outbox::Outbox;
use crate::transitions::attempt_transition;

const DEFAULT_TX_BUDGET: Duration = Duration::from_secs(10);
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Transactional unit tying the request state machine and the capacity
/// ledger together.
///
/// Every mutation re-reads state under the store's per-trip lock, applies the
/// status write and the capacity change in the same unit of work, commits,
/// and only then drains lifecycle events to the notification sink.
pub struct BookingCoordinator {
    store: Arc<dyn BookingStore>,
    sink: Arc<dyn NotificationSink>,
    tx_budget: Duration,
    max_retries: u32,
    notify_failures: AtomicU64,
}

impl BookingCoordinator {
    pub fn new(store: Arc<dyn BookingStore>, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            store,
            sink,
            tx_budget: DEFAULT_TX_BUDGET,
            max_retries: DEFAULT_MAX_RETRIES,
            notify_failures: AtomicU64::new(0),
        }
    }

    /// Override the per-operation time budget. Accept/cancel paths may
    /// cascade over many sibling requests, hence the generous default.
    pub fn with_tx_budget(mut self, budget: Duration) -> Self {
        self.tx_budget = budget;
        self
    }

    /// Count of notification deliveries that failed after a commit.
    pub fn notification_failures(&self) -> u64 {
        self.notify_failures.load(Ordering::Relaxed)
    }

    pub(crate) fn store(&self) -> &dyn BookingStore {
        self.store.as_ref()
    }

    /// File a new PENDING request by `applicant_id` against a published trip.
    pub async fn create_request(
        &self,
        trip_id: Uuid,
        applicant_id: Uuid,
    ) -> Result<DeliveryRequest, BookingError> {
        let (request, outbox) = self
            .run(|| self.try_create(trip_id, applicant_id))
            .await?;
        info!(request_id = %request.id, trip_id = %trip_id, "request created");
        self.dispatch(outbox).await;
        Ok(request)
    }

    /// Route a requested status change to the operation that owns it.
    pub async fn update_request_status(
        &self,
        request_id: Uuid,
        target: RequestStatus,
        actor_id: Uuid,
    ) -> Result<DeliveryRequest, BookingError> {
        match target {
            RequestStatus::Accepted => self.accept_request(request_id, actor_id).await,
            RequestStatus::Cancelled => self.cancel_request(request_id, actor_id).await,
            other => self.advance_request(request_id, other, actor_id).await,
        }
    }

    /// PENDING -> ACCEPTED, reserving one unit of capacity atomically with
    /// the status write. Filling the trip cascade-cancels surplus PENDING
    /// requests inside the same unit of work.
    pub async fn accept_request(
        &self,
        request_id: Uuid,
        actor_id: Uuid,
    ) -> Result<DeliveryRequest, BookingError> {
        let (request, outbox) = self.run(|| self.try_accept(request_id, actor_id)).await?;
        info!(request_id = %request.id, trip_id = %request.trip_id, "request accepted");
        self.dispatch(outbox).await;
        Ok(request)
    }

    /// Forward movement along the delivery axis (REJECTED, IN_TRANSIT,
    /// DELIVERED, COMPLETED). No capacity effects.
    pub async fn advance_request(
        &self,
        request_id: Uuid,
        target: RequestStatus,
        actor_id: Uuid,
    ) -> Result<DeliveryRequest, BookingError> {
        let (request, outbox) = self
            .run(|| self.try_advance(request_id, target, actor_id))
            .await?;
        info!(
            request_id = %request.id,
            status = request.status.as_str(),
            "request advanced"
        );
        self.dispatch(outbox).await;
        Ok(request)
    }

    /// Cancel a request, releasing its capacity unit when the prior status
    /// had consumed one.
    pub async fn cancel_request(
        &self,
        request_id: Uuid,
        actor_id: Uuid,
    ) -> Result<DeliveryRequest, BookingError> {
        let (request, outbox) = self.run(|| self.try_cancel(request_id, actor_id)).await?;
        info!(request_id = %request.id, trip_id = %request.trip_id, "request cancelled");
        self.dispatch(outbox).await;
        Ok(request)
    }

    pub async fn get_trip(&self, trip_id: Uuid) -> Result<Trip, BookingError> {
        self.store
            .fetch_trip(trip_id)
            .await?
            .ok_or(BookingError::TripNotFound)
    }

    /// Fetch a request, visible only to its applicant and the trip publisher.
    pub async fn get_request(
        &self,
        request_id: Uuid,
        actor_id: Uuid,
    ) -> Result<DeliveryRequest, BookingError> {
        let request = self
            .store
            .fetch_request(request_id)
            .await?
            .ok_or(BookingError::RequestNotFound)?;
        let trip = self.get_trip(request.trip_id).await?;
        TripRole::resolve(actor_id, &trip, &request).ok_or(BookingError::Forbidden)?;
        Ok(request)
    }

    // ------------------------------------------------------------------
    // Transactional bodies, one attempt each
    // ------------------------------------------------------------------

    async fn try_create(
        &self,
        trip_id: Uuid,
        applicant_id: Uuid,
    ) -> Result<(DeliveryRequest, Outbox), BookingError> {
        let trip = self.get_trip(trip_id).await?;
        if trip.publisher_id == applicant_id {
            return Err(BookingError::SelfRequest);
        }

        let mut tx = self.lock(trip_id).await?;
        let trip = tx.trip().await?;
        if trip.status != wayfare_core::models::TripStatus::Published {
            return Err(BookingError::TripNotBookable);
        }
        if trip.is_full() {
            return Err(BookingError::NoAvailableCapacity);
        }
        if tx.has_active_request(applicant_id).await? {
            return Err(BookingError::DuplicateActiveRequest);
        }

        let request = DeliveryRequest::new(trip_id, applicant_id);
        tx.insert_request(&request).await?;
        tx.commit().await?;

        let mut outbox = Outbox::new();
        outbox.push(
            EventKind::RequestCreated,
            trip.publisher_id,
            trip_id,
            Some(request.id),
            request.created_at,
        );
        Ok((request, outbox))
    }

    async fn try_accept(
        &self,
        request_id: Uuid,
        actor_id: Uuid,
    ) -> Result<(DeliveryRequest, Outbox), BookingError> {
        let trip_id = self.trip_of(request_id).await?;
        let mut tx = self.lock(trip_id).await?;

        let mut trip = tx.trip().await?;
        let mut request = tx
            .request(request_id)
            .await?
            .ok_or(BookingError::RequestNotFound)?;

        let role = TripRole::resolve(actor_id, &trip, &request).ok_or(BookingError::Forbidden)?;
        let next = attempt_transition(&request, RequestStatus::Accepted, role, trip.status)?;

        // The status write must never land without the matching reservation.
        let filled = ledger::reserve(&mut trip)?;

        let now = Utc::now();
        request.record_status(next, now);
        tx.save_request(&request).await?;

        let mut outbox = Outbox::new();
        outbox.push(
            EventKind::RequestAccepted,
            request.applicant_id,
            trip.id,
            Some(request.id),
            now,
        );

        // Once the trip is full, stale pending requests are noise, not
        // history worth preserving in an actionable state.
        if filled {
            for mut sibling in tx.pending_requests().await? {
                if sibling.id == request.id {
                    continue;
                }
                sibling.record_status(RequestStatus::Cancelled, now);
                tx.save_request(&sibling).await?;
                outbox.push(
                    EventKind::RequestCancelled,
                    sibling.applicant_id,
                    trip.id,
                    Some(sibling.id),
                    now,
                );
            }
        }

        tx.save_trip(&trip).await?;
        tx.commit().await?;
        Ok((request, outbox))
    }

    async fn try_advance(
        &self,
        request_id: Uuid,
        target: RequestStatus,
        actor_id: Uuid,
    ) -> Result<(DeliveryRequest, Outbox), BookingError> {
        let trip_id = self.trip_of(request_id).await?;
        let mut tx = self.lock(trip_id).await?;

        let trip = tx.trip().await?;
        let mut request = tx
            .request(request_id)
            .await?
            .ok_or(BookingError::RequestNotFound)?;

        let role = TripRole::resolve(actor_id, &trip, &request).ok_or(BookingError::Forbidden)?;
        let next = attempt_transition(&request, target, role, trip.status)?;

        let now = Utc::now();
        request.record_status(next, now);
        tx.save_request(&request).await?;
        tx.commit().await?;

        let mut outbox = Outbox::new();
        if let Some(kind) = advance_event(next) {
            outbox.push(kind, request.applicant_id, trip.id, Some(request.id), now);
        }
        if next == RequestStatus::Completed {
            // Distinct fire-and-forget side effect, not a state invariant.
            outbox.push(
                EventKind::RatingRequested,
                request.applicant_id,
                trip.id,
                Some(request.id),
                now,
            );
        }
        Ok((request, outbox))
    }

    async fn try_cancel(
        &self,
        request_id: Uuid,
        actor_id: Uuid,
    ) -> Result<(DeliveryRequest, Outbox), BookingError> {
        let trip_id = self.trip_of(request_id).await?;
        let mut tx = self.lock(trip_id).await?;

        let mut trip = tx.trip().await?;
        let mut request = tx
            .request(request_id)
            .await?
            .ok_or(BookingError::RequestNotFound)?;

        let role = TripRole::resolve(actor_id, &trip, &request).ok_or(BookingError::Forbidden)?;
        let next = attempt_transition(&request, RequestStatus::Cancelled, role, trip.status)?;

        let prior = request.status;
        let now = Utc::now();
        request.record_status(next, now);
        tx.save_request(&request).await?;

        if prior.holds_capacity() {
            ledger::release(&mut trip);
            tx.save_trip(&trip).await?;
        }
        tx.commit().await?;

        // Notify the counterparty, not the actor.
        let recipient = match role {
            TripRole::Applicant => trip.publisher_id,
            TripRole::Publisher => request.applicant_id,
        };
        let mut outbox = Outbox::new();
        outbox.push(
            EventKind::RequestCancelled,
            recipient,
            trip.id,
            Some(request.id),
            now,
        );
        Ok((request, outbox))
    }

    // ------------------------------------------------------------------
    // Plumbing
    // ------------------------------------------------------------------

    async fn trip_of(&self, request_id: Uuid) -> Result<Uuid, BookingError> {
        Ok(self
            .store
            .fetch_request(request_id)
            .await?
            .ok_or(BookingError::RequestNotFound)?
            .trip_id)
    }

    pub(crate) async fn lock(
        &self,
        trip_id: Uuid,
    ) -> Result<Box<dyn wayfare_core::store::TripTx>, BookingError> {
        self.store.lock_trip(trip_id).await.map_err(|e| match e {
            StoreError::NotFound => BookingError::TripNotFound,
            other => other.into(),
        })
    }

    /// One bounded-time attempt, retried on store conflicts. Aborting the
    /// attempt drops the unit of work, which discards all staged writes.
    pub(crate) async fn run<T, F, Fut>(&self, mut attempt: F) -> Result<T, BookingError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BookingError>>,
    {
        let mut tries = 0;
        loop {
            match tokio::time::timeout(self.tx_budget, attempt()).await {
                Err(_) => return Err(BookingError::Timeout),
                Ok(Err(err)) if err.is_retryable() && tries < self.max_retries => {
                    tries += 1;
                    tracing::debug!(tries, "retrying booking operation after store conflict");
                }
                Ok(result) => return result,
            }
        }
    }

    pub(crate) async fn dispatch(&self, outbox: Outbox) {
        if outbox.is_empty() {
            return;
        }
        let failures = outbox.drain(self.sink.as_ref()).await;
        if failures > 0 {
            self.notify_failures.fetch_add(failures, Ordering::Relaxed);
        }
    }
}

fn advance_event(status: RequestStatus) -> Option<EventKind> {
    match status {
        RequestStatus::Rejected => Some(EventKind::RequestRejected),
        RequestStatus::InTransit => Some(EventKind::RequestInTransit),
        RequestStatus::Delivered => Some(EventKind::RequestDelivered),
        RequestStatus::Completed => Some(EventKind::RequestCompleted),
        _ => None,
    }
}
