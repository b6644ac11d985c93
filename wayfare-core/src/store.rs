use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{DeliveryRequest, Trip};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("row not found")]
    NotFound,

    #[error("write conflict detected by the store")]
    Conflict,

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Durable store for trips and delivery requests.
///
/// Every capacity-mutating operation goes through [`BookingStore::lock_trip`]:
/// the returned unit of work holds mutual exclusion over one trip (row lock or
/// per-trip mutex) until it is committed or dropped. Dropping the unit without
/// committing discards all staged writes.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn insert_trip(&self, trip: &Trip) -> Result<(), StoreError>;

    async fn fetch_trip(&self, trip_id: Uuid) -> Result<Option<Trip>, StoreError>;

    async fn fetch_request(&self, request_id: Uuid)
        -> Result<Option<DeliveryRequest>, StoreError>;

    /// Open a unit of work holding the exclusive per-trip lock.
    /// Fails with [`StoreError::NotFound`] if the trip does not exist.
    async fn lock_trip(&self, trip_id: Uuid) -> Result<Box<dyn TripTx>, StoreError>;
}

/// Unit of work scoped to one locked trip. Reads observe writes staged
/// earlier in the same unit.
#[async_trait]
pub trait TripTx: Send {
    async fn trip(&mut self) -> Result<Trip, StoreError>;

    async fn request(&mut self, request_id: Uuid)
        -> Result<Option<DeliveryRequest>, StoreError>;

    /// All PENDING requests on the locked trip.
    async fn pending_requests(&mut self) -> Result<Vec<DeliveryRequest>, StoreError>;

    /// All requests on the locked trip in a status swept by trip cancellation.
    async fn cancellable_requests(&mut self) -> Result<Vec<DeliveryRequest>, StoreError>;

    /// Whether the applicant already has a non-cancelled, non-rejected
    /// request against the locked trip.
    async fn has_active_request(&mut self, applicant_id: Uuid) -> Result<bool, StoreError>;

    async fn insert_request(&mut self, request: &DeliveryRequest) -> Result<(), StoreError>;

    async fn save_request(&mut self, request: &DeliveryRequest) -> Result<(), StoreError>;

    async fn save_trip(&mut self, trip: &Trip) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
