use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;
use wayfare_core::models::{DeliveryRequest, Trip};
use wayfare_core::store::{BookingStore, StoreError, TripTx};

#[derive(Debug, Default)]
struct Tables {
    trips: HashMap<Uuid, Trip>,
    requests: HashMap<Uuid, DeliveryRequest>,
}

/// In-memory booking store.
///
/// The per-trip lock is a plain async mutex held for the lifetime of the
/// unit of work, which gives the same mutual exclusion the Postgres store
/// gets from `SELECT ... FOR UPDATE`. Used by tests and local runs.
#[derive(Default)]
pub struct MemoryBookingStore {
    tables: Arc<Mutex<Tables>>,
    trip_locks: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl MemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn trip_lock(&self, trip_id: Uuid) -> Arc<AsyncMutex<()>> {
        let mut locks = self.trip_locks.lock().unwrap();
        locks.entry(trip_id).or_default().clone()
    }
}

#[async_trait]
impl BookingStore for MemoryBookingStore {
    async fn insert_trip(&self, trip: &Trip) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().unwrap();
        tables.trips.insert(trip.id, trip.clone());
        Ok(())
    }

    async fn fetch_trip(&self, trip_id: Uuid) -> Result<Option<Trip>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.trips.get(&trip_id).cloned())
    }

    async fn fetch_request(
        &self,
        request_id: Uuid,
    ) -> Result<Option<DeliveryRequest>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.requests.get(&request_id).cloned())
    }

    async fn lock_trip(&self, trip_id: Uuid) -> Result<Box<dyn TripTx>, StoreError> {
        let guard = self.trip_lock(trip_id).lock_owned().await;
        {
            let tables = self.tables.lock().unwrap();
            if !tables.trips.contains_key(&trip_id) {
                return Err(StoreError::NotFound);
            }
        }
        Ok(Box::new(MemoryTripTx {
            tables: Arc::clone(&self.tables),
            trip_id,
            staged_trip: None,
            staged_requests: HashMap::new(),
            _guard: guard,
        }))
    }
}

/// Unit of work over one locked trip. Writes are staged locally and only
/// applied on commit; dropping the unit discards them.
struct MemoryTripTx {
    tables: Arc<Mutex<Tables>>,
    trip_id: Uuid,
    staged_trip: Option<Trip>,
    staged_requests: HashMap<Uuid, DeliveryRequest>,
    _guard: OwnedMutexGuard<()>,
}

impl MemoryTripTx {
    /// Requests on this trip as this unit of work sees them: committed rows
    /// overlaid with staged writes and inserts.
    fn merged_requests(&self) -> Vec<DeliveryRequest> {
        let tables = self.tables.lock().unwrap();
        let mut merged: HashMap<Uuid, DeliveryRequest> = tables
            .requests
            .values()
            .filter(|r| r.trip_id == self.trip_id)
            .cloned()
            .map(|r| (r.id, r))
            .collect();
        for (id, request) in &self.staged_requests {
            merged.insert(*id, request.clone());
        }
        merged.into_values().collect()
    }
}

#[async_trait]
impl TripTx for MemoryTripTx {
    async fn trip(&mut self) -> Result<Trip, StoreError> {
        if let Some(trip) = &self.staged_trip {
            return Ok(trip.clone());
        }
        let tables = self.tables.lock().unwrap();
        tables
            .trips
            .get(&self.trip_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn request(
        &mut self,
        request_id: Uuid,
    ) -> Result<Option<DeliveryRequest>, StoreError> {
        if let Some(request) = self.staged_requests.get(&request_id) {
            return Ok(Some(request.clone()));
        }
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .requests
            .get(&request_id)
            .filter(|r| r.trip_id == self.trip_id)
            .cloned())
    }

    async fn pending_requests(&mut self) -> Result<Vec<DeliveryRequest>, StoreError> {
        Ok(self
            .merged_requests()
            .into_iter()
            .filter(|r| r.status == wayfare_core::models::RequestStatus::Pending)
            .collect())
    }

    async fn cancellable_requests(&mut self) -> Result<Vec<DeliveryRequest>, StoreError> {
        Ok(self
            .merged_requests()
            .into_iter()
            .filter(|r| r.status.is_trip_cancellable())
            .collect())
    }

    async fn has_active_request(&mut self, applicant_id: Uuid) -> Result<bool, StoreError> {
        Ok(self
            .merged_requests()
            .iter()
            .any(|r| r.applicant_id == applicant_id && r.status.is_active()))
    }

    async fn insert_request(&mut self, request: &DeliveryRequest) -> Result<(), StoreError> {
        self.staged_requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn save_request(&mut self, request: &DeliveryRequest) -> Result<(), StoreError> {
        self.staged_requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn save_trip(&mut self, trip: &Trip) -> Result<(), StoreError> {
        self.staged_trip = Some(trip.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(trip) = self.staged_trip {
            tables.trips.insert(trip.id, trip);
        }
        for (id, request) in self.staged_requests {
            tables.requests.insert(id, request);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_staged_writes_visible_before_commit() {
        let store = MemoryBookingStore::new();
        let trip = Trip::publish(Uuid::new_v4(), "Metz".into(), "Nancy".into(), 2, Utc::now());
        store.insert_trip(&trip).await.unwrap();

        let mut tx = store.lock_trip(trip.id).await.unwrap();
        let request = DeliveryRequest::new(trip.id, Uuid::new_v4());
        tx.insert_request(&request).await.unwrap();

        // Visible inside the unit of work...
        assert!(tx.request(request.id).await.unwrap().is_some());
        assert_eq!(tx.pending_requests().await.unwrap().len(), 1);

        // ...but not outside until commit.
        assert!(store.fetch_request(request.id).await.unwrap().is_none());

        tx.commit().await.unwrap();
        assert!(store.fetch_request(request.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_dropping_tx_discards_writes() {
        let store = MemoryBookingStore::new();
        let trip = Trip::publish(Uuid::new_v4(), "Metz".into(), "Nancy".into(), 2, Utc::now());
        store.insert_trip(&trip).await.unwrap();

        {
            let mut tx = store.lock_trip(trip.id).await.unwrap();
            let mut updated = tx.trip().await.unwrap();
            updated.booked_seats = 1;
            tx.save_trip(&updated).await.unwrap();
            // Dropped without commit.
        }

        let reread = store.fetch_trip(trip.id).await.unwrap().unwrap();
        assert_eq!(reread.booked_seats, 0);
    }

    #[tokio::test]
    async fn test_lock_trip_unknown_trip() {
        let store = MemoryBookingStore::new();
        assert!(matches!(
            store.lock_trip(Uuid::new_v4()).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_request_scoped_to_locked_trip() {
        let store = MemoryBookingStore::new();
        let trip_a = Trip::publish(Uuid::new_v4(), "A".into(), "B".into(), 1, Utc::now());
        let trip_b = Trip::publish(Uuid::new_v4(), "B".into(), "C".into(), 1, Utc::now());
        store.insert_trip(&trip_a).await.unwrap();
        store.insert_trip(&trip_b).await.unwrap();

        let request = DeliveryRequest::new(trip_b.id, Uuid::new_v4());
        let mut tx_b = store.lock_trip(trip_b.id).await.unwrap();
        tx_b.insert_request(&request).await.unwrap();
        tx_b.commit().await.unwrap();

        let mut tx_a = store.lock_trip(trip_a.id).await.unwrap();
        assert!(tx_a.request(request.id).await.unwrap().is_none());
        assert_eq!(tx_a.pending_requests().await.unwrap().len(), 0);
    }
}
