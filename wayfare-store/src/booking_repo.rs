use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;
use wayfare_core::models::{DeliveryRequest, RequestStatus, Trip, TripStatus};
use wayfare_core::store::{BookingStore, StoreError, TripTx};

/// PostgreSQL booking store.
///
/// The per-trip lock is the trip row itself: `lock_trip` opens a transaction
/// and takes `SELECT ... FOR UPDATE` on the row, so concurrent accept/cancel
/// operations on the same trip serialize at the database.
pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct TripRow {
    id: Uuid,
    publisher_id: Uuid,
    origin: String,
    destination: String,
    capacity: i32,
    booked_seats: i32,
    status: String,
    departure_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TripRow {
    fn into_trip(self) -> Result<Trip, StoreError> {
        let status = TripStatus::parse(&self.status)
            .ok_or_else(|| StoreError::Backend(format!("unknown trip status {}", self.status)))?;
        Ok(Trip {
            id: self.id,
            publisher_id: self.publisher_id,
            origin: self.origin,
            destination: self.destination,
            capacity: self.capacity,
            booked_seats: self.booked_seats,
            status,
            departure_at: self.departure_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RequestRow {
    id: Uuid,
    trip_id: Uuid,
    applicant_id: Uuid,
    status: String,
    accepted_at: Option<DateTime<Utc>>,
    in_transit_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RequestRow {
    fn into_request(self) -> Result<DeliveryRequest, StoreError> {
        let status = RequestStatus::parse(&self.status).ok_or_else(|| {
            StoreError::Backend(format!("unknown request status {}", self.status))
        })?;
        Ok(DeliveryRequest {
            id: self.id,
            trip_id: self.trip_id,
            applicant_id: self.applicant_id,
            status,
            accepted_at: self.accepted_at,
            in_transit_at: self.in_transit_at,
            delivered_at: self.delivered_at,
            cancelled_at: self.cancelled_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Serialization failures and deadlocks surface as retryable conflicts.
fn map_sqlx(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if matches!(db.code().as_deref(), Some("40001") | Some("40P01")) {
            return StoreError::Conflict;
        }
    }
    StoreError::Backend(err.to_string())
}

const TRIP_COLUMNS: &str = "id, publisher_id, origin, destination, capacity, booked_seats, \
     status, departure_at, created_at, updated_at";
const REQUEST_COLUMNS: &str = "id, trip_id, applicant_id, status, accepted_at, in_transit_at, \
     delivered_at, cancelled_at, created_at, updated_at";

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn insert_trip(&self, trip: &Trip) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO trips (id, publisher_id, origin, destination, capacity, booked_seats, \
             status, departure_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(trip.id)
        .bind(trip.publisher_id)
        .bind(&trip.origin)
        .bind(&trip.destination)
        .bind(trip.capacity)
        .bind(trip.booked_seats)
        .bind(trip.status.as_str())
        .bind(trip.departure_at)
        .bind(trip.created_at)
        .bind(trip.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn fetch_trip(&self, trip_id: Uuid) -> Result<Option<Trip>, StoreError> {
        let row = sqlx::query_as::<_, TripRow>(&format!(
            "SELECT {TRIP_COLUMNS} FROM trips WHERE id = $1"
        ))
        .bind(trip_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        row.map(TripRow::into_trip).transpose()
    }

    async fn fetch_request(
        &self,
        request_id: Uuid,
    ) -> Result<Option<DeliveryRequest>, StoreError> {
        let row = sqlx::query_as::<_, RequestRow>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM delivery_requests WHERE id = $1"
        ))
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        row.map(RequestRow::into_request).transpose()
    }

    async fn lock_trip(&self, trip_id: Uuid) -> Result<Box<dyn TripTx>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        let locked = sqlx::query_as::<_, TripRow>(&format!(
            "SELECT {TRIP_COLUMNS} FROM trips WHERE id = $1 FOR UPDATE"
        ))
        .bind(trip_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        if locked.is_none() {
            return Err(StoreError::NotFound);
        }

        Ok(Box::new(PgTripTx { tx, trip_id }))
    }
}

struct PgTripTx {
    tx: Transaction<'static, Postgres>,
    trip_id: Uuid,
}

#[async_trait]
impl TripTx for PgTripTx {
    async fn trip(&mut self) -> Result<Trip, StoreError> {
        let row = sqlx::query_as::<_, TripRow>(&format!(
            "SELECT {TRIP_COLUMNS} FROM trips WHERE id = $1"
        ))
        .bind(self.trip_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        row.ok_or(StoreError::NotFound)?.into_trip()
    }

    async fn request(
        &mut self,
        request_id: Uuid,
    ) -> Result<Option<DeliveryRequest>, StoreError> {
        let row = sqlx::query_as::<_, RequestRow>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM delivery_requests WHERE id = $1 AND trip_id = $2"
        ))
        .bind(request_id)
        .bind(self.trip_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        row.map(RequestRow::into_request).transpose()
    }

    async fn pending_requests(&mut self) -> Result<Vec<DeliveryRequest>, StoreError> {
        let rows = sqlx::query_as::<_, RequestRow>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM delivery_requests \
             WHERE trip_id = $1 AND status = 'PENDING' ORDER BY created_at"
        ))
        .bind(self.trip_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        rows.into_iter().map(RequestRow::into_request).collect()
    }

    async fn cancellable_requests(&mut self) -> Result<Vec<DeliveryRequest>, StoreError> {
        let rows = sqlx::query_as::<_, RequestRow>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM delivery_requests \
             WHERE trip_id = $1 \
             AND status IN ('PENDING', 'ACCEPTED', 'IN_TRANSIT', 'DELIVERED') \
             ORDER BY created_at"
        ))
        .bind(self.trip_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        rows.into_iter().map(RequestRow::into_request).collect()
    }

    async fn has_active_request(&mut self, applicant_id: Uuid) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS( \
               SELECT 1 FROM delivery_requests \
               WHERE trip_id = $1 AND applicant_id = $2 \
               AND status NOT IN ('CANCELLED', 'REJECTED'))",
        )
        .bind(self.trip_id)
        .bind(applicant_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        Ok(exists)
    }

    async fn insert_request(&mut self, request: &DeliveryRequest) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO delivery_requests (id, trip_id, applicant_id, status, accepted_at, \
             in_transit_at, delivered_at, cancelled_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(request.id)
        .bind(request.trip_id)
        .bind(request.applicant_id)
        .bind(request.status.as_str())
        .bind(request.accepted_at)
        .bind(request.in_transit_at)
        .bind(request.delivered_at)
        .bind(request.cancelled_at)
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn save_request(&mut self, request: &DeliveryRequest) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE delivery_requests SET status = $1, accepted_at = $2, in_transit_at = $3, \
             delivered_at = $4, cancelled_at = $5, updated_at = $6 WHERE id = $7",
        )
        .bind(request.status.as_str())
        .bind(request.accepted_at)
        .bind(request.in_transit_at)
        .bind(request.delivered_at)
        .bind(request.cancelled_at)
        .bind(request.updated_at)
        .bind(request.id)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn save_trip(&mut self, trip: &Trip) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE trips SET booked_seats = $1, status = $2, updated_at = $3 WHERE id = $4",
        )
        .bind(trip.booked_seats)
        .bind(trip.status.as_str())
        .bind(trip.updated_at)
        .bind(trip.id)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(map_sqlx)
    }
}
