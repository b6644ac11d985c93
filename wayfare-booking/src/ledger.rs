use tracing::warn;
use wayfare_core::models::Trip;

use crate::error::BookingError;

/// Commit one unit of the trip's capacity.
///
/// Must run under the per-trip lock, in the same unit of work that writes the
/// matching ACCEPTED status. Returns `true` when this reservation filled the
/// trip, which obliges the caller to cascade-cancel surplus PENDING requests.
pub fn reserve(trip: &mut Trip) -> Result<bool, BookingError> {
    if trip.booked_seats >= trip.capacity {
        return Err(BookingError::NoAvailableCapacity);
    }
    trip.booked_seats += 1;
    trip.updated_at = chrono::Utc::now();
    Ok(trip.booked_seats == trip.capacity)
}

/// Return one unit of capacity after a cancellation.
///
/// Called exactly once per request leaving an ACCEPTED-or-later non-terminal
/// state, never for PENDING cancellations. Clamped at zero: an underflow
/// means the bookkeeping already disagreed somewhere, and making the count
/// negative would only corrupt it further.
pub fn release(trip: &mut Trip) {
    if trip.booked_seats == 0 {
        warn!(trip_id = %trip.id, "capacity release on empty trip, clamping at zero");
        return;
    }
    trip.booked_seats -= 1;
    trip.updated_at = chrono::Utc::now();
}
