use wayfare_core::models::{RequestStatus, TripStatus};
use wayfare_core::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("trip not found")]
    TripNotFound,

    #[error("request not found")]
    RequestNotFound,

    #[error("actor is not authorized for this transition")]
    Forbidden,

    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: RequestStatus,
        to: RequestStatus,
    },

    #[error("invalid trip transition from {from:?} to {to:?}")]
    InvalidTripTransition { from: TripStatus, to: TripStatus },

    #[error("trip is not open for booking")]
    TripNotBookable,

    #[error("no available capacity on this trip")]
    NoAvailableCapacity,

    #[error("applicant already has an active request on this trip")]
    DuplicateActiveRequest,

    #[error("a completed request cannot be cancelled")]
    CannotCancelCompleted,

    #[error("publishers cannot file a request against their own trip")]
    SelfRequest,

    #[error("trip capacity must be a positive number of units")]
    InvalidCapacity,

    #[error("booking operation exceeded its time budget")]
    Timeout,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BookingError {
    /// Conflicts reported by the store are retried a bounded number of
    /// times before being surfaced.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BookingError::Store(StoreError::Conflict))
    }
}
