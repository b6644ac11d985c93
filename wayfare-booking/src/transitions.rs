use wayfare_core::identity::TripRole;
use wayfare_core::models::{DeliveryRequest, RequestStatus, TripStatus};

use crate::error::BookingError;

/// Who may drive a given edge of the request lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authority {
    /// Only the trip's publisher.
    PublisherOnly,
    /// Applicant or publisher (cancellation is bilateral).
    Bilateral,
}

/// The legal transition table. Directed, no back-edges except into CANCELLED.
/// Returns `None` for pairs that are not an edge at all.
pub fn edge(current: RequestStatus, target: RequestStatus) -> Option<Authority> {
    use RequestStatus::*;
    match (current, target) {
        (Pending, Accepted) => Some(Authority::PublisherOnly),
        (Pending, Rejected) => Some(Authority::PublisherOnly),
        (Pending, Cancelled) => Some(Authority::Bilateral),
        (Accepted, InTransit) => Some(Authority::PublisherOnly),
        (Accepted, Cancelled) => Some(Authority::Bilateral),
        (InTransit, Delivered) => Some(Authority::PublisherOnly),
        (InTransit, Cancelled) => Some(Authority::Bilateral),
        (Delivered, Completed) => Some(Authority::PublisherOnly),
        (Delivered, Cancelled) => Some(Authority::Bilateral),
        _ => None,
    }
}

/// Validate one status transition against the persisted request state.
///
/// The caller must have re-read `request` inside the transaction that will
/// apply the write; this function never touches capacity, that is the
/// coordinator's job, co-transactional with the status write.
pub fn attempt_transition(
    request: &DeliveryRequest,
    target: RequestStatus,
    actor: TripRole,
    trip_status: TripStatus,
) -> Result<RequestStatus, BookingError> {
    if request.status == RequestStatus::Completed && target == RequestStatus::Cancelled {
        return Err(BookingError::CannotCancelCompleted);
    }

    let authority = edge(request.status, target).ok_or(BookingError::InvalidTransition {
        from: request.status,
        to: target,
    })?;

    match authority {
        Authority::PublisherOnly if actor != TripRole::Publisher => {
            return Err(BookingError::Forbidden);
        }
        _ => {}
    }

    // A request may only newly consume capacity on a trip that is still open.
    if target == RequestStatus::Accepted && trip_status != TripStatus::Published {
        return Err(BookingError::TripNotBookable);
    }

    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;
    use wayfare_core::models::Trip;

    fn request_in(status: RequestStatus) -> DeliveryRequest {
        let mut request = DeliveryRequest::new(Uuid::new_v4(), Uuid::new_v4());
        request.status = status;
        request
    }

    #[test]
    fn test_happy_path_edges_are_publisher_only() {
        use RequestStatus::*;
        for (from, to) in [
            (Pending, Accepted),
            (Pending, Rejected),
            (Accepted, InTransit),
            (InTransit, Delivered),
            (Delivered, Completed),
        ] {
            assert_eq!(edge(from, to), Some(Authority::PublisherOnly));

            let request = request_in(from);
            assert!(
                attempt_transition(&request, to, TripRole::Publisher, TripStatus::Published)
                    .is_ok()
            );
            assert!(matches!(
                attempt_transition(&request, to, TripRole::Applicant, TripStatus::Published),
                Err(BookingError::Forbidden)
            ));
        }
    }

    #[test]
    fn test_cancellation_is_bilateral() {
        use RequestStatus::*;
        for from in [Pending, Accepted, InTransit, Delivered] {
            let request = request_in(from);
            for actor in [TripRole::Publisher, TripRole::Applicant] {
                assert!(
                    attempt_transition(&request, Cancelled, actor, TripStatus::Published).is_ok()
                );
            }
        }
    }

    #[test]
    fn test_no_skips_and_no_back_edges() {
        use RequestStatus::*;
        let illegal = [
            (Pending, InTransit),
            (Pending, Delivered),
            (Pending, Completed),
            (Accepted, Delivered),
            (Accepted, Completed),
            (InTransit, Completed),
            (InTransit, Accepted),
            (Delivered, InTransit),
            (Accepted, Accepted),
            (Cancelled, Accepted),
            (Rejected, Accepted),
            (Completed, Delivered),
        ];
        for (from, to) in illegal {
            let request = request_in(from);
            assert!(matches!(
                attempt_transition(&request, to, TripRole::Publisher, TripStatus::Published),
                Err(BookingError::InvalidTransition { .. })
            ));
        }
    }

    #[test]
    fn test_completed_is_terminal_for_cancellation() {
        let request = request_in(RequestStatus::Completed);
        assert!(matches!(
            attempt_transition(
                &request,
                RequestStatus::Cancelled,
                TripRole::Applicant,
                TripStatus::Published
            ),
            Err(BookingError::CannotCancelCompleted)
        ));
    }

    #[test]
    fn test_accept_requires_published_trip() {
        let request = request_in(RequestStatus::Pending);
        for trip_status in [TripStatus::Completed, TripStatus::Cancelled] {
            assert!(matches!(
                attempt_transition(
                    &request,
                    RequestStatus::Accepted,
                    TripRole::Publisher,
                    trip_status
                ),
                Err(BookingError::TripNotBookable)
            ));
        }
        // Cancellation stays legal on a closed trip.
        let accepted = request_in(RequestStatus::Accepted);
        assert!(attempt_transition(
            &accepted,
            RequestStatus::Cancelled,
            TripRole::Applicant,
            TripStatus::Cancelled
        )
        .is_ok());
    }

    #[test]
    fn test_role_resolution_is_per_trip() {
        let publisher = Uuid::new_v4();
        let trip = Trip::publish(publisher, "Nantes".into(), "Rennes".into(), 3, Utc::now());
        let request = DeliveryRequest::new(trip.id, Uuid::new_v4());
        assert_eq!(
            TripRole::resolve(publisher, &trip, &request),
            Some(TripRole::Publisher)
        );
    }
}
