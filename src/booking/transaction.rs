use chrono::NaiveDate;
use tracing::info;

use crate::limits::MAX_STAY_DAYS;
use crate::model::*;
use crate::observability::BOOKINGS_TOTAL;
use crate::store::{RestrictionStore, StoreError};

use super::BookingError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub guest: Guest,
    pub room_id: RoomId,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Book a room. The store writes the reservation and its restriction as one
/// record and rejects the stay if anything already overlaps it.
pub async fn create_booking(
    store: &dyn RestrictionStore,
    request: BookingRequest,
) -> Result<ReservationId, BookingError> {
    let stay = DateRange::new(request.start, request.end);
    if stay.end <= stay.start {
        return Err(BookingError::Validation(
            "departure must be after arrival".into(),
        ));
    }
    if stay.nights() > MAX_STAY_DAYS {
        return Err(BookingError::Validation(format!(
            "stays are limited to {MAX_STAY_DAYS} nights"
        )));
    }

    let booking = NewBooking {
        guest: request.guest,
        room_id: request.room_id,
        stay,
    };
    match store.create_booking(booking).await {
        Ok(reservation) => {
            metrics::counter!(BOOKINGS_TOTAL, "status" => "created").increment(1);
            info!(
                reservation = %reservation.id,
                room_id = reservation.room_id,
                start = %stay.start,
                end = %stay.end,
                "booking created"
            );
            Ok(reservation.id)
        }
        Err(e) => {
            let status = match e {
                StoreError::Conflict(_) => "conflict",
                _ => "error",
            };
            metrics::counter!(BOOKINGS_TOTAL, "status" => status).increment(1);
            Err(e.into())
        }
    }
}
