//! Availability, booking, and calendar block reconciliation.
//!
//! Everything here talks to a [`RestrictionStore`](crate::store::RestrictionStore)
//! and never to the engine directly.

mod availability;
mod reconcile;
mod snapshot;
mod token;
mod transaction;
#[cfg(test)]
mod tests;

pub use availability::{is_room_available, search_available_rooms};
pub use reconcile::{reconcile, CalendarForm, ReconcileOptions, Reconciliation};
pub use snapshot::{build_calendar, build_month_snapshot, month_window, CalendarSnapshot, MonthSnapshot};
pub use token::{add_field, decode_day, encode_day, parse_add_field, remove_field, ADD_PREFIX, REMOVE_PREFIX};
pub use transaction::{create_booking, BookingRequest};

use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// Bad input; nothing was written.
    Validation(String),
    /// The posted calendar form was built from a different baseline.
    StaleSnapshot,
    Store(StoreError),
}

impl std::fmt::Display for BookingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingError::Validation(msg) => write!(f, "{msg}"),
            BookingError::StaleSnapshot => write!(f, "calendar changed since it was displayed"),
            BookingError::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for BookingError {}

impl From<StoreError> for BookingError {
    fn from(e: StoreError) -> Self {
        BookingError::Store(e)
    }
}
