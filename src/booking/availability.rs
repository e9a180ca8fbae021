use std::collections::HashSet;

use chrono::NaiveDate;
use tracing::warn;

use crate::model::*;
use crate::observability::{AVAILABILITY_CHECKS_TOTAL, AVAILABILITY_FAILURES_TOTAL};
use crate::store::RestrictionStore;

use super::BookingError;

/// Whether `room_id` is free for a stay from `start` to `end`.
///
/// A store failure reads as "not available". The error is logged and counted
/// but never returned.
pub async fn is_room_available(
    store: &dyn RestrictionStore,
    room_id: RoomId,
    start: NaiveDate,
    end: NaiveDate,
) -> bool {
    // The inclusive window is a superset of everything the strict test can hit.
    let window = DateRange::new(start, end);
    match store.restrictions_for_room(room_id, window).await {
        Ok(restrictions) => {
            let free = !restrictions
                .iter()
                .any(|r| r.range.conflicts_with(start, end));
            let result = if free { "available" } else { "unavailable" };
            metrics::counter!(AVAILABILITY_CHECKS_TOTAL, "result" => result).increment(1);
            free
        }
        Err(e) => {
            warn!(room_id, %start, %end, "availability lookup failed, reporting unavailable: {e}");
            metrics::counter!(AVAILABILITY_FAILURES_TOTAL).increment(1);
            false
        }
    }
}

/// Rooms with no restriction overlapping the stay. An empty result is not an error.
pub async fn search_available_rooms(
    store: &dyn RestrictionStore,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<Room>, BookingError> {
    if end <= start {
        return Err(BookingError::Validation(
            "departure must be after arrival".into(),
        ));
    }
    let busy: HashSet<RoomId> = store
        .restrictions_in_range(DateRange::new(start, end))
        .await?
        .into_iter()
        .filter(|r| r.range.conflicts_with(start, end))
        .map(|r| r.room_id)
        .collect();

    let rooms = store
        .all_rooms()
        .await?
        .into_iter()
        .filter(|room| !busy.contains(&room.id))
        .collect();
    Ok(rooms)
}
