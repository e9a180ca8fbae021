use std::collections::BTreeMap;

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::*;
use crate::store::RestrictionStore;

use super::BookingError;

/// One room's days for one month: which reservation occupies each day and
/// which manual block sits on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthSnapshot {
    pub room: Room,
    /// Every day of the month, plus any day of a reservation that runs past it.
    pub reservation_of_day: BTreeMap<NaiveDate, Option<ReservationId>>,
    /// Every day of the month.
    pub block_of_day: BTreeMap<NaiveDate, Option<RestrictionId>>,
}

impl MonthSnapshot {
    /// Days holding a block, with the block's id.
    pub fn blocks(&self) -> impl Iterator<Item = (NaiveDate, RestrictionId)> + '_ {
        self.block_of_day
            .iter()
            .filter_map(|(day, id)| id.map(|id| (*day, id)))
    }
}

/// The baseline an admin edits: every room for one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarSnapshot {
    pub year: i32,
    pub month: u32,
    pub rooms: Vec<MonthSnapshot>,
    /// Content hash; echoed back by the posted form.
    pub version: u32,
}

impl CalendarSnapshot {
    pub fn new(year: i32, month: u32, rooms: Vec<MonthSnapshot>) -> Self {
        let mut snapshot = Self {
            year,
            month,
            rooms,
            version: 0,
        };
        snapshot.version = snapshot.content_hash();
        snapshot
    }

    pub fn room(&self, id: RoomId) -> Option<&MonthSnapshot> {
        self.rooms.iter().find(|r| r.room.id == id)
    }

    fn content_hash(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&self.year.to_le_bytes());
        hasher.update(&self.month.to_le_bytes());
        for room in &self.rooms {
            hasher.update(&room.room.id.to_le_bytes());
            for (day, id) in &room.reservation_of_day {
                hasher.update(&day.num_days_from_ce().to_le_bytes());
                hasher.update(&id.map_or(0, u128::from).to_le_bytes());
            }
            hasher.update(&[0xff]);
            for (day, id) in &room.block_of_day {
                hasher.update(&day.num_days_from_ce().to_le_bytes());
                hasher.update(&id.map_or(0, u128::from).to_le_bytes());
            }
        }
        hasher.finalize()
    }
}

/// First and last day of a calendar month.
pub fn month_window(year: i32, month: u32) -> Result<DateRange, BookingError> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| BookingError::Validation(format!("invalid month {year}-{month}")))?;
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .ok_or_else(|| BookingError::Validation(format!("invalid month {year}-{month}")))?;
    Ok(DateRange::new(first, last))
}

/// Map the restrictions of `room` onto the days of one month.
///
/// A reservation marks every day of its range, checkout day included, even
/// outside the month. Where two reservations share a day the one the store
/// returned later wins.
pub async fn build_month_snapshot(
    store: &dyn RestrictionStore,
    room: &Room,
    year: i32,
    month: u32,
) -> Result<MonthSnapshot, BookingError> {
    let window = month_window(year, month)?;
    let mut reservation_of_day: BTreeMap<_, _> = window.days().map(|d| (d, None)).collect();
    let mut block_of_day: BTreeMap<_, _> = window.days().map(|d| (d, None)).collect();

    for restriction in store.restrictions_for_room(room.id, window).await? {
        match restriction.kind {
            RestrictionKind::Reservation { reservation_id } => {
                for day in restriction.range.days() {
                    reservation_of_day.insert(day, Some(reservation_id));
                }
            }
            RestrictionKind::Block => {
                block_of_day.insert(restriction.range.start, Some(restriction.id));
            }
        }
    }

    Ok(MonthSnapshot {
        room: room.clone(),
        reservation_of_day,
        block_of_day,
    })
}

/// Snapshot every room for one month, rooms fetched concurrently.
pub async fn build_calendar(
    store: &dyn RestrictionStore,
    year: i32,
    month: u32,
) -> Result<CalendarSnapshot, BookingError> {
    month_window(year, month)?;
    let rooms = store.all_rooms().await?;
    let snapshots = futures::future::try_join_all(
        rooms
            .iter()
            .map(|room| build_month_snapshot(store, room, year, month)),
    )
    .await?;
    let calendar = CalendarSnapshot::new(year, month, snapshots);
    debug!(year, month, rooms = calendar.rooms.len(), version = calendar.version, "built calendar");
    Ok(calendar)
}
