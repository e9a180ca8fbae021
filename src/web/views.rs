//! Response bodies, one type per page.

use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;

use crate::booking::{add_field, month_window, remove_field, BookingError, CalendarSnapshot, MonthSnapshot};
use crate::model::*;

use super::session::Notices;

/// Body of `/search-availability-json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AvailabilityJson {
    pub ok: bool,
    pub message: String,
    pub room_id: String,
    pub start_date: String,
    pub end_date: String,
}

/// The search form page; carries any notice left by a failed search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchView {
    #[serde(flatten)]
    pub notices: Notices,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChooseRoomView {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub rooms: Vec<Room>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReservationSummaryView {
    pub reservation: Reservation,
    pub room_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReservationRow {
    pub id: ReservationId,
    pub first_name: String,
    pub last_name: String,
    pub room_id: RoomId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub processed: bool,
}

impl From<&Reservation> for ReservationRow {
    fn from(r: &Reservation) -> Self {
        Self {
            id: r.id,
            first_name: r.guest.first_name.clone(),
            last_name: r.guest.last_name.clone(),
            room_id: r.room_id,
            start_date: r.stay.start,
            end_date: r.stay.end,
            processed: r.processed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReservationsView {
    pub reservations: Vec<ReservationRow>,
    #[serde(flatten)]
    pub notices: Notices,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminReservationView {
    pub src: String,
    pub reservation: Reservation,
    pub room_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<String>,
    #[serde(flatten)]
    pub notices: Notices,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthRef {
    pub year: i32,
    pub month: u32,
}

/// One cell of the admin calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarDay {
    pub day: u32,
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reservation_id: Option<ReservationId>,
    /// Checkbox name; absent on reserved days without a block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Pre-checked: the day holds a block.
    pub checked: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalendarRoom {
    pub id: RoomId,
    pub name: String,
    pub days: Vec<CalendarDay>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalendarView {
    pub year: i32,
    pub month: u32,
    /// Post back as `v` so a stale page is detected.
    pub version: u32,
    pub days_in_month: usize,
    pub previous: MonthRef,
    pub next: MonthRef,
    pub rooms: Vec<CalendarRoom>,
    #[serde(flatten)]
    pub notices: Notices,
}

impl CalendarView {
    pub fn new(snapshot: &CalendarSnapshot, notices: Notices) -> Result<Self, BookingError> {
        let window = month_window(snapshot.year, snapshot.month)?;
        let first = window.start;
        let month_ref = |d: NaiveDate| MonthRef {
            year: d.year(),
            month: d.month(),
        };
        let previous = first
            .checked_sub_months(Months::new(1))
            .map_or(month_ref(first), month_ref);
        let next = first
            .checked_add_months(Months::new(1))
            .map_or(month_ref(first), month_ref);
        let rooms: Vec<CalendarRoom> = snapshot
            .rooms
            .iter()
            .map(|m| calendar_room(m, first))
            .collect();
        Ok(Self {
            year: snapshot.year,
            month: snapshot.month,
            version: snapshot.version,
            days_in_month: window.days().count(),
            previous,
            next,
            rooms,
            notices,
        })
    }
}

fn calendar_room(month: &MonthSnapshot, first: NaiveDate) -> CalendarRoom {
    let room_id = month.room.id;
    let days = month
        .block_of_day
        .iter()
        .filter(|(day, _)| day.month() == first.month() && day.year() == first.year())
        .map(|(&date, block)| {
            let reservation_id = month.reservation_of_day.get(&date).copied().flatten();
            // Blocked days always carry their remove field.
            let field = match (reservation_id, block) {
                (_, Some(_)) => Some(remove_field(room_id, date)),
                (Some(_), None) => None,
                (None, None) => Some(add_field(room_id, date)),
            };
            CalendarDay {
                day: date.day(),
                date,
                reservation_id,
                field,
                checked: block.is_some(),
            }
        })
        .collect();
    CalendarRoom {
        id: room_id,
        name: month.room.name.clone(),
        days,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calendar_without_rooms_still_knows_its_month() {
        let view = CalendarView::new(&CalendarSnapshot::new(2024, 2, Vec::new()), Notices::default())
            .unwrap();
        assert_eq!(view.days_in_month, 29);
        assert!(view.rooms.is_empty());
        assert_eq!(view.previous, MonthRef { year: 2024, month: 1 });
        assert_eq!(view.next, MonthRef { year: 2024, month: 3 });

        let view = CalendarView::new(&CalendarSnapshot::new(2025, 12, Vec::new()), Notices::default())
            .unwrap();
        assert_eq!(view.days_in_month, 31);
        assert_eq!(view.next, MonthRef { year: 2026, month: 1 });
    }

    #[test]
    fn calendar_rejects_impossible_month() {
        let snapshot = CalendarSnapshot::new(2025, 13, Vec::new());
        assert!(CalendarView::new(&snapshot, Notices::default()).is_err());
    }
}
