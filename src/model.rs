use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Rooms are numbered; the id appears verbatim in admin form field names.
pub type RoomId = u32;
pub type ReservationId = Ulid;
pub type RestrictionId = Ulid;

/// A pair of calendar days, both stored.
///
/// Reservation-backed restrictions keep the checkout day in `end`. Manual
/// blocks always have `start == end`. Conflict uses the strict test, so a
/// stay may begin on the day another one ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// A single calendar day.
    pub fn day(day: NaiveDate) -> Self {
        Self { start: day, end: day }
    }

    /// `start < self.end && end > self.start`
    pub fn conflicts_with(&self, start: NaiveDate, end: NaiveDate) -> bool {
        start < self.end && end > self.start
    }

    /// Inclusive intersection with `window`.
    pub fn intersects(&self, window: &DateRange) -> bool {
        window.start <= self.end && window.end >= self.start
    }

    pub fn nights(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Every day from `start` through `end`, inclusive.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub guest: Guest,
    pub room_id: RoomId,
    pub stay: DateRange,
    /// Admin workflow marker.
    pub processed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What a restriction represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestrictionKind {
    /// Governs the stay of a reservation; its range equals the stay.
    Reservation { reservation_id: ReservationId },
    /// Admin-placed single-day unavailability marker.
    Block,
}

/// A date-range row that makes its room unavailable, whatever the kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restriction {
    pub id: RestrictionId,
    pub room_id: RoomId,
    pub range: DateRange,
    pub kind: RestrictionKind,
}

impl Restriction {
    pub fn is_block(&self) -> bool {
        matches!(self.kind, RestrictionKind::Block)
    }

    pub fn reservation_id(&self) -> Option<ReservationId> {
        match self.kind {
            RestrictionKind::Reservation { reservation_id } => Some(reservation_id),
            RestrictionKind::Block => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RoomState {
    pub room: Room,
    /// All restrictions of the room, sorted by `range.start`.
    pub restrictions: Vec<Restriction>,
}

impl RoomState {
    pub fn new(room: Room) -> Self {
        Self {
            room,
            restrictions: Vec::new(),
        }
    }

    /// Insert restriction maintaining sort order by range.start.
    pub fn insert_restriction(&mut self, restriction: Restriction) {
        let pos = self
            .restrictions
            .partition_point(|r| r.range.start <= restriction.range.start);
        self.restrictions.insert(pos, restriction);
    }

    /// Remove restriction by id.
    pub fn remove_restriction(&mut self, id: RestrictionId) -> Option<Restriction> {
        let pos = self.restrictions.iter().position(|r| r.id == id)?;
        Some(self.restrictions.remove(pos))
    }

    pub fn find(&self, id: RestrictionId) -> Option<&Restriction> {
        self.restrictions.iter().find(|r| r.id == id)
    }

    /// Restrictions whose inclusive range intersects the inclusive window.
    pub fn overlapping(&self, window: &DateRange) -> impl Iterator<Item = &Restriction> {
        // Everything at index >= right_bound starts after window.end.
        let right_bound = self
            .restrictions
            .partition_point(|r| r.range.start <= window.end);
        let window = *window;
        self.restrictions[..right_bound]
            .iter()
            .filter(move |r| r.range.end >= window.start)
    }

    /// Restrictions that make `[start, end)` unavailable under the strict test.
    pub fn conflicting(&self, start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = &Restriction> {
        let right_bound = self.restrictions.partition_point(|r| r.range.start < end);
        self.restrictions[..right_bound]
            .iter()
            .filter(move |r| r.range.conflicts_with(start, end))
    }
}

/// The event types. This is the WAL record format.
///
/// A booking is one record carrying both the reservation and its restriction,
/// so replay can never produce a reservation without its restriction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    RoomCreated {
        id: RoomId,
        name: String,
    },
    BookingCreated {
        reservation: Reservation,
        restriction: Restriction,
    },
    BlockAdded {
        restriction: Restriction,
    },
    RestrictionRemoved {
        id: RestrictionId,
        room_id: RoomId,
    },
    GuestUpdated {
        id: ReservationId,
        room_id: RoomId,
        guest: Guest,
        updated_at: DateTime<Utc>,
    },
    ProcessedSet {
        id: ReservationId,
        room_id: RoomId,
        processed: bool,
        updated_at: DateTime<Utc>,
    },
    /// Removes the reservation and its governing restriction.
    ReservationDeleted {
        id: ReservationId,
        room_id: RoomId,
    },
}

// ── Query inputs ─────────────────────────────────────────────────

/// Everything needed to write a booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
    pub guest: Guest,
    pub room_id: RoomId,
    pub stay: DateRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationFilter {
    All,
    Unprocessed,
}

#[cfg(test)]
pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}
