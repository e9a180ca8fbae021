//! Calendar checkbox field names.
//!
//! A day is written `YYYY-MM-D`: four-digit year, two-digit month, and the
//! day of month without padding. Posted names must match this exactly or a
//! single-digit day will not line up with its checkbox.

use chrono::{Datelike, NaiveDate};

use crate::model::RoomId;

pub const REMOVE_PREFIX: &str = "remove_block_";
pub const ADD_PREFIX: &str = "add_block_";

pub fn encode_day(day: NaiveDate) -> String {
    format!("{:04}-{:02}-{}", day.year(), day.month(), day.day())
}

pub fn decode_day(token: &str) -> Option<NaiveDate> {
    let mut parts = token.split('-');
    let (year, month, day) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    if year.len() != 4 || month.len() != 2 || day.is_empty() || day.len() > 2 {
        return None;
    }
    if ![year, month, day]
        .iter()
        .all(|p| p.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

/// Present on the form when an existing block should stay.
pub fn remove_field(room_id: RoomId, day: NaiveDate) -> String {
    format!("{REMOVE_PREFIX}{room_id}_{}", encode_day(day))
}

pub fn add_field(room_id: RoomId, day: NaiveDate) -> String {
    format!("{ADD_PREFIX}{room_id}_{}", encode_day(day))
}

/// The room and day named by an `add_block_{room}_{day}` field.
pub fn parse_add_field(name: &str) -> Option<(RoomId, NaiveDate)> {
    let rest = name.strip_prefix(ADD_PREFIX)?;
    let (room, token) = rest.split_once('_')?;
    if room.is_empty() || !room.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((room.parse().ok()?, decode_day(token)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::date;

    #[test]
    fn day_is_not_padded() {
        assert_eq!(encode_day(date(2025, 6, 5)), "2025-06-5");
        assert_eq!(encode_day(date(2025, 12, 25)), "2025-12-25");
    }

    #[test]
    fn decode_accepts_both_day_widths() {
        assert_eq!(decode_day("2025-06-5"), Some(date(2025, 6, 5)));
        assert_eq!(decode_day("2025-06-05"), Some(date(2025, 6, 5)));
        assert_eq!(decode_day("2025-06-30"), Some(date(2025, 6, 30)));
    }

    #[test]
    fn decode_rejects_bad_tokens() {
        for bad in [
            "2025-6-5",
            "25-06-5",
            "2025-06-",
            "2025-06-123",
            "2025-06-31",
            "2025-06-5-1",
            "2025-06-+5",
            "2025/06/05",
            "",
        ] {
            assert_eq!(decode_day(bad), None, "{bad}");
        }
    }

    #[test]
    fn field_names() {
        let d = date(2025, 6, 5);
        assert_eq!(remove_field(3, d), "remove_block_3_2025-06-5");
        assert_eq!(add_field(3, d), "add_block_3_2025-06-5");
        assert_eq!(parse_add_field("add_block_3_2025-06-5"), Some((3, d)));
        assert_eq!(parse_add_field(&add_field(12, date(2025, 1, 31))), Some((12, date(2025, 1, 31))));
    }

    #[test]
    fn parse_add_field_rejects_malformed() {
        for bad in [
            "add_block_x_2025-06-5",
            "add_block__2025-06-5",
            "add_block_3",
            "add_block_3_june",
            "add_block3_2025-06-5",
            "remove_block_3_2025-06-5",
        ] {
            assert_eq!(parse_add_field(bad), None, "{bad}");
        }
    }
}
