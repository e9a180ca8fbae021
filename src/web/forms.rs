//! Posted form bodies and their validation.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::{Guest, RoomId};

/// Messages keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    /// First message for `field`.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(|m| m.first()).map(String::as_str)
    }

    pub fn merge(&mut self, other: FormErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GuestForm {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

impl GuestForm {
    /// All four fields required, first name at least three characters, email
    /// well formed.
    pub fn validate(&self) -> Result<Guest, FormErrors> {
        let mut errors = FormErrors::default();
        let fields = [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("email", &self.email),
            ("phone", &self.phone),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                errors.add(name, "This field cannot be blank");
            }
        }
        if self.first_name.trim().chars().count() < 3 {
            errors.add("first_name", "This field must be at least 3 characters long");
        }
        if !is_email(self.email.trim()) {
            errors.add("email", "Invalid email address");
        }

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(Guest {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone.trim().to_string(),
        })
    }
}

fn is_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !s.chars().any(char::is_whitespace)
        && domain.split('.').count() >= 2
        && domain.split('.').all(|label| !label.is_empty())
}

/// `YYYY-MM-DD`
pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| format!("can't parse {field}"))
}

pub fn parse_room_id(value: &str) -> Result<RoomId, String> {
    value
        .trim()
        .parse()
        .map_err(|_| "can't parse room id".to_string())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AvailabilityJsonForm {
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default)]
    pub room_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchForm {
    #[serde(default)]
    pub start: String,
    #[serde(default)]
    pub end: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReservationForm {
    #[serde(flatten)]
    pub guest: GuestForm,
    #[serde(default)]
    pub room_id: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
}

/// Admin edit of a reservation. `year`/`month` are set when the edit was
/// opened from the calendar.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminReservationForm {
    #[serde(flatten)]
    pub guest: GuestForm,
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub month: String,
}

/// Where to send the admin after acting on a reservation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReturnTo {
    #[serde(default)]
    pub y: String,
    #[serde(default)]
    pub m: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CalendarQuery {
    pub y: Option<i32>,
    pub m: Option<u32>,
}
