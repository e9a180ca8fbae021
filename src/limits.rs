//! Hard caps enforced by the engine and the form decoders.

use std::time::Duration;

pub const MAX_ROOMS: usize = 1_000;
pub const MAX_RESTRICTIONS_PER_ROOM: usize = 50_000;
pub const MAX_ROOM_NAME_LEN: usize = 256;
pub const MAX_GUEST_FIELD_LEN: usize = 256;

/// Longest stay a single booking may cover, in nights.
pub const MAX_STAY_DAYS: i64 = 365;

pub const MAX_FORM_FIELDS: usize = 10_000;

pub const MAX_SESSIONS: usize = 10_000;
/// Sessions idle this long are the first to go when the table is full.
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);
pub const MAX_SESSION_ID_LEN: usize = 128;
