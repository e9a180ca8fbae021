use crate::model::*;

use super::EngineError;

pub(crate) fn validate_stay(stay: &DateRange) -> Result<(), EngineError> {
    use crate::limits::*;
    if stay.end <= stay.start {
        return Err(EngineError::LimitExceeded("stay must end after it starts"));
    }
    if stay.nights() > MAX_STAY_DAYS {
        return Err(EngineError::LimitExceeded("stay too long"));
    }
    Ok(())
}

/// Exclusion check run under the room's write lock: any restriction, of
/// either kind, that fails the strict overlap test rejects the stay.
pub(crate) fn check_no_conflict(rs: &RoomState, stay: &DateRange) -> Result<(), EngineError> {
    match rs.conflicting(stay.start, stay.end).next() {
        Some(existing) => Err(EngineError::Conflict(existing.id)),
        None => Ok(()),
    }
}

pub(crate) fn check_capacity(rs: &RoomState) -> Result<(), EngineError> {
    if rs.restrictions.len() >= crate::limits::MAX_RESTRICTIONS_PER_ROOM {
        return Err(EngineError::LimitExceeded("too many restrictions on room"));
    }
    Ok(())
}

pub(crate) fn validate_guest(guest: &Guest) -> Result<(), EngineError> {
    let max = crate::limits::MAX_GUEST_FIELD_LEN;
    let fields = [&guest.first_name, &guest.last_name, &guest.email, &guest.phone];
    if fields.iter().any(|f| f.len() > max) {
        return Err(EngineError::LimitExceeded("guest field too long"));
    }
    Ok(())
}
