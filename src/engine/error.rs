use crate::model::{ReservationId, RestrictionId, RoomId};

#[derive(Debug)]
pub enum EngineError {
    RoomNotFound(RoomId),
    ReservationNotFound(ReservationId),
    RestrictionNotFound(RestrictionId),
    RoomExists(RoomId),
    /// The requested stay overlaps this restriction.
    Conflict(RestrictionId),
    /// The restriction governs a reservation and cannot be removed on its own.
    NotABlock(RestrictionId),
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::RoomNotFound(id) => write!(f, "room not found: {id}"),
            EngineError::ReservationNotFound(id) => write!(f, "reservation not found: {id}"),
            EngineError::RestrictionNotFound(id) => write!(f, "restriction not found: {id}"),
            EngineError::RoomExists(id) => write!(f, "room already exists: {id}"),
            EngineError::Conflict(id) => write!(f, "conflict with restriction: {id}"),
            EngineError::NotABlock(id) => {
                write!(f, "restriction {id} belongs to a reservation")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
