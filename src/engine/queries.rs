use crate::model::*;

use super::{Engine, EngineError};

impl Engine {
    /// All rooms, ordered by name.
    pub async fn list_rooms(&self) -> Vec<Room> {
        let shared: Vec<_> = self.rooms.iter().map(|e| e.value().clone()).collect();
        let mut rooms = Vec::with_capacity(shared.len());
        for rs in shared {
            rooms.push(rs.read().await.room.clone());
        }
        rooms.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        rooms
    }

    pub async fn room(&self, id: RoomId) -> Result<Room, EngineError> {
        let rs = self.get_room(&id).ok_or(EngineError::RoomNotFound(id))?;
        let guard = rs.read().await;
        Ok(guard.room.clone())
    }

    /// Restrictions of one room intersecting `window` (inclusive), by start date.
    pub async fn restrictions_for_room(
        &self,
        room_id: RoomId,
        window: DateRange,
    ) -> Result<Vec<Restriction>, EngineError> {
        let rs = self
            .get_room(&room_id)
            .ok_or(EngineError::RoomNotFound(room_id))?;
        let guard = rs.read().await;
        Ok(guard.overlapping(&window).cloned().collect())
    }

    /// Restrictions of every room intersecting `window` (inclusive).
    pub async fn restrictions_in_range(&self, window: DateRange) -> Result<Vec<Restriction>, EngineError> {
        let shared: Vec<_> = self.rooms.iter().map(|e| e.value().clone()).collect();
        let mut hits = Vec::new();
        for rs in shared {
            let guard = rs.read().await;
            hits.extend(guard.overlapping(&window).cloned());
        }
        Ok(hits)
    }

    pub fn reservation(&self, id: ReservationId) -> Result<Reservation, EngineError> {
        self.reservations
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(EngineError::ReservationNotFound(id))
    }

    /// Reservations ordered by stay start.
    pub fn reservations(&self, filter: ReservationFilter) -> Vec<Reservation> {
        let mut list: Vec<Reservation> = self
            .reservations
            .iter()
            .filter(|e| match filter {
                ReservationFilter::All => true,
                ReservationFilter::Unprocessed => !e.value().processed,
            })
            .map(|e| e.value().clone())
            .collect();
        list.sort_by(|a, b| a.stay.start.cmp(&b.stay.start).then(a.id.cmp(&b.id)));
        list
    }
}
