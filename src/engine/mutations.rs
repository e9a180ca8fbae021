use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tokio::sync::{oneshot, RwLock};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::{check_capacity, check_no_conflict, validate_guest, validate_stay};
use super::{Engine, EngineError, WalCommand};

impl Engine {
    pub async fn create_room(&self, id: RoomId, name: String) -> Result<Room, EngineError> {
        let _room_set = self.room_set.write().await;
        if self.rooms.len() >= MAX_ROOMS {
            return Err(EngineError::LimitExceeded("too many rooms"));
        }
        if name.len() > MAX_ROOM_NAME_LEN {
            return Err(EngineError::LimitExceeded("room name too long"));
        }
        if self.rooms.contains_key(&id) {
            return Err(EngineError::RoomExists(id));
        }

        let event = Event::RoomCreated {
            id,
            name: name.clone(),
        };
        self.wal_append(&event).await?;
        let room = Room { id, name };
        self.rooms
            .insert(id, Arc::new(RwLock::new(RoomState::new(room.clone()))));
        metrics::gauge!(crate::observability::ROOMS_ACTIVE).set(self.rooms.len() as f64);
        Ok(room)
    }

    /// Write a reservation and its governing restriction as one record.
    ///
    /// The overlap check and the write happen under the room's write lock, so
    /// two callers racing for the same nights cannot both succeed.
    pub async fn create_booking(&self, booking: NewBooking) -> Result<Reservation, EngineError> {
        validate_stay(&booking.stay)?;
        validate_guest(&booking.guest)?;
        let mut guard = self.room_write(booking.room_id).await?;
        check_capacity(&guard)?;
        check_no_conflict(&guard, &booking.stay)?;

        let now = Utc::now();
        let reservation = Reservation {
            id: Ulid::new(),
            guest: booking.guest,
            room_id: booking.room_id,
            stay: booking.stay,
            processed: false,
            created_at: now,
            updated_at: now,
        };
        let restriction = Restriction {
            id: Ulid::new(),
            room_id: booking.room_id,
            range: booking.stay,
            kind: RestrictionKind::Reservation {
                reservation_id: reservation.id,
            },
        };
        let event = Event::BookingCreated {
            reservation: reservation.clone(),
            restriction,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(reservation)
    }

    /// Place a manual block on a single day. Blocks are not checked for overlap.
    pub async fn add_block(&self, room_id: RoomId, day: NaiveDate) -> Result<Restriction, EngineError> {
        let mut guard = self.room_write(room_id).await?;
        check_capacity(&guard)?;

        let restriction = Restriction {
            id: Ulid::new(),
            room_id,
            range: DateRange::day(day),
            kind: RestrictionKind::Block,
        };
        let event = Event::BlockAdded {
            restriction: restriction.clone(),
        };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(restriction)
    }

    /// Remove a manual block. Reservation-backed restrictions go away only
    /// with their reservation.
    pub async fn delete_restriction(&self, id: RestrictionId) -> Result<RoomId, EngineError> {
        let room_id = self
            .room_for_restriction(&id)
            .ok_or(EngineError::RestrictionNotFound(id))?;
        let mut guard = self.room_write(room_id).await?;
        match guard.find(id) {
            None => return Err(EngineError::RestrictionNotFound(id)),
            Some(r) if !r.is_block() => return Err(EngineError::NotABlock(id)),
            Some(_) => {}
        }

        let event = Event::RestrictionRemoved { id, room_id };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(room_id)
    }

    pub async fn update_guest(&self, id: ReservationId, guest: Guest) -> Result<(), EngineError> {
        validate_guest(&guest)?;
        let (room_id, mut guard) = self.resolve_reservation_write(&id).await?;
        let event = Event::GuestUpdated {
            id,
            room_id,
            guest,
            updated_at: Utc::now(),
        };
        self.persist_and_apply(&mut guard, &event).await
    }

    pub async fn set_processed(&self, id: ReservationId, processed: bool) -> Result<(), EngineError> {
        let (room_id, mut guard) = self.resolve_reservation_write(&id).await?;
        let event = Event::ProcessedSet {
            id,
            room_id,
            processed,
            updated_at: Utc::now(),
        };
        self.persist_and_apply(&mut guard, &event).await
    }

    /// Delete a reservation together with its governing restriction.
    pub async fn delete_reservation(&self, id: ReservationId) -> Result<RoomId, EngineError> {
        let (room_id, mut guard) = self.resolve_reservation_write(&id).await?;
        let event = Event::ReservationDeleted { id, room_id };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(room_id)
    }

    /// Compact the WAL by rewriting it with only the events needed to recreate the current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let mut events = Vec::new();

        let room_set = self.room_set.read().await;
        let mut room_ids: Vec<RoomId> = self.rooms.iter().map(|e| *e.key()).collect();
        room_ids.sort_unstable();

        // Read locks stay held until the compacted file is swapped in, so no
        // mutation can reach the WAL between the copy and the swap.
        let mut guards = Vec::with_capacity(room_ids.len());
        for room_id in room_ids {
            if let Some(rs) = self.get_room(&room_id) {
                guards.push(rs.read_owned().await);
            }
        }

        for guard in &guards {
            events.push(Event::RoomCreated {
                id: guard.room.id,
                name: guard.room.name.clone(),
            });
            for restriction in &guard.restrictions {
                match restriction.kind {
                    RestrictionKind::Block => events.push(Event::BlockAdded {
                        restriction: restriction.clone(),
                    }),
                    RestrictionKind::Reservation { reservation_id } => {
                        if let Some(reservation) = self.reservations.get(&reservation_id) {
                            events.push(Event::BookingCreated {
                                reservation: reservation.value().clone(),
                                restriction: restriction.clone(),
                            });
                        }
                    }
                }
            }
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))?;
        drop(guards);
        drop(room_set);
        Ok(())
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
