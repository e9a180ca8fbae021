//! Durable restriction store: in-memory room state rebuilt from the WAL.

mod conflict;
mod error;
mod mutations;
mod queries;

pub use error::EngineError;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, OwnedRwLockWriteGuard, RwLock};

use crate::model::*;
use crate::wal::Wal;

pub type SharedRoomState = Arc<RwLock<RoomState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it, then drain every Append already queued.
/// 3. One flush_sync for the whole batch, then answer every sender.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush what we have before running the other command
                            flush_and_respond(&mut wal, &mut batch);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break,
                    }
                }

                if !batch.is_empty() {
                    flush_and_respond(&mut wal, &mut batch);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_and_respond(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Flush even after an append error so partially buffered bytes don't
    // leak into the next batch.
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

pub struct Engine {
    pub(super) rooms: DashMap<RoomId, SharedRoomState>,
    pub(super) reservations: DashMap<ReservationId, Reservation>,
    /// Reverse lookup: restriction id → room id
    pub(super) restriction_to_room: DashMap<RestrictionId, RoomId>,
    /// Write-held while a room is created; compaction read-holds it so the
    /// room set can't change under it.
    pub(super) room_set: RwLock<()>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
}

/// Apply a room-scoped event. The caller holds the room's lock.
fn apply_to_room(
    rs: &mut RoomState,
    event: &Event,
    index: &DashMap<RestrictionId, RoomId>,
    reservations: &DashMap<ReservationId, Reservation>,
) {
    match event {
        Event::BookingCreated {
            reservation,
            restriction,
        } => {
            reservations.insert(reservation.id, reservation.clone());
            rs.insert_restriction(restriction.clone());
            index.insert(restriction.id, restriction.room_id);
        }
        Event::BlockAdded { restriction } => {
            rs.insert_restriction(restriction.clone());
            index.insert(restriction.id, restriction.room_id);
        }
        Event::RestrictionRemoved { id, .. } => {
            rs.remove_restriction(*id);
            index.remove(id);
        }
        Event::GuestUpdated {
            id,
            guest,
            updated_at,
            ..
        } => {
            if let Some(mut r) = reservations.get_mut(id) {
                r.guest = guest.clone();
                r.updated_at = *updated_at;
            }
        }
        Event::ProcessedSet {
            id,
            processed,
            updated_at,
            ..
        } => {
            if let Some(mut r) = reservations.get_mut(id) {
                r.processed = *processed;
                r.updated_at = *updated_at;
            }
        }
        Event::ReservationDeleted { id, .. } => {
            reservations.remove(id);
            let governing: Vec<RestrictionId> = rs
                .restrictions
                .iter()
                .filter(|r| r.reservation_id() == Some(*id))
                .map(|r| r.id)
                .collect();
            for rid in governing {
                rs.remove_restriction(rid);
                index.remove(&rid);
            }
        }
        // RoomCreated is handled at the DashMap level, not here
        Event::RoomCreated { .. } => {}
    }
}

/// The room an event touches (everything but RoomCreated).
fn event_room_id(event: &Event) -> Option<RoomId> {
    match event {
        Event::BookingCreated { restriction, .. } | Event::BlockAdded { restriction } => {
            Some(restriction.room_id)
        }
        Event::RestrictionRemoved { room_id, .. }
        | Event::GuestUpdated { room_id, .. }
        | Event::ProcessedSet { room_id, .. }
        | Event::ReservationDeleted { room_id, .. } => Some(*room_id),
        Event::RoomCreated { .. } => None,
    }
}

impl Engine {
    /// Replay the WAL at `wal_path` and start the group-commit writer.
    /// Must run inside a tokio runtime.
    pub fn new(wal_path: PathBuf) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            rooms: DashMap::new(),
            reservations: DashMap::new(),
            restriction_to_room: DashMap::new(),
            room_set: RwLock::new(()),
            wal_tx,
        };

        // We own every Arc during replay, so try_write always succeeds.
        // Never use blocking_write here: this may run inside an async context.
        for event in &events {
            match event {
                Event::RoomCreated { id, name } => {
                    let rs = RoomState::new(Room {
                        id: *id,
                        name: name.clone(),
                    });
                    engine.rooms.insert(*id, Arc::new(RwLock::new(rs)));
                }
                other => {
                    if let Some(room_id) = event_room_id(other)
                        && let Some(entry) = engine.rooms.get(&room_id)
                    {
                        let rs_arc = entry.clone();
                        let mut guard = rs_arc
                            .try_write()
                            .map_err(|_| io::Error::other("replay: room state contended"))?;
                        apply_to_room(
                            &mut guard,
                            other,
                            &engine.restriction_to_room,
                            &engine.reservations,
                        );
                    }
                }
            }
        }

        tracing::debug!(
            events = events.len(),
            rooms = engine.rooms.len(),
            reservations = engine.reservations.len(),
            "replayed WAL"
        );
        metrics::gauge!(crate::observability::ROOMS_ACTIVE).set(engine.rooms.len() as f64);
        Ok(engine)
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub fn get_room(&self, id: &RoomId) -> Option<SharedRoomState> {
        self.rooms.get(id).map(|e| e.value().clone())
    }

    pub fn room_for_restriction(&self, restriction_id: &RestrictionId) -> Option<RoomId> {
        self.restriction_to_room.get(restriction_id).map(|e| *e.value())
    }

    /// WAL-append then apply, under the caller's room lock.
    pub(super) async fn persist_and_apply(
        &self,
        rs: &mut RoomState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_room(rs, event, &self.restriction_to_room, &self.reservations);
        Ok(())
    }

    pub(super) async fn room_write(
        &self,
        room_id: RoomId,
    ) -> Result<OwnedRwLockWriteGuard<RoomState>, EngineError> {
        let rs = self
            .get_room(&room_id)
            .ok_or(EngineError::RoomNotFound(room_id))?;
        Ok(rs.write_owned().await)
    }

    /// Lookup reservation → room, acquire the room's write lock, then confirm
    /// the reservation still exists.
    pub(super) async fn resolve_reservation_write(
        &self,
        id: &ReservationId,
    ) -> Result<(RoomId, OwnedRwLockWriteGuard<RoomState>), EngineError> {
        let room_id = self
            .reservations
            .get(id)
            .map(|r| r.room_id)
            .ok_or(EngineError::ReservationNotFound(*id))?;
        let guard = self.room_write(room_id).await?;
        if !self.reservations.contains_key(id) {
            return Err(EngineError::ReservationNotFound(*id));
        }
        Ok((room_id, guard))
    }
}
