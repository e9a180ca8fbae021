//! The store capability the booking core is written against.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::engine::{Engine, EngineError};
use crate::model::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    NotFound(String),
    AlreadyExists(String),
    /// Store-level exclusion rejected a stay overlapping this restriction.
    Conflict(RestrictionId),
    NotABlock(RestrictionId),
    LimitExceeded(&'static str),
    Timeout(Duration),
    Unavailable(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(what) => write!(f, "{what} not found"),
            StoreError::AlreadyExists(what) => write!(f, "{what} already exists"),
            StoreError::Conflict(id) => write!(f, "dates overlap restriction {id}"),
            StoreError::NotABlock(id) => write!(f, "restriction {id} is not a manual block"),
            StoreError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            StoreError::Timeout(after) => write!(f, "store call timed out after {after:?}"),
            StoreError::Unavailable(e) => write!(f, "store unavailable: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<EngineError> for StoreError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::RoomNotFound(id) => StoreError::NotFound(format!("room {id}")),
            EngineError::ReservationNotFound(id) => StoreError::NotFound(format!("reservation {id}")),
            EngineError::RestrictionNotFound(id) => StoreError::NotFound(format!("restriction {id}")),
            EngineError::RoomExists(id) => StoreError::AlreadyExists(format!("room {id}")),
            EngineError::Conflict(id) => StoreError::Conflict(id),
            EngineError::NotABlock(id) => StoreError::NotABlock(id),
            EngineError::LimitExceeded(msg) => StoreError::LimitExceeded(msg),
            EngineError::WalError(e) => StoreError::Unavailable(e),
        }
    }
}

/// Persists rooms, reservations and restrictions.
#[async_trait]
pub trait RestrictionStore: Send + Sync {
    /// All rooms, ordered by name.
    async fn all_rooms(&self) -> Result<Vec<Room>, StoreError>;

    async fn room(&self, id: RoomId) -> Result<Room, StoreError>;

    async fn create_room(&self, id: RoomId, name: String) -> Result<Room, StoreError>;

    /// Restrictions of `room_id` whose range intersects `window`, both inclusive.
    async fn restrictions_for_room(
        &self,
        room_id: RoomId,
        window: DateRange,
    ) -> Result<Vec<Restriction>, StoreError>;

    /// Same as `restrictions_for_room`, across every room.
    async fn restrictions_in_range(&self, window: DateRange) -> Result<Vec<Restriction>, StoreError>;

    /// Insert the reservation and its reservation-backed restriction atomically.
    /// Fails with `Conflict` when the stay overlaps any restriction of the room.
    async fn create_booking(&self, booking: NewBooking) -> Result<Reservation, StoreError>;

    async fn add_block(&self, room_id: RoomId, day: NaiveDate) -> Result<Restriction, StoreError>;

    async fn delete_restriction(&self, id: RestrictionId) -> Result<(), StoreError>;

    async fn reservation(&self, id: ReservationId) -> Result<Reservation, StoreError>;

    async fn reservations(&self, filter: ReservationFilter) -> Result<Vec<Reservation>, StoreError>;

    async fn update_guest(&self, id: ReservationId, guest: Guest) -> Result<(), StoreError>;

    async fn set_processed(&self, id: ReservationId, processed: bool) -> Result<(), StoreError>;

    /// Delete a reservation and the restriction governing it.
    async fn delete_reservation(&self, id: ReservationId) -> Result<(), StoreError>;
}

#[async_trait]
impl RestrictionStore for Engine {
    async fn all_rooms(&self) -> Result<Vec<Room>, StoreError> {
        Ok(self.list_rooms().await)
    }

    async fn room(&self, id: RoomId) -> Result<Room, StoreError> {
        Ok(Engine::room(self, id).await?)
    }

    async fn create_room(&self, id: RoomId, name: String) -> Result<Room, StoreError> {
        Ok(Engine::create_room(self, id, name).await?)
    }

    async fn restrictions_for_room(
        &self,
        room_id: RoomId,
        window: DateRange,
    ) -> Result<Vec<Restriction>, StoreError> {
        Ok(Engine::restrictions_for_room(self, room_id, window).await?)
    }

    async fn restrictions_in_range(&self, window: DateRange) -> Result<Vec<Restriction>, StoreError> {
        Ok(Engine::restrictions_in_range(self, window).await?)
    }

    async fn create_booking(&self, booking: NewBooking) -> Result<Reservation, StoreError> {
        Ok(Engine::create_booking(self, booking).await?)
    }

    async fn add_block(&self, room_id: RoomId, day: NaiveDate) -> Result<Restriction, StoreError> {
        Ok(Engine::add_block(self, room_id, day).await?)
    }

    async fn delete_restriction(&self, id: RestrictionId) -> Result<(), StoreError> {
        Engine::delete_restriction(self, id).await?;
        Ok(())
    }

    async fn reservation(&self, id: ReservationId) -> Result<Reservation, StoreError> {
        Ok(Engine::reservation(self, id)?)
    }

    async fn reservations(&self, filter: ReservationFilter) -> Result<Vec<Reservation>, StoreError> {
        Ok(Engine::reservations(self, filter))
    }

    async fn update_guest(&self, id: ReservationId, guest: Guest) -> Result<(), StoreError> {
        Ok(Engine::update_guest(self, id, guest).await?)
    }

    async fn set_processed(&self, id: ReservationId, processed: bool) -> Result<(), StoreError> {
        Ok(Engine::set_processed(self, id, processed).await?)
    }

    async fn delete_reservation(&self, id: ReservationId) -> Result<(), StoreError> {
        Engine::delete_reservation(self, id).await?;
        Ok(())
    }
}

/// Bounds every store call with a fixed timeout; expiry is reported as
/// `StoreError::Timeout`.
///
/// Writes run on their own task, so a caller that gives up never leaves a
/// record in the WAL that memory has not seen.
#[derive(Clone)]
pub struct TimedStore {
    inner: Arc<dyn RestrictionStore>,
    timeout: Duration,
}

impl TimedStore {
    pub fn new(inner: Arc<dyn RestrictionStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn read<T, Fut>(&self, fut: Fut) -> Result<T, StoreError>
    where
        Fut: Future<Output = Result<T, StoreError>> + Send,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .unwrap_or(Err(StoreError::Timeout(self.timeout)))
    }

    async fn write<T, F, Fut>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(Arc<dyn RestrictionStore>) -> Fut,
        Fut: Future<Output = Result<T, StoreError>> + Send + 'static,
    {
        let handle = tokio::spawn(op(self.inner.clone()));
        match tokio::time::timeout(self.timeout, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(StoreError::Unavailable(join.to_string())),
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        }
    }
}

#[async_trait]
impl RestrictionStore for TimedStore {
    async fn all_rooms(&self) -> Result<Vec<Room>, StoreError> {
        self.read(self.inner.all_rooms()).await
    }

    async fn room(&self, id: RoomId) -> Result<Room, StoreError> {
        self.read(self.inner.room(id)).await
    }

    async fn create_room(&self, id: RoomId, name: String) -> Result<Room, StoreError> {
        self.write(move |s| async move { s.create_room(id, name).await })
            .await
    }

    async fn restrictions_for_room(
        &self,
        room_id: RoomId,
        window: DateRange,
    ) -> Result<Vec<Restriction>, StoreError> {
        self.read(self.inner.restrictions_for_room(room_id, window))
            .await
    }

    async fn restrictions_in_range(&self, window: DateRange) -> Result<Vec<Restriction>, StoreError> {
        self.read(self.inner.restrictions_in_range(window)).await
    }

    async fn create_booking(&self, booking: NewBooking) -> Result<Reservation, StoreError> {
        self.write(move |s| async move { s.create_booking(booking).await })
            .await
    }

    async fn add_block(&self, room_id: RoomId, day: NaiveDate) -> Result<Restriction, StoreError> {
        self.write(move |s| async move { s.add_block(room_id, day).await })
            .await
    }

    async fn delete_restriction(&self, id: RestrictionId) -> Result<(), StoreError> {
        self.write(move |s| async move { s.delete_restriction(id).await })
            .await
    }

    async fn reservation(&self, id: ReservationId) -> Result<Reservation, StoreError> {
        self.read(self.inner.reservation(id)).await
    }

    async fn reservations(&self, filter: ReservationFilter) -> Result<Vec<Reservation>, StoreError> {
        self.read(self.inner.reservations(filter)).await
    }

    async fn update_guest(&self, id: ReservationId, guest: Guest) -> Result<(), StoreError> {
        self.write(move |s| async move { s.update_guest(id, guest).await })
            .await
    }

    async fn set_processed(&self, id: ReservationId, processed: bool) -> Result<(), StoreError> {
        self.write(move |s| async move { s.set_processed(id, processed).await })
            .await
    }

    async fn delete_reservation(&self, id: ReservationId) -> Result<(), StoreError> {
        self.write(move |s| async move { s.delete_reservation(id).await })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::date;

    /// Never answers.
    struct StuckStore;

    #[async_trait]
    impl RestrictionStore for StuckStore {
        async fn all_rooms(&self) -> Result<Vec<Room>, StoreError> {
            std::future::pending().await
        }
        async fn room(&self, _: RoomId) -> Result<Room, StoreError> {
            std::future::pending().await
        }
        async fn create_room(&self, _: RoomId, _: String) -> Result<Room, StoreError> {
            std::future::pending().await
        }
        async fn restrictions_for_room(&self, _: RoomId, _: DateRange) -> Result<Vec<Restriction>, StoreError> {
            std::future::pending().await
        }
        async fn restrictions_in_range(&self, _: DateRange) -> Result<Vec<Restriction>, StoreError> {
            std::future::pending().await
        }
        async fn create_booking(&self, _: NewBooking) -> Result<Reservation, StoreError> {
            std::future::pending().await
        }
        async fn add_block(&self, _: RoomId, _: NaiveDate) -> Result<Restriction, StoreError> {
            std::future::pending().await
        }
        async fn delete_restriction(&self, _: RestrictionId) -> Result<(), StoreError> {
            std::future::pending().await
        }
        async fn reservation(&self, _: ReservationId) -> Result<Reservation, StoreError> {
            std::future::pending().await
        }
        async fn reservations(&self, _: ReservationFilter) -> Result<Vec<Reservation>, StoreError> {
            std::future::pending().await
        }
        async fn update_guest(&self, _: ReservationId, _: Guest) -> Result<(), StoreError> {
            std::future::pending().await
        }
        async fn set_processed(&self, _: ReservationId, _: bool) -> Result<(), StoreError> {
            std::future::pending().await
        }
        async fn delete_reservation(&self, _: ReservationId) -> Result<(), StoreError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn reads_time_out() {
        let timeout = Duration::from_millis(20);
        let store = TimedStore::new(Arc::new(StuckStore), timeout);
        assert_eq!(store.all_rooms().await, Err(StoreError::Timeout(timeout)));
        let window = DateRange::new(date(2025, 6, 1), date(2025, 6, 30));
        assert_eq!(
            store.restrictions_for_room(1, window).await,
            Err(StoreError::Timeout(timeout))
        );
    }

    #[tokio::test]
    async fn writes_time_out() {
        let timeout = Duration::from_millis(20);
        let store = TimedStore::new(Arc::new(StuckStore), timeout);
        assert_eq!(
            store.add_block(1, date(2025, 6, 5)).await,
            Err(StoreError::Timeout(timeout))
        );
    }

    #[test]
    fn engine_errors_map_to_store_errors() {
        let id = ulid::Ulid::new();
        assert_eq!(StoreError::from(EngineError::Conflict(id)), StoreError::Conflict(id));
        assert_eq!(
            StoreError::from(EngineError::RoomNotFound(9)),
            StoreError::NotFound("room 9".into())
        );
        assert!(matches!(
            StoreError::from(EngineError::WalError("disk full".into())),
            StoreError::Unavailable(_)
        ));
    }
}
