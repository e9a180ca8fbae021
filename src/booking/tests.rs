use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use super::*;
use crate::engine::Engine;
use crate::model::*;
use crate::store::{RestrictionStore, StoreError};

fn test_wal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("innkeep_test_booking");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

async fn store_with_rooms(name: &str) -> Arc<Engine> {
    let engine = Engine::new(test_wal_path(name)).unwrap();
    engine.create_room(1, "General's Quarters".into()).await.unwrap();
    engine.create_room(2, "Major's Suite".into()).await.unwrap();
    Arc::new(engine)
}

fn request(room_id: RoomId, start: NaiveDate, end: NaiveDate) -> BookingRequest {
    BookingRequest {
        guest: Guest {
            first_name: "Jane".into(),
            last_name: "Shepard".into(),
            email: "jane@example.com".into(),
            phone: "555-0100".into(),
        },
        room_id,
        start,
        end,
    }
}

fn form(fields: &[(&str, &str)]) -> CalendarForm {
    let owned: Vec<(String, String)> = fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    CalendarForm::parse(&owned).unwrap()
}

/// Every call fails as if the store were unreachable.
struct FailingStore;

fn down<T>() -> Result<T, StoreError> {
    Err(StoreError::Unavailable("connection refused".into()))
}

#[async_trait]
impl RestrictionStore for FailingStore {
    async fn all_rooms(&self) -> Result<Vec<Room>, StoreError> {
        down()
    }
    async fn room(&self, _: RoomId) -> Result<Room, StoreError> {
        down()
    }
    async fn create_room(&self, _: RoomId, _: String) -> Result<Room, StoreError> {
        down()
    }
    async fn restrictions_for_room(&self, _: RoomId, _: DateRange) -> Result<Vec<Restriction>, StoreError> {
        down()
    }
    async fn restrictions_in_range(&self, _: DateRange) -> Result<Vec<Restriction>, StoreError> {
        down()
    }
    async fn create_booking(&self, _: NewBooking) -> Result<Reservation, StoreError> {
        down()
    }
    async fn add_block(&self, _: RoomId, _: NaiveDate) -> Result<Restriction, StoreError> {
        down()
    }
    async fn delete_restriction(&self, _: RestrictionId) -> Result<(), StoreError> {
        down()
    }
    async fn reservation(&self, _: ReservationId) -> Result<Reservation, StoreError> {
        down()
    }
    async fn reservations(&self, _: ReservationFilter) -> Result<Vec<Reservation>, StoreError> {
        down()
    }
    async fn update_guest(&self, _: ReservationId, _: Guest) -> Result<(), StoreError> {
        down()
    }
    async fn set_processed(&self, _: ReservationId, _: bool) -> Result<(), StoreError> {
        down()
    }
    async fn delete_reservation(&self, _: ReservationId) -> Result<(), StoreError> {
        down()
    }
}

async fn blocks_of(store: &Engine, room_id: RoomId) -> Vec<Restriction> {
    let window = DateRange::new(date(2025, 1, 1), date(2025, 12, 31));
    store
        .restrictions_for_room(room_id, window)
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.is_block())
        .collect()
}

// ── Availability ─────────────────────────────────────────

#[tokio::test]
async fn empty_room_is_available() {
    let store = store_with_rooms("avail_empty.wal").await;
    assert!(is_room_available(&*store, 1, date(2025, 6, 1), date(2025, 6, 5)).await);
}

#[tokio::test]
async fn checkout_day_is_free_for_checkin() {
    let store = store_with_rooms("avail_boundary.wal").await;
    create_booking(&*store, request(1, date(2025, 6, 10), date(2025, 6, 12)))
        .await
        .unwrap();

    assert!(is_room_available(&*store, 1, date(2025, 6, 12), date(2025, 6, 14)).await);
    assert!(!is_room_available(&*store, 1, date(2025, 6, 9), date(2025, 6, 11)).await);
    assert!(!is_room_available(&*store, 1, date(2025, 6, 10), date(2025, 6, 12)).await);
    assert!(!is_room_available(&*store, 1, date(2025, 6, 1), date(2025, 6, 30)).await);
    assert!(is_room_available(&*store, 1, date(2025, 6, 8), date(2025, 6, 10)).await);
    assert!(is_room_available(&*store, 2, date(2025, 6, 10), date(2025, 6, 12)).await);
}

#[tokio::test]
async fn block_is_unavailable_only_when_straddled() {
    let store = store_with_rooms("avail_block.wal").await;
    store.add_block(1, date(2025, 6, 10)).await.unwrap();
    assert!(is_room_available(&*store, 1, date(2025, 6, 10), date(2025, 6, 11)).await);
    assert!(!is_room_available(&*store, 1, date(2025, 6, 9), date(2025, 6, 11)).await);
}

#[tokio::test]
async fn store_failure_reads_as_unavailable() {
    assert!(!is_room_available(&FailingStore, 1, date(2025, 6, 1), date(2025, 6, 5)).await);

    let store = store_with_rooms("avail_unknown_room.wal").await;
    assert!(!is_room_available(&*store, 42, date(2025, 6, 1), date(2025, 6, 5)).await);
}

#[tokio::test]
async fn search_returns_free_rooms() {
    let store = store_with_rooms("search_free.wal").await;
    create_booking(&*store, request(1, date(2025, 6, 10), date(2025, 6, 12)))
        .await
        .unwrap();

    let rooms = search_available_rooms(&*store, date(2025, 6, 11), date(2025, 6, 13))
        .await
        .unwrap();
    assert_eq!(rooms.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2]);

    let rooms = search_available_rooms(&*store, date(2025, 6, 12), date(2025, 6, 13))
        .await
        .unwrap();
    assert_eq!(rooms.len(), 2);
}

#[tokio::test]
async fn search_with_nothing_free_is_empty_not_error() {
    let store = store_with_rooms("search_none.wal").await;
    for room in [1, 2] {
        create_booking(&*store, request(room, date(2025, 6, 1), date(2025, 6, 30)))
            .await
            .unwrap();
    }
    let rooms = search_available_rooms(&*store, date(2025, 6, 5), date(2025, 6, 7))
        .await
        .unwrap();
    assert!(rooms.is_empty());
}

#[tokio::test]
async fn multi_year_range_is_answered() {
    let store = store_with_rooms("avail_long.wal").await;
    let (start, end) = (date(2025, 1, 1), date(2036, 1, 1));
    assert!(is_room_available(&*store, 1, start, end).await);
    assert_eq!(search_available_rooms(&*store, start, end).await.unwrap().len(), 2);

    store.add_block(2, date(2033, 7, 4)).await.unwrap();
    assert!(!is_room_available(&*store, 2, start, end).await);
    let rooms = search_available_rooms(&*store, start, end).await.unwrap();
    assert_eq!(rooms.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1]);
}

#[tokio::test]
async fn search_surfaces_store_errors() {
    let result = search_available_rooms(&FailingStore, date(2025, 6, 5), date(2025, 6, 7)).await;
    assert!(matches!(result, Err(BookingError::Store(StoreError::Unavailable(_)))));
}

// ── Booking ──────────────────────────────────────────────

#[tokio::test]
async fn booking_rejects_bad_dates_without_writing() {
    let store = store_with_rooms("booking_validation.wal").await;
    let result = create_booking(&*store, request(1, date(2025, 6, 12), date(2025, 6, 12))).await;
    assert!(matches!(result, Err(BookingError::Validation(_))));
    let result = create_booking(&*store, request(1, date(2025, 6, 12), date(2027, 6, 12))).await;
    assert!(matches!(result, Err(BookingError::Validation(_))));
    assert!(store.reservations(ReservationFilter::All).is_empty());
}

#[tokio::test]
async fn booking_overlap_is_a_conflict() {
    let store = store_with_rooms("booking_conflict.wal").await;
    let first = create_booking(&*store, request(1, date(2025, 6, 10), date(2025, 6, 12)))
        .await
        .unwrap();
    let second = create_booking(&*store, request(1, date(2025, 6, 11), date(2025, 6, 14))).await;
    assert!(matches!(second, Err(BookingError::Store(StoreError::Conflict(_)))));

    let all = store.reservations(ReservationFilter::All);
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, first);
}

#[tokio::test]
async fn booking_store_failure_is_surfaced() {
    let result = create_booking(&FailingStore, request(1, date(2025, 6, 10), date(2025, 6, 12))).await;
    assert!(matches!(result, Err(BookingError::Store(_))));
}

// ── Snapshot ─────────────────────────────────────────────

#[tokio::test]
async fn snapshot_covers_every_day_of_month() {
    let store = store_with_rooms("snapshot_days.wal").await;
    let room = store.room(1).await.unwrap();
    let snap = build_month_snapshot(&*store, &room, 2024, 2).await.unwrap();
    assert_eq!(snap.block_of_day.len(), 29);
    assert_eq!(snap.reservation_of_day.len(), 29);
    assert!(snap.block_of_day.values().all(Option::is_none));
}

#[tokio::test]
async fn snapshot_marks_reservations_and_blocks() {
    let store = store_with_rooms("snapshot_marks.wal").await;
    let res = create_booking(&*store, request(1, date(2025, 5, 30), date(2025, 6, 2)))
        .await
        .unwrap();
    let block = store.add_block(1, date(2025, 6, 1)).await.unwrap();
    store.add_block(2, date(2025, 6, 1)).await.unwrap();

    let room = store.room(1).await.unwrap();
    let snap = build_month_snapshot(&*store, &room, 2025, 6).await.unwrap();

    // The whole stay is marked, checkout day and days before the month included.
    for d in [date(2025, 5, 30), date(2025, 5, 31), date(2025, 6, 1), date(2025, 6, 2)] {
        assert_eq!(snap.reservation_of_day.get(&d), Some(&Some(res)), "{d}");
    }
    assert_eq!(snap.reservation_of_day.get(&date(2025, 6, 3)), Some(&None));

    // A block on the first of the month is part of the month.
    assert_eq!(snap.block_of_day.get(&date(2025, 6, 1)), Some(&Some(block.id)));
    assert_eq!(snap.blocks().count(), 1);
}

#[tokio::test]
async fn calendar_version_tracks_content() {
    let store = store_with_rooms("snapshot_version.wal").await;
    let a = build_calendar(&*store, 2025, 6).await.unwrap();
    let b = build_calendar(&*store, 2025, 6).await.unwrap();
    assert_eq!(a.version, b.version);
    assert_eq!(a.rooms.len(), 2);

    store.add_block(2, date(2025, 6, 9)).await.unwrap();
    let c = build_calendar(&*store, 2025, 6).await.unwrap();
    assert_ne!(a.version, c.version);
}

#[tokio::test]
async fn calendar_rejects_invalid_month() {
    let store = store_with_rooms("snapshot_bad_month.wal").await;
    assert!(matches!(
        build_calendar(&*store, 2025, 13).await,
        Err(BookingError::Validation(_))
    ));
}

// ── Reconciliation ───────────────────────────────────────

#[test]
fn form_parse_collects_fields() {
    let f = form(&[
        ("y", "2025"),
        ("m", "6"),
        ("remove_block_1_2025-06-5", "1"),
        ("remove_block_1_2025-06-6", ""),
        ("add_block_2_2025-06-7", ""),
        ("add_block_2_2025-06-7", "1"),
        ("add_block_1_2025-06-10", "1"),
    ]);
    assert_eq!((f.year, f.month, f.version), (2025, 6, None));
    assert!(f.has("remove_block_1_2025-06-5"));
    assert!(!f.has("remove_block_1_2025-06-6"));
    assert_eq!(f.additions, vec![(2, date(2025, 6, 7)), (1, date(2025, 6, 10))]);
}

#[test]
fn form_parse_rejects_bad_input() {
    let parse = |fields: &[(&str, &str)]| {
        let owned: Vec<(String, String)> = fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CalendarForm::parse(&owned)
    };
    assert!(parse(&[("m", "6")]).is_err());
    assert!(parse(&[("y", "2025"), ("m", "13")]).is_err());
    assert!(parse(&[("y", "2025"), ("m", "6"), ("v", "abc")]).is_err());
    assert!(parse(&[("y", "2025"), ("m", "6"), ("add_block_x_2025-06-1", "1")]).is_err());
    assert!(parse(&[("y", "2025"), ("m", "6"), ("add_block_1_2025-6-1", "1")]).is_err());
}

#[tokio::test]
async fn kept_blocks_are_untouched() {
    let store = store_with_rooms("reconcile_keep.wal").await;
    store.add_block(1, date(2025, 6, 5)).await.unwrap();
    store.add_block(1, date(2025, 6, 20)).await.unwrap();
    let baseline = build_calendar(&*store, 2025, 6).await.unwrap();

    let f = form(&[
        ("y", "2025"),
        ("m", "6"),
        ("remove_block_1_2025-06-5", "1"),
        ("remove_block_1_2025-06-20", "1"),
    ]);
    let out = reconcile(&*store, &baseline, &f, ReconcileOptions::default())
        .await
        .unwrap();
    assert!(out.removed.is_empty());
    assert!(out.added.is_empty());
    assert_eq!(blocks_of(&store, 1).await.len(), 2);
    assert_eq!(out.snapshot.version, baseline.version);
}

#[tokio::test]
async fn omitted_block_is_deleted() {
    let store = store_with_rooms("reconcile_omit.wal").await;
    let gone = store.add_block(1, date(2025, 6, 5)).await.unwrap();
    let kept = store.add_block(1, date(2025, 6, 20)).await.unwrap();
    let other_room = store.add_block(2, date(2025, 6, 5)).await.unwrap();
    let baseline = build_calendar(&*store, 2025, 6).await.unwrap();

    let f = form(&[
        ("y", "2025"),
        ("m", "6"),
        ("remove_block_1_2025-06-20", "1"),
        ("remove_block_2_2025-06-5", "1"),
    ]);
    let out = reconcile(&*store, &baseline, &f, ReconcileOptions::default())
        .await
        .unwrap();
    assert_eq!(out.removed, vec![gone.id]);
    assert_eq!(blocks_of(&store, 1).await.iter().map(|r| r.id).collect::<Vec<_>>(), vec![kept.id]);
    assert_eq!(blocks_of(&store, 2).await[0].id, other_room.id);
    assert_eq!(out.snapshot.room(1).unwrap().blocks().count(), 1);
}

#[tokio::test]
async fn reservations_are_never_touched() {
    let store = store_with_rooms("reconcile_reservations.wal").await;
    let res = create_booking(&*store, request(1, date(2025, 6, 10), date(2025, 6, 12)))
        .await
        .unwrap();
    let baseline = build_calendar(&*store, 2025, 6).await.unwrap();

    let f = form(&[("y", "2025"), ("m", "6")]);
    reconcile(&*store, &baseline, &f, ReconcileOptions::default())
        .await
        .unwrap();
    assert!(store.reservation(res).is_ok());
}

#[tokio::test]
async fn addition_inserts_one_block_and_repeats_duplicate() {
    let store = store_with_rooms("reconcile_add.wal").await;
    let baseline = build_calendar(&*store, 2025, 6).await.unwrap();
    let f = form(&[("y", "2025"), ("m", "6"), ("add_block_1_2025-06-7", "1")]);

    let out = reconcile(&*store, &baseline, &f, ReconcileOptions::default())
        .await
        .unwrap();
    assert_eq!(out.added.len(), 1);
    assert_eq!(out.added[0].range, DateRange::day(date(2025, 6, 7)));
    assert_eq!(blocks_of(&store, 1).await.len(), 1);

    // Same form, same baseline: a second row for the same day.
    reconcile(&*store, &baseline, &f, ReconcileOptions::default())
        .await
        .unwrap();
    assert_eq!(blocks_of(&store, 1).await.len(), 2);
}

#[tokio::test]
async fn dedupe_skips_existing_blocks() {
    let store = store_with_rooms("reconcile_dedupe.wal").await;
    let baseline = build_calendar(&*store, 2025, 6).await.unwrap();
    let f = form(&[("y", "2025"), ("m", "6"), ("add_block_1_2025-06-7", "1")]);
    let options = ReconcileOptions {
        dedupe_additions: true,
    };

    reconcile(&*store, &baseline, &f, options).await.unwrap();
    let out = reconcile(&*store, &baseline, &f, options).await.unwrap();
    assert!(out.added.is_empty());
    assert_eq!(out.skipped, vec![(1, date(2025, 6, 7))]);
    assert_eq!(blocks_of(&store, 1).await.len(), 1);
}

#[tokio::test]
async fn removals_run_before_additions() {
    let store = store_with_rooms("reconcile_order.wal").await;
    let old = store.add_block(1, date(2025, 6, 7)).await.unwrap();
    let baseline = build_calendar(&*store, 2025, 6).await.unwrap();

    // Unchecked and re-added: the old row goes, a new row takes its place.
    let f = form(&[("y", "2025"), ("m", "6"), ("add_block_1_2025-06-7", "1")]);
    let out = reconcile(
        &*store,
        &baseline,
        &f,
        ReconcileOptions {
            dedupe_additions: true,
        },
    )
    .await
    .unwrap();
    assert_eq!(out.removed, vec![old.id]);
    assert_eq!(out.added.len(), 1);
    let blocks = blocks_of(&store, 1).await;
    assert_eq!(blocks.len(), 1);
    assert_ne!(blocks[0].id, old.id);
}

#[tokio::test]
async fn stale_baseline_is_rejected() {
    let store = store_with_rooms("reconcile_stale.wal").await;
    store.add_block(1, date(2025, 6, 5)).await.unwrap();
    let baseline = build_calendar(&*store, 2025, 6).await.unwrap();

    let wrong_version = (baseline.version.wrapping_add(1)).to_string();
    let f = form(&[("y", "2025"), ("m", "6"), ("v", wrong_version.as_str())]);
    let result = reconcile(&*store, &baseline, &f, ReconcileOptions::default()).await;
    assert_eq!(result.unwrap_err(), BookingError::StaleSnapshot);

    let f = form(&[("y", "2025"), ("m", "7")]);
    let result = reconcile(&*store, &baseline, &f, ReconcileOptions::default()).await;
    assert_eq!(result.unwrap_err(), BookingError::StaleSnapshot);

    // Nothing was removed.
    assert_eq!(blocks_of(&store, 1).await.len(), 1);
}

#[tokio::test]
async fn unknown_room_rejected_before_any_write() {
    let store = store_with_rooms("reconcile_unknown_room.wal").await;
    store.add_block(1, date(2025, 6, 5)).await.unwrap();
    let baseline = build_calendar(&*store, 2025, 6).await.unwrap();

    let version = baseline.version.to_string();
    let f = form(&[
        ("y", "2025"),
        ("m", "6"),
        ("v", version.as_str()),
        ("add_block_9_2025-06-7", "1"),
    ]);
    let result = reconcile(&*store, &baseline, &f, ReconcileOptions::default()).await;
    assert!(matches!(result, Err(BookingError::Validation(_))));
    assert_eq!(blocks_of(&store, 1).await.len(), 1);
}

#[tokio::test]
async fn already_deleted_block_is_skipped() {
    let store = store_with_rooms("reconcile_gone.wal").await;
    let block = store.add_block(1, date(2025, 6, 5)).await.unwrap();
    let baseline = build_calendar(&*store, 2025, 6).await.unwrap();
    store.delete_restriction(block.id).await.unwrap();

    let f = form(&[("y", "2025"), ("m", "6")]);
    let out = reconcile(&*store, &baseline, &f, ReconcileOptions::default())
        .await
        .unwrap();
    assert!(out.removed.is_empty());
}

#[tokio::test]
async fn store_failure_aborts_reconciliation() {
    let store = store_with_rooms("reconcile_failure.wal").await;
    store.add_block(1, date(2025, 6, 5)).await.unwrap();
    let baseline = build_calendar(&*store, 2025, 6).await.unwrap();

    let f = form(&[("y", "2025"), ("m", "6")]);
    let result = reconcile(&FailingStore, &baseline, &f, ReconcileOptions::default()).await;
    assert!(matches!(result, Err(BookingError::Store(StoreError::Unavailable(_)))));
}
