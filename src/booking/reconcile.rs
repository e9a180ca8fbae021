use std::collections::HashSet;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::limits::MAX_FORM_FIELDS;
use crate::model::*;
use crate::observability::{BLOCKS_ADDED_TOTAL, BLOCKS_REMOVED_TOTAL};
use crate::store::{RestrictionStore, StoreError};

use super::snapshot::{build_calendar, month_window, CalendarSnapshot};
use super::token::{parse_add_field, remove_field, ADD_PREFIX};
use super::BookingError;

/// A posted calendar form, decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarForm {
    pub year: i32,
    pub month: u32,
    /// Version of the snapshot the form was rendered from, if sent.
    pub version: Option<u32>,
    /// Names of fields posted with a non-empty value.
    present: HashSet<String>,
    /// Requested new blocks, in form order, one per distinct field name.
    pub additions: Vec<(RoomId, NaiveDate)>,
}

impl CalendarForm {
    pub fn parse(fields: &[(String, String)]) -> Result<Self, BookingError> {
        if fields.len() > MAX_FORM_FIELDS {
            return Err(BookingError::Validation("too many form fields".into()));
        }
        let year: i32 = field(fields, "y")
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| BookingError::Validation("missing or invalid year".into()))?;
        let month: u32 = field(fields, "m")
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| BookingError::Validation("missing or invalid month".into()))?;
        month_window(year, month)?;
        let version = match field(fields, "v") {
            None | Some("") => None,
            Some(v) => Some(v.parse().map_err(|_| {
                BookingError::Validation("invalid calendar version".into())
            })?),
        };

        let mut present = HashSet::new();
        let mut seen_adds = HashSet::new();
        let mut additions = Vec::new();
        for (name, v) in fields {
            if !v.is_empty() {
                present.insert(name.clone());
            }
            if name.starts_with(ADD_PREFIX) && seen_adds.insert(name.as_str()) {
                let addition = parse_add_field(name).ok_or_else(|| {
                    BookingError::Validation(format!("malformed calendar field {name}"))
                })?;
                additions.push(addition);
            }
        }

        Ok(Self {
            year,
            month,
            version,
            present,
            additions,
        })
    }

    pub fn has(&self, name: &str) -> bool {
        self.present.contains(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Skip an addition when the store already holds a block for that room
    /// and day.
    pub dedupe_additions: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub removed: Vec<RestrictionId>,
    pub added: Vec<Restriction>,
    /// Additions skipped as duplicates (only with `dedupe_additions`).
    pub skipped: Vec<(RoomId, NaiveDate)>,
    /// Fresh baseline for the same month, superseding the one passed in.
    pub snapshot: CalendarSnapshot,
}

/// Apply an admin's calendar edits against the baseline they were shown.
///
/// Phase one walks every room's baseline blocks and deletes each one whose
/// `remove_block_` field is absent from the form. Phase two then inserts one
/// block per `add_block_` field. Input is validated before either phase runs.
pub async fn reconcile(
    store: &dyn RestrictionStore,
    baseline: &CalendarSnapshot,
    form: &CalendarForm,
    options: ReconcileOptions,
) -> Result<Reconciliation, BookingError> {
    if (form.year, form.month) != (baseline.year, baseline.month)
        || form.version.is_some_and(|v| v != baseline.version)
    {
        return Err(BookingError::StaleSnapshot);
    }
    if let Some((room_id, _)) = form
        .additions
        .iter()
        .find(|(room_id, _)| baseline.room(*room_id).is_none())
    {
        return Err(BookingError::Validation(format!("unknown room {room_id}")));
    }

    let mut removed = Vec::new();
    for month in &baseline.rooms {
        for (day, block_id) in month.blocks() {
            if form.has(&remove_field(month.room.id, day)) {
                continue;
            }
            match store.delete_restriction(block_id).await {
                Ok(()) => removed.push(block_id),
                Err(StoreError::NotFound(_)) => {
                    debug!("block {block_id} already gone");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
    metrics::counter!(BLOCKS_REMOVED_TOTAL).increment(removed.len() as u64);

    let mut added = Vec::new();
    let mut skipped = Vec::new();
    let mut pending = HashSet::new();
    for &(room_id, day) in &form.additions {
        if options.dedupe_additions
            && (!pending.insert((room_id, day)) || has_block(store, room_id, day).await?)
        {
            skipped.push((room_id, day));
            continue;
        }
        added.push(store.add_block(room_id, day).await?);
    }
    metrics::counter!(BLOCKS_ADDED_TOTAL).increment(added.len() as u64);

    info!(
        year = form.year,
        month = form.month,
        removed = removed.len(),
        added = added.len(),
        skipped = skipped.len(),
        "calendar reconciled"
    );

    let snapshot = build_calendar(store, form.year, form.month).await?;
    Ok(Reconciliation {
        removed,
        added,
        skipped,
        snapshot,
    })
}

fn field<'a>(fields: &'a [(String, String)], key: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(name, _)| name == key)
        .map(|(_, v)| v.trim())
}

async fn has_block(
    store: &dyn RestrictionStore,
    room_id: RoomId,
    day: NaiveDate,
) -> Result<bool, StoreError> {
    let existing = store
        .restrictions_for_room(room_id, DateRange::day(day))
        .await?;
    Ok(existing
        .iter()
        .any(|r| r.is_block() && r.range.start == day))
}
