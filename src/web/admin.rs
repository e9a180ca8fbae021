use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Form, Json};
use chrono::{Datelike, Utc};
use ulid::Ulid;

use crate::booking::{self, BookingError, CalendarForm};
use crate::model::*;

use super::error::{WebError, WebResult};
use super::forms::*;
use super::session::{Notices, SessionId};
use super::views::*;
use super::AppState;

/// The list a reservation page was opened from.
fn parse_src(src: &str) -> WebResult<&'static str> {
    match src {
        "new" => Ok("new"),
        "all" => Ok("all"),
        "cal" => Ok("cal"),
        other => Err(WebError::NotFound(format!("unknown reservation list {other:?}"))),
    }
}

fn parse_reservation_id(id: &str) -> WebResult<ReservationId> {
    Ulid::from_string(id).map_err(|_| WebError::BadRequest(format!("bad reservation id {id:?}")))
}

fn calendar_url(year: i32, month: u32) -> String {
    format!("/admin/reservations-calendar?y={year}&m={month}")
}

/// Back to the calendar month the admin came from, or else to the list.
fn back_to(src: &str, year: &str, month: &str) -> Redirect {
    match (year.trim().parse::<i32>(), month.trim().parse::<u32>()) {
        (Ok(y), Ok(m)) => Redirect::to(&calendar_url(y, m)),
        _ if src == "cal" => Redirect::to("/admin/reservations-calendar"),
        _ => Redirect::to(&format!("/admin/reservations-{src}")),
    }
}

fn notices(state: &AppState, session: Option<&SessionId>) -> Notices {
    session
        .map(|id| state.sessions.take_notices(id))
        .unwrap_or_default()
}

async fn list(
    state: &AppState,
    session: Option<&SessionId>,
    filter: ReservationFilter,
) -> WebResult<Json<ReservationsView>> {
    let reservations = state.store.reservations(filter).await?;
    Ok(Json(ReservationsView {
        reservations: reservations.iter().map(ReservationRow::from).collect(),
        notices: notices(state, session),
    }))
}

pub async fn reservations_new(
    State(state): State<AppState>,
    session: Option<SessionId>,
) -> WebResult<Json<ReservationsView>> {
    list(&state, session.as_ref(), ReservationFilter::Unprocessed).await
}

pub async fn reservations_all(
    State(state): State<AppState>,
    session: Option<SessionId>,
) -> WebResult<Json<ReservationsView>> {
    list(&state, session.as_ref(), ReservationFilter::All).await
}

pub async fn show_reservation(
    State(state): State<AppState>,
    session: Option<SessionId>,
    Path((src, id)): Path<(String, String)>,
    Query(back): Query<ReturnTo>,
) -> WebResult<Json<AdminReservationView>> {
    let src = parse_src(&src)?;
    let reservation = state.store.reservation(parse_reservation_id(&id)?).await?;
    let room = state.store.room(reservation.room_id).await?;
    let non_empty = |s: String| Some(s).filter(|s| !s.trim().is_empty());
    Ok(Json(AdminReservationView {
        src: src.to_string(),
        reservation,
        room_name: room.name,
        year: non_empty(back.y),
        month: non_empty(back.m),
        notices: notices(&state, session.as_ref()),
    }))
}

pub async fn update_reservation(
    State(state): State<AppState>,
    session: Option<SessionId>,
    Path((src, id)): Path<(String, String)>,
    Form(form): Form<AdminReservationForm>,
) -> WebResult<Redirect> {
    let src = parse_src(&src)?;
    let id = parse_reservation_id(&id)?;
    let guest = form.guest.validate().map_err(WebError::Invalid)?;
    state.store.update_guest(id, guest).await?;
    if let Some(session) = &session {
        state.sessions.flash(session, "Changes saved");
    }
    Ok(back_to(src, &form.year, &form.month))
}

pub async fn process_reservation(
    State(state): State<AppState>,
    session: Option<SessionId>,
    Path((src, id)): Path<(String, String)>,
    Query(back): Query<ReturnTo>,
) -> WebResult<Redirect> {
    let src = parse_src(&src)?;
    state
        .store
        .set_processed(parse_reservation_id(&id)?, true)
        .await?;
    if let Some(session) = &session {
        state.sessions.flash(session, "Reservation marked as processed");
    }
    Ok(back_to(src, &back.y, &back.m))
}

pub async fn delete_reservation(
    State(state): State<AppState>,
    session: Option<SessionId>,
    Path((src, id)): Path<(String, String)>,
    Query(back): Query<ReturnTo>,
) -> WebResult<Redirect> {
    let src = parse_src(&src)?;
    state
        .store
        .delete_reservation(parse_reservation_id(&id)?)
        .await?;
    if let Some(session) = &session {
        state.sessions.flash(session, "Reservation deleted");
    }
    Ok(back_to(src, &back.y, &back.m))
}

/// Build the month's calendar, cache it as the session's baseline, and
/// return it. Defaults to the current month.
pub async fn calendar(
    State(state): State<AppState>,
    session: SessionId,
    Query(query): Query<CalendarQuery>,
) -> WebResult<Json<CalendarView>> {
    let today = Utc::now().date_naive();
    let (year, month) = match (query.y, query.m) {
        (Some(y), Some(m)) => (y, m),
        _ => (today.year(), today.month()),
    };
    let snapshot = booking::build_calendar(state.store.as_ref(), year, month).await?;
    let view = CalendarView::new(&snapshot, state.sessions.take_notices(&session))?;
    state.sessions.put_calendar(&session, snapshot)?;
    Ok(Json(view))
}

/// Reconcile the posted calendar against the session's baseline.
pub async fn post_calendar(
    State(state): State<AppState>,
    session: SessionId,
    Form(fields): Form<Vec<(String, String)>>,
) -> WebResult<Response> {
    let baseline = state
        .sessions
        .calendar(&session)
        .ok_or(WebError::NoCalendar)?;
    let back = Redirect::to(&calendar_url(baseline.year, baseline.month));

    let form = match CalendarForm::parse(&fields) {
        Ok(form) => form,
        Err(e) => {
            state.sessions.error(&session, e.to_string());
            return Ok(back.into_response());
        }
    };

    match booking::reconcile(state.store.as_ref(), &baseline, &form, state.reconcile).await {
        Ok(done) => {
            state.sessions.put_calendar(&session, done.snapshot)?;
            state.sessions.flash(&session, "Changes saved");
            Ok(back.into_response())
        }
        Err(e @ (BookingError::Validation(_) | BookingError::StaleSnapshot)) => {
            state.sessions.error(&session, e.to_string());
            Ok(back.into_response())
        }
        Err(BookingError::Store(e)) => {
            state.sessions.error(&session, "Changes could not be saved");
            Err(e.into())
        }
    }
}
