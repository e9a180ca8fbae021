use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Form, Json};
use chrono::NaiveDate;

use crate::booking::{self, BookingError, BookingRequest};
use crate::model::RoomId;

use super::error::{WebError, WebResult};
use super::forms::*;
use super::session::SessionId;
use super::views::*;
use super::AppState;

fn parse_stay(start: &str, end: &str) -> Result<(NaiveDate, NaiveDate), String> {
    let start = parse_date("start date", start)?;
    let end = parse_date("end date", end)?;
    if end <= start {
        return Err("departure must be after arrival".into());
    }
    Ok((start, end))
}

/// Single-room availability. Never fails: bad input and store trouble both
/// come back as `ok: false`.
pub async fn availability_json(
    State(state): State<AppState>,
    Form(form): Form<AvailabilityJsonForm>,
) -> Json<AvailabilityJson> {
    let parsed = parse_stay(&form.start_date, &form.end_date)
        .and_then(|stay| Ok((stay, parse_room_id(&form.room_id)?)));
    let ((start, end), room_id) = match parsed {
        Ok(parsed) => parsed,
        Err(message) => {
            return Json(AvailabilityJson {
                ok: false,
                message,
                room_id: form.room_id,
                start_date: form.start_date,
                end_date: form.end_date,
            });
        }
    };

    let ok = booking::is_room_available(state.store.as_ref(), room_id, start, end).await;
    Json(AvailabilityJson {
        ok,
        message: String::new(),
        room_id: room_id.to_string(),
        start_date: form.start_date,
        end_date: form.end_date,
    })
}

/// Leave an error notice on the session, if there is one, and go back to the
/// search page.
fn back_to_search(state: &AppState, session: Option<&SessionId>, message: &str) -> Response {
    if let Some(id) = session {
        state.sessions.error(id, message);
    }
    Redirect::to("/search-availability").into_response()
}

pub async fn search_page(
    State(state): State<AppState>,
    session: Option<SessionId>,
) -> Json<SearchView> {
    let notices = session
        .map(|id| state.sessions.take_notices(&id))
        .unwrap_or_default();
    Json(SearchView { notices })
}

pub async fn search_availability(
    State(state): State<AppState>,
    session: Option<SessionId>,
    Form(form): Form<SearchForm>,
) -> Response {
    let (start, end) = match parse_stay(&form.start, &form.end) {
        Ok(stay) => stay,
        Err(message) => return back_to_search(&state, session.as_ref(), &message),
    };
    match booking::search_available_rooms(state.store.as_ref(), start, end).await {
        Ok(rooms) if rooms.is_empty() => back_to_search(&state, session.as_ref(), "No Availability"),
        Ok(rooms) => Json(ChooseRoomView {
            start_date: start,
            end_date: end,
            rooms,
        })
        .into_response(),
        Err(BookingError::Validation(message)) => back_to_search(&state, session.as_ref(), &message),
        Err(e) => {
            tracing::warn!("room search failed: {e}");
            back_to_search(&state, session.as_ref(), "error while finding available rooms")
        }
    }
}

pub async fn make_reservation(
    State(state): State<AppState>,
    Form(form): Form<ReservationForm>,
) -> WebResult<impl IntoResponse> {
    let mut errors = FormErrors::default();
    let room_id: Option<RoomId> = parse_room_id(&form.room_id)
        .map_err(|e| errors.add("room_id", e))
        .ok();
    let start = parse_date("start date", &form.start_date)
        .map_err(|e| errors.add("start_date", e))
        .ok();
    let end = parse_date("end date", &form.end_date)
        .map_err(|e| errors.add("end_date", e))
        .ok();
    if let (Some(start), Some(end)) = (start, end)
        && end <= start
    {
        errors.add("end_date", "departure must be after arrival");
    }
    let guest = match form.guest.validate() {
        Ok(guest) => Some(guest),
        Err(guest_errors) => {
            errors.merge(guest_errors);
            None
        }
    };
    let (Some(room_id), Some(start), Some(end), Some(guest)) = (room_id, start, end, guest) else {
        return Err(WebError::Invalid(errors));
    };
    if !errors.is_empty() {
        return Err(WebError::Invalid(errors));
    }

    let room = state.store.room(room_id).await?;
    let id = booking::create_booking(
        state.store.as_ref(),
        BookingRequest {
            guest,
            room_id,
            start,
            end,
        },
    )
    .await?;
    let reservation = state.store.reservation(id).await?;
    Ok((
        StatusCode::CREATED,
        Json(ReservationSummaryView {
            reservation,
            room_name: room.name,
        }),
    ))
}
