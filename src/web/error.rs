use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::booking::BookingError;
use crate::store::StoreError;

use super::forms::FormErrors;

#[derive(Debug)]
pub enum WebError {
    BadRequest(String),
    Invalid(FormErrors),
    NotFound(String),
    Conflict(String),
    MissingSession,
    /// The calendar was posted without a baseline from a prior view.
    NoCalendar,
    Unavailable(String),
    Timeout,
}

impl std::fmt::Display for WebError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WebError::BadRequest(msg) => write!(f, "{msg}"),
            WebError::Invalid(_) => write!(f, "form has errors"),
            WebError::NotFound(what) => write!(f, "{what}"),
            WebError::Conflict(msg) => write!(f, "{msg}"),
            WebError::MissingSession => write!(f, "missing x-session-id header"),
            WebError::NoCalendar => write!(f, "no calendar in session; reload the calendar first"),
            WebError::Unavailable(msg) => write!(f, "store unavailable: {msg}"),
            WebError::Timeout => write!(f, "store timed out"),
        }
    }
}

impl std::error::Error for WebError {}

impl From<StoreError> for WebError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => WebError::NotFound(format!("{what} not found")),
            StoreError::Conflict(_) => {
                WebError::Conflict("the room is not available for those dates".into())
            }
            StoreError::AlreadyExists(_) | StoreError::NotABlock(_) => WebError::Conflict(e.to_string()),
            StoreError::LimitExceeded(_) => WebError::BadRequest(e.to_string()),
            StoreError::Timeout(_) => WebError::Timeout,
            StoreError::Unavailable(msg) => WebError::Unavailable(msg),
        }
    }
}

impl From<BookingError> for WebError {
    fn from(e: BookingError) -> Self {
        match e {
            BookingError::Validation(msg) => WebError::BadRequest(msg),
            BookingError::StaleSnapshot => WebError::Conflict(e.to_string()),
            BookingError::Store(e) => e.into(),
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebError::BadRequest(_) | WebError::MissingSession | WebError::NoCalendar => {
                StatusCode::BAD_REQUEST
            }
            WebError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            WebError::NotFound(_) => StatusCode::NOT_FOUND,
            WebError::Conflict(_) => StatusCode::CONFLICT,
            WebError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            WebError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        };
        if status.is_server_error() {
            tracing::error!("request failed: {self}");
        }
        let body = match self {
            WebError::Invalid(errors) => json!({ "error": "form has errors", "errors": errors }),
            other => json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

pub type WebResult<T> = Result<T, WebError>;
