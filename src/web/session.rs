//! Per-session state: the cached calendar baseline and one-shot notices.

use std::time::Instant;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use dashmap::DashMap;
use serde::Serialize;

use crate::booking::CalendarSnapshot;
use crate::limits::{MAX_SESSIONS, MAX_SESSION_ID_LEN, SESSION_IDLE_TIMEOUT};
use crate::observability::SESSIONS_ACTIVE;

use super::error::WebError;

pub const SESSION_HEADER: &str = "x-session-id";

/// Session key taken from the `x-session-id` header.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for SessionId {
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty() && id.len() <= MAX_SESSION_ID_LEN)
            .map(|id| SessionId(id.to_string()))
            .ok_or(WebError::MissingSession)
    }
}

/// Transient messages shown once on the next admin page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Notices {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug)]
struct Session {
    calendar: Option<CalendarSnapshot>,
    notices: Notices,
    touched: Instant,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            calendar: None,
            notices: Notices::default(),
            touched: Instant::now(),
        }
    }
}

/// Sessions keyed by id. At capacity, idle sessions are swept first, then
/// the least recently touched one makes room for a new id.
pub struct SessionStore {
    sessions: DashMap<String, Session>,
    capacity: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_capacity(MAX_SESSIONS)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Returns whether the session is held after the write.
    fn update(&self, id: &SessionId, f: impl FnOnce(&mut Session)) -> bool {
        if !self.sessions.contains_key(&id.0) {
            self.make_room();
        }
        {
            let mut session = self.sessions.entry(id.0.clone()).or_default();
            session.touched = Instant::now();
            f(&mut session);
        }
        metrics::gauge!(SESSIONS_ACTIVE).set(self.sessions.len() as f64);
        self.sessions.contains_key(&id.0)
    }

    fn make_room(&self) {
        if self.sessions.len() < self.capacity {
            return;
        }
        self.sessions
            .retain(|_, s| s.touched.elapsed() < SESSION_IDLE_TIMEOUT);
        while self.sessions.len() >= self.capacity {
            let oldest = self
                .sessions
                .iter()
                .min_by_key(|e| e.value().touched)
                .map(|e| e.key().clone());
            let Some(oldest) = oldest else { break };
            self.sessions.remove(&oldest);
            tracing::debug!("session table full, evicted least recently used session");
        }
    }

    /// Cache the baseline the admin is about to edit, replacing any older one.
    pub fn put_calendar(&self, id: &SessionId, snapshot: CalendarSnapshot) -> Result<(), WebError> {
        if self.update(id, |s| s.calendar = Some(snapshot)) {
            Ok(())
        } else {
            tracing::warn!("calendar baseline could not be cached");
            Err(WebError::Unavailable("session could not be stored".into()))
        }
    }

    pub fn calendar(&self, id: &SessionId) -> Option<CalendarSnapshot> {
        self.sessions.get_mut(&id.0).and_then(|mut s| {
            s.touched = Instant::now();
            s.calendar.clone()
        })
    }

    pub fn flash(&self, id: &SessionId, message: impl Into<String>) {
        let message = message.into();
        self.update(id, |s| s.notices.flash = Some(message));
    }

    pub fn error(&self, id: &SessionId, message: impl Into<String>) {
        let message = message.into();
        self.update(id, |s| s.notices.error = Some(message));
    }

    /// Notices pending for the session; reading clears them.
    pub fn take_notices(&self, id: &SessionId) -> Notices {
        self.sessions
            .get_mut(&id.0)
            .map(|mut s| std::mem::take(&mut s.notices))
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
