//! HTTP surface: public booking pages and the admin back office.

mod admin;
mod error;
mod forms;
mod public;
mod session;
mod views;

use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::booking::ReconcileOptions;
use crate::observability::{route_label, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS};
use crate::store::RestrictionStore;

pub use error::{WebError, WebResult};
pub use forms::FormErrors;
pub use session::{Notices, SessionId, SessionStore, SESSION_HEADER};
pub use views::*;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RestrictionStore>,
    pub sessions: Arc<SessionStore>,
    pub reconcile: ReconcileOptions,
}

impl AppState {
    pub fn new(store: Arc<dyn RestrictionStore>, reconcile: ReconcileOptions) -> Self {
        Self {
            store,
            sessions: Arc::new(SessionStore::new()),
            reconcile,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/reservations-new", get(admin::reservations_new))
        .route("/reservations-all", get(admin::reservations_all))
        .route(
            "/reservations/:src/:id",
            get(admin::show_reservation).post(admin::update_reservation),
        )
        .route("/process-reservation/:src/:id", post(admin::process_reservation))
        .route("/delete-reservation/:src/:id", post(admin::delete_reservation))
        .route(
            "/reservations-calendar",
            get(admin::calendar).post(admin::post_calendar),
        );

    Router::new()
        .route(
            "/search-availability",
            get(public::search_page).post(public::search_availability),
        )
        .route("/search-availability-json", post(public::availability_json))
        .route("/make-reservation", post(public::make_reservation))
        .nest("/admin", admin)
        .layer(middleware::from_fn(track_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn track_metrics(req: Request, next: Next) -> Response {
    let route = route_label(req.uri().path());
    let start = Instant::now();
    let response = next.run(req).await;
    metrics::histogram!(HTTP_REQUEST_DURATION_SECONDS, "route" => route)
        .record(start.elapsed().as_secs_f64());
    metrics::counter!(
        HTTP_REQUESTS_TOTAL,
        "route" => route,
        "status" => response.status().as_u16().to_string()
    )
    .increment(1);
    response
}
