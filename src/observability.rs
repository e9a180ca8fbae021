use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: HTTP requests served. Labels: route, status.
pub const HTTP_REQUESTS_TOTAL: &str = "innkeep_http_requests_total";

/// Histogram: HTTP request latency in seconds. Labels: route.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "innkeep_http_request_duration_seconds";

/// Counter: single-room availability checks. Labels: result.
pub const AVAILABILITY_CHECKS_TOTAL: &str = "innkeep_availability_checks_total";

/// Counter: availability checks answered "unavailable" because the store failed.
pub const AVAILABILITY_FAILURES_TOTAL: &str = "innkeep_availability_failures_total";

/// Counter: booking attempts. Labels: status (created, conflict, error).
pub const BOOKINGS_TOTAL: &str = "innkeep_bookings_total";

/// Counter: manual blocks inserted by calendar reconciliation.
pub const BLOCKS_ADDED_TOTAL: &str = "innkeep_blocks_added_total";

/// Counter: manual blocks deleted by calendar reconciliation.
pub const BLOCKS_REMOVED_TOTAL: &str = "innkeep_blocks_removed_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: rooms loaded in the store.
pub const ROOMS_ACTIVE: &str = "innkeep_rooms_active";

/// Gauge: live admin sessions.
pub const SESSIONS_ACTIVE: &str = "innkeep_sessions_active";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "innkeep_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "innkeep_wal_flush_batch_size";

/// Counter: WAL compactions. Labels: status.
pub const WAL_COMPACTIONS_TOTAL: &str = "innkeep_wal_compactions_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Collapse a request path onto its route so ids don't explode label cardinality.
pub fn route_label(path: &str) -> &'static str {
    let mut segments = path.trim_start_matches('/').split('/');
    match (segments.next(), segments.next()) {
        (Some("search-availability-json"), _) => "search_availability_json",
        (Some("search-availability"), _) => "search_availability",
        (Some("make-reservation"), _) => "make_reservation",
        (Some("admin"), Some("reservations-new")) => "admin_reservations_new",
        (Some("admin"), Some("reservations-all")) => "admin_reservations_all",
        (Some("admin"), Some("reservations")) => "admin_reservation",
        (Some("admin"), Some("process-reservation")) => "admin_process_reservation",
        (Some("admin"), Some("delete-reservation")) => "admin_delete_reservation",
        (Some("admin"), Some("reservations-calendar")) => "admin_calendar",
        _ => "other",
    }
}
