//! Metrics collection.
//!
//! # Responsibilities
//! - Define request and routing metrics
//! - Record through the `metrics` facade
//!
//! # Metrics
//! - `crest_requests_total` (counter): requests by type, code
//! - `crest_request_duration_seconds` (histogram): latency by type
//! - `crest_routes` (gauge): routes in the most recently mutated router
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Recording can be switched off from configuration

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::request::RequestType;

static ENABLED: AtomicBool = AtomicBool::new(true);

/// Turn recording on or off process-wide.
pub fn set_enabled(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
}

pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// Record a completed request. `code` is 200 for success.
pub fn record_request(request_type: RequestType, code: u16, start: Instant) {
    if !is_enabled() {
        return;
    }
    let kind = request_type.as_str();
    metrics::counter!(
        "crest_requests_total",
        "type" => kind,
        "code" => code.to_string()
    )
    .increment(1);
    metrics::histogram!("crest_request_duration_seconds", "type" => kind)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_route_count(routes: usize) {
    if !is_enabled() {
        return;
    }
    metrics::gauge!("crest_routes").set(routes as f64);
}
