//! Request spans.
//!
//! # Responsibilities
//! - Create one span per request with its type, path and request id
//! - Record the outcome on the span once the request completes
//!
//! Query spans also carry the number of resources streamed.

use tracing::{field, Span};

use crate::context::Context;
use crate::error::ResourceResult;
use crate::request::ResourceRequest;

/// Span covering the processing of `request`.
pub fn request_span(context: &Context, request: &dyn ResourceRequest) -> Span {
    tracing::info_span!(
        "request",
        request_id = context.id().unwrap_or("-"),
        request_type = %request.request_type(),
        resource_path = %request.resource_path(),
        code = field::Empty,
        latency_ms = field::Empty,
        streamed = field::Empty,
    )
}

/// Record `result` on `span`; returns the status-equivalent code.
pub fn record_outcome<T>(span: &Span, result: &ResourceResult<T>, latency_ms: u128) -> u16 {
    let code = match result {
        Ok(_) => 200,
        Err(e) => e.code(),
    };
    span.record("code", code);
    span.record("latency_ms", latency_ms as u64);
    code
}
