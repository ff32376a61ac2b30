//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Router, filters, connections produce:
//!     → logging.rs (subscriber setup for structured log events)
//!     → metrics.rs (request counters, latency histograms, route gauge)
//!     → tracing.rs (one span per request, keyed by the root context id)
//!
//! Consumers:
//!     → stderr (pretty or JSON lines)
//!     → whatever `metrics` recorder the embedding application installs
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - The library never installs a metrics exporter; the facade is a no-op
//!   until the application does
//! - Request id from the root context flows through every span

pub mod logging;
pub mod metrics;
pub mod tracing;
