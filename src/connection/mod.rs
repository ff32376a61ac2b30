//! Connections: calling a request handler from application code.
//!
//! # Data Flow
//! ```text
//! caller
//!     → conn.read(ctx, request).await                 (inline)
//!     → conn.read_async(ctx, request) → RequestHandle (own task)
//!         → handle.get().await | handle.wait() | handle.cancel()
//!     → conn.query_async(ctx, request, results)
//!         → results.handle_resource(r)*  then  handle_result | handle_error
//! ```
//!
//! # Design Decisions
//! - Blocking waits park only the calling thread and surface timeouts and
//!   cancellation as ServiceUnavailable
//! - A handle settles once; `cancel` reports whether it won the race

pub mod handle;
pub mod internal;

use std::sync::Arc;

use crate::error::ResourceError;
use crate::handler::RequestHandler;
use crate::response::{QueryResponse, ResourceResponse};

pub use handle::{HandleState, RequestHandle};
pub use internal::InternalConnection;

/// Receives the results of an asynchronous query.
pub trait QueryResultHandler: Send {
    /// Return `false` to stop receiving resources.
    fn handle_resource(&mut self, resource: ResourceResponse) -> bool;

    fn handle_result(&mut self, result: QueryResponse);

    fn handle_error(&mut self, error: ResourceError);
}

/// Connection sending requests directly to `handler`.
pub fn new_internal_connection<H>(handler: H) -> InternalConnection
where
    H: RequestHandler + 'static,
{
    InternalConnection::new(Arc::new(handler))
}
