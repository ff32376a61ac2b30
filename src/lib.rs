//! Crest: a resource-oriented request router.
//!
//! Typed CRUDPAQ requests (create, read, update, delete, patch, action,
//! query) are dispatched through nestable routers, filter chains and
//! version routers to resource providers.

// Request model
pub mod context;
pub mod error;
pub mod json;
pub mod path;
pub mod request;
pub mod response;

// Dispatch
pub mod filter;
pub mod handler;
pub mod resources;
pub mod routing;

// Callers
pub mod connection;

// Cross-cutting concerns
pub mod config;
pub mod observability;

pub use connection::{new_internal_connection, InternalConnection, RequestHandle};
pub use context::Context;
pub use error::{ResourceError, ResourceResult};
pub use filter::{Filter, FilterChain};
pub use handler::{QueryResourceHandler, RequestHandler};
pub use path::ResourcePath;
pub use resources::{new_collection, new_singleton, MemoryBackend};
pub use routing::{Router, Version, VersionRouter};
