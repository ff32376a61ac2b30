//! Resource providers and the adapters that mount them.
//!
//! # Data Flow
//! ```text
//! Router
//!     → "users"  (starts-with) → new_collection(provider)
//!         → ""     → collection-level provider methods
//!         → "{id}" → InstanceIdContext pushed → instance-level provider methods
//!     → "config" (equals)      → new_singleton(provider)
//! ```
//!
//! # Responsibilities
//! - Adapt provider traits to [`RequestHandler`](crate::handler::RequestHandler)
//! - Reject operations that make no sense at a level with BadRequest
//! - Apply field selection to every returned resource
//! - Offer a closure-based handler and an in-memory collection

pub mod collection;
pub mod memory;
pub mod provider;
pub mod registered;
pub mod singleton;

pub use collection::{new_collection, InstanceIdContext};
pub use memory::MemoryBackend;
pub use provider::{CollectionResourceProvider, SingletonResourceProvider};
pub use registered::{QueryOutcome, RegisteredHandler, RegisteredHandlerBuilder};
pub use singleton::{new_singleton, SingletonHandler};
