//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (resource path, requested version)
//!     → router.rs (evaluate every route's matcher)
//!     → matcher.rs (URI template or API version match)
//!     → best match: decorate context, rewrite path to remainder, forward
//!     → no match: default route, else NotFound
//!
//! Route Registration (any time):
//!     add_route / remove_route
//!     → copy-on-write of the route table
//!     → in-flight lookups keep the snapshot they loaded
//! ```
//!
//! # Design Decisions
//! - Routes are mutable at runtime; lookups are lock-free snapshots
//! - URI templates compile to case-insensitive regexes once, at registration
//! - Deterministic: the most specific match wins regardless of
//!   registration order; ties are configuration errors
//! - Version routes share one default behaviour per router

pub mod matcher;
pub mod router;
pub mod version;
pub mod version_router;

pub use matcher::{
    ApiVersionRouteMatcher, IncomparableRouteMatch, RouteMatch, RouteMatcher, RoutingMode,
    UriRouteMatcher,
};
pub use router::Router;
pub use version::Version;
pub use version_router::{DefaultVersionBehaviour, VersionBehaviour, VersionRouter};
