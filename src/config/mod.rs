//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → CrestConfig (validated, immutable)
//!     → logging init, version routers, connections, memory backends
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BackendConfig, ConnectionConfig, CrestConfig, LogFormat, ObservabilityConfig,
    VersioningConfig,
};
pub use validation::{validate_config, ValidationError};
