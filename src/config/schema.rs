//! Configuration types.
//!
//! Every section and field has a default, so an empty file is a valid
//! configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::routing::DefaultVersionBehaviour;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CrestConfig {
    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Version routing defaults.
    pub versioning: VersioningConfig,

    /// In-process connection settings.
    pub connection: ConnectionConfig,

    /// In-memory backend settings.
    pub backend: BackendConfig,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging and metrics.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level or `EnvFilter` directive (e.g. "info,crest_router=debug").
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Record request and routing metrics.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
        }
    }
}

/// Version routing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VersioningConfig {
    /// Version selected when a request names none.
    pub default_behaviour: DefaultVersionBehaviour,

    /// Warn when a request names no version.
    pub warning_enabled: bool,
}

impl Default for VersioningConfig {
    fn default() -> Self {
        Self {
            default_behaviour: DefaultVersionBehaviour::Latest,
            warning_enabled: true,
        }
    }
}

/// In-process connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Upper bound for blocking waits in milliseconds. 0 means unbounded.
    pub wait_timeout_ms: u64,
}

impl ConnectionConfig {
    pub fn wait_timeout(&self) -> Option<Duration> {
        (self.wait_timeout_ms > 0).then(|| Duration::from_millis(self.wait_timeout_ms))
    }
}

/// In-memory backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BackendConfig {
    /// Largest page a query may request. 0 means unlimited.
    pub page_size_limit: usize,
}
