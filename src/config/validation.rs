//! Semantic checks on a parsed configuration.
//!
//! Unknown enum values (log format, version behaviour) are already
//! rejected by serde. This pass checks what the types cannot express and
//! reports every failure at once.

use std::fmt;

use tracing_subscriber::EnvFilter;

use crate::config::schema::CrestConfig;

/// One failed check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// One hour.
const MAX_WAIT_TIMEOUT_MS: u64 = 3_600_000;

pub fn validate_config(config: &CrestConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let level = config.observability.log_level.trim();
    if level.is_empty() {
        errors.push(ValidationError::new("observability.log_level", "must not be empty"));
    } else if let Err(e) = EnvFilter::try_new(level) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("invalid directive '{level}': {e}"),
        ));
    }

    if config.connection.wait_timeout_ms > MAX_WAIT_TIMEOUT_MS {
        errors.push(ValidationError::new(
            "connection.wait_timeout_ms",
            format!("must be at most {MAX_WAIT_TIMEOUT_MS}"),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_config(&CrestConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = CrestConfig::default();
        config.observability.log_level = "crest_router=loud".to_string();
        config.connection.wait_timeout_ms = MAX_WAIT_TIMEOUT_MS + 1;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["observability.log_level", "connection.wait_timeout_ms"]);
    }

    #[test]
    fn test_empty_log_level_rejected() {
        let mut config = CrestConfig::default();
        config.observability.log_level = "  ".to_string();
        assert_eq!(validate_config(&config).unwrap_err().len(), 1);
    }
}
