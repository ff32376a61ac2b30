//! Resource error taxonomy.
//!
//! Every failure that crosses a [`RequestHandler`](crate::handler::RequestHandler)
//! boundary is a [`ResourceError`]. Codes mirror HTTP status semantics but
//! nothing here depends on a transport.

use serde_json::{json, Value};
use thiserror::Error;

/// Errors returned by request handlers, filters, and routers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResourceError {
    /// Malformed input, conflicting parameters, unparseable expressions.
    #[error("Bad Request: {0}")]
    BadRequest(String),

    /// The caller may not perform the operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// No route, resource, or version matched.
    #[error("Not Found: {0}")]
    NotFound(String),

    /// The request conflicts with the current resource state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Revision mismatch or duplicate resource id.
    #[error("Precondition Failed: {0}")]
    PreconditionFailed(String),

    /// A revision was required but not supplied.
    #[error("Precondition Required: {0}")]
    PreconditionRequired(String),

    /// Unexpected failure, including route-table configuration defects.
    #[error("Internal Server Error: {0}")]
    InternalServerError(String),

    /// The operation is not available for this resource shape.
    #[error("Not Supported: {0}")]
    NotSupported(String),

    /// Transient failure; safe to retry.
    #[error("Service Unavailable: {0}")]
    ServiceUnavailable(String),

    /// Any other status-equivalent code.
    #[error("{reason}: {message}")]
    Other {
        code: u16,
        reason: String,
        message: String,
        detail: Option<Value>,
    },
}

/// Result type for resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;

impl ResourceError {
    pub const BAD_REQUEST: u16 = 400;
    pub const FORBIDDEN: u16 = 403;
    pub const NOT_FOUND: u16 = 404;
    pub const CONFLICT: u16 = 409;
    pub const PRECONDITION_FAILED: u16 = 412;
    pub const PRECONDITION_REQUIRED: u16 = 428;
    pub const INTERNAL_ERROR: u16 = 500;
    pub const NOT_SUPPORTED: u16 = 501;
    pub const UNAVAILABLE: u16 = 503;

    /// Build the error matching a status-equivalent code.
    pub fn from_code(code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            Self::BAD_REQUEST => Self::BadRequest(message),
            Self::FORBIDDEN => Self::Forbidden(message),
            Self::NOT_FOUND => Self::NotFound(message),
            Self::CONFLICT => Self::Conflict(message),
            Self::PRECONDITION_FAILED => Self::PreconditionFailed(message),
            Self::PRECONDITION_REQUIRED => Self::PreconditionRequired(message),
            Self::INTERNAL_ERROR => Self::InternalServerError(message),
            Self::NOT_SUPPORTED => Self::NotSupported(message),
            Self::UNAVAILABLE => Self::ServiceUnavailable(message),
            _ => Self::Other {
                code,
                reason: reason_phrase(code).to_string(),
                message,
                detail: None,
            },
        }
    }

    /// Status-equivalent code.
    pub fn code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => Self::BAD_REQUEST,
            Self::Forbidden(_) => Self::FORBIDDEN,
            Self::NotFound(_) => Self::NOT_FOUND,
            Self::Conflict(_) => Self::CONFLICT,
            Self::PreconditionFailed(_) => Self::PRECONDITION_FAILED,
            Self::PreconditionRequired(_) => Self::PRECONDITION_REQUIRED,
            Self::InternalServerError(_) => Self::INTERNAL_ERROR,
            Self::NotSupported(_) => Self::NOT_SUPPORTED,
            Self::ServiceUnavailable(_) => Self::UNAVAILABLE,
            Self::Other { code, .. } => *code,
        }
    }

    /// Human-readable message without the reason prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest(m)
            | Self::Forbidden(m)
            | Self::NotFound(m)
            | Self::Conflict(m)
            | Self::PreconditionFailed(m)
            | Self::PreconditionRequired(m)
            | Self::InternalServerError(m)
            | Self::NotSupported(m)
            | Self::ServiceUnavailable(m) => m,
            Self::Other { message, .. } => message,
        }
    }

    /// Short reason phrase for the code.
    pub fn reason(&self) -> &str {
        match self {
            Self::Other { reason, .. } => reason,
            other => reason_phrase(other.code()),
        }
    }

    /// Transient failures that a caller may safely retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self.code(), 408 | 503 | 504)
    }

    pub fn is_server_error(&self) -> bool {
        self.code() >= 500
    }

    /// Attach provider-specific detail. Errors of a named kind are
    /// converted to the `Other` form so the detail can travel with them.
    pub fn with_detail(self, detail: Value) -> Self {
        Self::Other {
            code: self.code(),
            reason: self.reason().to_string(),
            message: self.message().to_string(),
            detail: Some(detail),
        }
    }

    pub fn detail(&self) -> Option<&Value> {
        match self {
            Self::Other { detail, .. } => detail.as_ref(),
            _ => None,
        }
    }

    /// JSON form rendered by protocol adapters.
    pub fn to_json(&self) -> Value {
        let mut value = json!({
            "code": self.code(),
            "reason": self.reason(),
            "message": self.message(),
        });
        if let Some(detail) = self.detail() {
            value["detail"] = detail.clone();
        }
        value
    }
}

fn reason_phrase(code: u16) -> &'static str {
    match code {
        400 => "Bad Request",
        401 => "Unauthorized",
        402 => "Payment Required",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        407 => "Proxy Authentication Required",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        412 => "Precondition Failed",
        413 => "Request Entity Too Large",
        414 => "Request-URI Too Large",
        415 => "Unsupported Media Type",
        416 => "Requested Range Not Satisfiable",
        417 => "Expectation Failed",
        428 => "Precondition Required",
        500 => "Internal Server Error",
        501 => "Not Supported",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        505 => "HTTP Version Not Supported",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_code_round_trips_known_codes() {
        for code in [400, 403, 404, 409, 412, 428, 500, 501, 503] {
            let err = ResourceError::from_code(code, "boom");
            assert_eq!(err.code(), code);
            assert!(!matches!(err, ResourceError::Other { .. }));
        }
    }

    #[test]
    fn test_unknown_code_keeps_reason() {
        let err = ResourceError::from_code(410, "gone away");
        assert_eq!(err.code(), 410);
        assert_eq!(err.reason(), "Gone");
        assert_eq!(err.message(), "gone away");
    }

    #[test]
    fn test_retryable() {
        assert!(ResourceError::ServiceUnavailable("x".into()).is_retryable());
        assert!(ResourceError::from_code(504, "x").is_retryable());
        assert!(!ResourceError::NotFound("x".into()).is_retryable());
    }

    #[test]
    fn test_detail_survives_json() {
        let err = ResourceError::Conflict("busy".into()).with_detail(json!({"field": "/name"}));
        assert_eq!(err.code(), 409);
        let rendered = err.to_json();
        assert_eq!(rendered["reason"], "Conflict");
        assert_eq!(rendered["detail"]["field"], "/name");
    }
}
