//! Built-in context kinds.

use std::collections::HashMap;

use serde_json::{Map, Value};
use uuid::Uuid;

use super::{Context, ContextValue};
use crate::routing::Version;

/// Root of every request chain.
#[derive(Debug, Clone)]
pub struct RootContext {
    pub id: String,
}

impl RootContext {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl Default for RootContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextValue for RootContext {
    const KIND: &'static str = "root";
}

/// Pushed by a router when a URI route matched.
#[derive(Debug, Clone)]
pub struct UriRouterContext {
    /// URL-encoded part of the resource path consumed by the route.
    pub matched_uri: String,
    /// URL-encoded remainder forwarded to the route's handler.
    pub remaining_uri: String,
    /// Decoded template variables, e.g. `id` for `{id}`.
    pub uri_template_variables: HashMap<String, String>,
}

impl UriRouterContext {
    pub fn new(
        matched_uri: impl Into<String>,
        remaining_uri: impl Into<String>,
        uri_template_variables: HashMap<String, String>,
    ) -> Self {
        Self {
            matched_uri: matched_uri.into(),
            remaining_uri: remaining_uri.into(),
            uri_template_variables,
        }
    }

    pub fn variable(&self, name: &str) -> Option<&str> {
        self.uri_template_variables.get(name).map(String::as_str)
    }

    /// All matched prefixes in the chain, root first, joined with `/`.
    pub fn base_uri(ctx: &Context) -> String {
        let mut parts: Vec<&str> = ctx
            .get_all::<UriRouterContext>()
            .map(|c| c.matched_uri.as_str())
            .filter(|m| !m.is_empty())
            .collect();
        parts.reverse();
        parts.join("/")
    }
}

impl ContextValue for UriRouterContext {
    const KIND: &'static str = "router";
}

/// Versions requested by the caller, as parsed by a protocol adapter.
#[derive(Debug, Clone, Default)]
pub struct AcceptApiVersionContext {
    pub protocol_version: Option<Version>,
    pub resource_version: Option<Version>,
}

impl AcceptApiVersionContext {
    pub fn new(protocol_version: Option<Version>, resource_version: Option<Version>) -> Self {
        Self {
            protocol_version,
            resource_version,
        }
    }
}

impl ContextValue for AcceptApiVersionContext {
    const KIND: &'static str = "apiVersion";
}

/// Pushed by a version router once a resource version was selected.
#[derive(Debug, Clone)]
pub struct ApiVersionRouterContext {
    pub resource_version: Version,
    /// True when the version came from the default behaviour rather
    /// than from the request.
    pub defaulted: bool,
}

impl ContextValue for ApiVersionRouterContext {
    const KIND: &'static str = "apiVersionRouter";
}

/// Authenticated principal. Populated by an authentication layer
/// outside this crate.
#[derive(Debug, Clone, Default)]
pub struct SecurityContext {
    pub authentication_id: String,
    pub authorization: Map<String, Value>,
}

impl SecurityContext {
    pub fn new(authentication_id: impl Into<String>, authorization: Map<String, Value>) -> Self {
        Self {
            authentication_id: authentication_id.into(),
            authorization,
        }
    }
}

impl ContextValue for SecurityContext {
    const KIND: &'static str = "security";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_uri_joins_matched_prefixes() {
        let ctx = Context::root()
            .push(UriRouterContext::new("api", "users/1", HashMap::new()))
            .push(UriRouterContext::new("users", "1", HashMap::new()))
            .push(UriRouterContext::new("", "1", HashMap::new()));
        assert_eq!(UriRouterContext::base_uri(&ctx), "api/users");
    }

    #[test]
    fn test_variables() {
        let vars = HashMap::from([("id".to_string(), "bjensen".to_string())]);
        let ctx = UriRouterContext::new("users/bjensen", "", vars);
        assert_eq!(ctx.variable("id"), Some("bjensen"));
        assert_eq!(ctx.variable("other"), None);
    }
}
