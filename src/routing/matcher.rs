//! Route matching logic.
//!
//! # Responsibilities
//! - Match the request's resource path against a URI template
//! - Match the requested resource API version
//! - Order matches by specificity so a router can pick one
//!
//! # Design Decisions
//! - URI matching is case-insensitive, consistent with `ResourcePath`
//! - Templates are compiled to a regex once, at route registration
//! - Matches of different kinds are incomparable; the router treats that
//!   as a configuration error

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use regex::Regex;
use thiserror::Error;

use crate::context::{AcceptApiVersionContext, ApiVersionRouterContext, Context, UriRouterContext};
use crate::error::{ResourceError, ResourceResult};
use crate::path::decode_segment;
use crate::request::ResourceRequest;
use crate::routing::version_router::{DefaultVersionBehaviour, VersionBehaviour};
use crate::routing::Version;

/// Trait for matching requests against route conditions.
pub trait RouteMatcher: Send + Sync + fmt::Debug {
    /// A match if the request satisfies this route, `None` otherwise.
    fn evaluate(&self, context: &Context, request: &dyn ResourceRequest) -> Option<Box<dyn RouteMatch>>;
}

/// The outcome of a successful [`RouteMatcher::evaluate`].
pub trait RouteMatch: Send + Sync + fmt::Debug {
    /// True if this match is more specific than `other`.
    fn is_better_than(&self, other: &dyn RouteMatch) -> Result<bool, IncomparableRouteMatch>;

    /// Context forwarded to the route's handler.
    fn decorate_context(&self, context: &Context) -> Context;

    fn as_any(&self) -> &dyn Any;
}

/// Two matches of different kinds were compared.
#[derive(Debug, Clone, Error)]
#[error("Route matches {this} and {other} are not comparable")]
pub struct IncomparableRouteMatch {
    pub this: String,
    pub other: String,
}

impl IncomparableRouteMatch {
    fn new(this: &dyn RouteMatch, other: &dyn RouteMatch) -> Self {
        Self {
            this: format!("{this:?}"),
            other: format!("{other:?}"),
        }
    }
}

/// How much of the resource path a URI template must cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingMode {
    /// The template must match the whole path.
    Equals,
    /// The template must match a leading run of whole segments.
    StartsWith,
}

/// Matches the resource path against a template such as `users/{id}`.
#[derive(Debug, Clone)]
pub struct UriRouteMatcher {
    mode: RoutingMode,
    template: String,
    regex: Regex,
    variables: Vec<String>,
}

impl UriRouteMatcher {
    /// Compile `template`. Variables are `{name}` with `name` made of
    /// ASCII letters, digits and `_`; each matches one path segment.
    pub fn new(mode: RoutingMode, template: &str) -> ResourceResult<Self> {
        let t = template.strip_prefix('/').unwrap_or(template);
        let t = t.strip_suffix('/').unwrap_or(t);

        let mut variables = Vec::new();
        let mut pattern = String::from("(?i)^(");
        let mut literal_start = 0;
        let mut variable_start: Option<usize> = None;

        for (i, c) in t.char_indices() {
            match variable_start {
                Some(start) if c == '}' => {
                    if start == i {
                        return Err(ResourceError::BadRequest(format!(
                            "URI template {t} contains zero-length template variable"
                        )));
                    }
                    variables.push(t[start..i].to_string());
                    pattern.push_str("([^/]+)");
                    variable_start = None;
                    literal_start = i + 1;
                }
                Some(_) if !(c.is_ascii_alphanumeric() || c == '_') => {
                    return Err(ResourceError::BadRequest(format!(
                        "URI template {t} contains an illegal character {c} in a template variable"
                    )));
                }
                Some(_) => {}
                None if c == '{' => {
                    pattern.push_str(&regex::escape(&t[literal_start..i]));
                    variable_start = Some(i + 1);
                }
                None => {}
            }
        }
        if variable_start.is_some() {
            return Err(ResourceError::BadRequest(format!(
                "URI template {t} contains a trailing unclosed variable"
            )));
        }
        pattern.push_str(&regex::escape(&t[literal_start..]));
        pattern.push(')');
        if mode == RoutingMode::StartsWith {
            pattern.push_str(if t.is_empty() { "((.*))?" } else { "(/(.*))?" });
        }
        pattern.push('$');

        let regex = Regex::new(&pattern).map_err(|e| {
            ResourceError::InternalServerError(format!("URI template {t} could not be compiled: {e}"))
        })?;

        Ok(Self {
            mode,
            template: t.to_string(),
            regex,
            variables,
        })
    }

    pub fn mode(&self) -> RoutingMode {
        self.mode
    }

    pub fn template(&self) -> &str {
        &self.template
    }
}

impl RouteMatcher for UriRouteMatcher {
    fn evaluate(&self, _context: &Context, request: &dyn ResourceRequest) -> Option<Box<dyn RouteMatch>> {
        let uri = request.resource_path().as_str();
        let captures = self.regex.captures(uri)?;
        let matched = captures.get(1)?;

        // Group 1 is the whole template; variables follow in order.
        let variables = self
            .variables
            .iter()
            .enumerate()
            .filter_map(|(i, name)| {
                captures
                    .get(i + 2)
                    .map(|m| (name.clone(), decode_segment(m.as_str())))
            })
            .collect();

        let rest = &uri[matched.end()..];
        let remaining = rest.strip_prefix('/').unwrap_or(rest);

        Some(Box::new(UriRouteMatch {
            matched: matched.as_str().to_string(),
            remaining: remaining.to_string(),
            variables,
            mode: self.mode,
        }))
    }
}

impl fmt::Display for UriRouteMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            RoutingMode::Equals => write!(f, "equals({})", self.template),
            RoutingMode::StartsWith => write!(f, "startsWith({})", self.template),
        }
    }
}

#[derive(Debug, Clone)]
struct UriRouteMatch {
    matched: String,
    remaining: String,
    variables: HashMap<String, String>,
    mode: RoutingMode,
}

impl RouteMatch for UriRouteMatch {
    fn is_better_than(&self, other: &dyn RouteMatch) -> Result<bool, IncomparableRouteMatch> {
        let Some(other) = other.as_any().downcast_ref::<UriRouteMatch>() else {
            return Err(IncomparableRouteMatch::new(self, other));
        };
        if self.matched.len() != other.matched.len() {
            return Ok(self.matched.len() > other.matched.len());
        }
        if self.mode != other.mode {
            return Ok(self.mode == RoutingMode::Equals);
        }
        Ok(self.variables.len() < other.variables.len())
    }

    fn decorate_context(&self, context: &Context) -> Context {
        context.push(UriRouterContext::new(
            self.matched.clone(),
            self.remaining.clone(),
            self.variables.clone(),
        ))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Matches the requested resource API version.
///
/// The requested version is the request's own resource version, falling
/// back to an [`AcceptApiVersionContext`]. A route at version `1.2`
/// serves requests for `1.2` exactly, and requests for `1.0` or `1.1`
/// as compatible. Requests without a version are matched according to
/// the shared default behaviour.
#[derive(Debug, Clone)]
pub struct ApiVersionRouteMatcher {
    version: Version,
    behaviour: VersionBehaviour,
}

impl ApiVersionRouteMatcher {
    pub fn new(version: Version, behaviour: VersionBehaviour) -> Self {
        Self { version, behaviour }
    }

    pub fn version(&self) -> Version {
        self.version
    }
}

impl RouteMatcher for ApiVersionRouteMatcher {
    fn evaluate(&self, context: &Context, request: &dyn ResourceRequest) -> Option<Box<dyn RouteMatch>> {
        let requested = request.resource_version().or_else(|| {
            context
                .get::<AcceptApiVersionContext>()
                .and_then(|accept| accept.resource_version)
        });

        let version_match = match requested {
            Some(requested) if requested == self.version => ApiVersionRouteMatch {
                version: self.version,
                selection: Selection::Exact,
            },
            Some(requested) if self.version.is_compatible_with(&requested) => ApiVersionRouteMatch {
                version: self.version,
                selection: Selection::Compatible,
            },
            Some(_) => return None,
            None => match self.behaviour.get() {
                DefaultVersionBehaviour::None => return None,
                behaviour => ApiVersionRouteMatch {
                    version: self.version,
                    selection: Selection::Defaulted(behaviour),
                },
            },
        };
        Some(Box::new(version_match))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selection {
    Exact,
    Compatible,
    Defaulted(DefaultVersionBehaviour),
}

#[derive(Debug, Clone)]
struct ApiVersionRouteMatch {
    version: Version,
    selection: Selection,
}

impl RouteMatch for ApiVersionRouteMatch {
    fn is_better_than(&self, other: &dyn RouteMatch) -> Result<bool, IncomparableRouteMatch> {
        let Some(other) = other.as_any().downcast_ref::<ApiVersionRouteMatch>() else {
            return Err(IncomparableRouteMatch::new(self, other));
        };
        let better = match (self.selection, other.selection) {
            (Selection::Exact, Selection::Exact) => false,
            (Selection::Exact, _) => true,
            (_, Selection::Exact) => false,
            (Selection::Defaulted(DefaultVersionBehaviour::Oldest), _) => self.version < other.version,
            _ => self.version > other.version,
        };
        Ok(better)
    }

    fn decorate_context(&self, context: &Context) -> Context {
        context.push(ApiVersionRouterContext {
            resource_version: self.version,
            defaulted: matches!(self.selection, Selection::Defaulted(_)),
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::ResourcePath;
    use crate::request::ReadRequest;

    fn read(path: &str) -> ReadRequest {
        ReadRequest::new(ResourcePath::parse(path).unwrap())
    }

    fn uri(mode: RoutingMode, template: &str) -> UriRouteMatcher {
        UriRouteMatcher::new(mode, template).unwrap()
    }

    fn router_context(m: &dyn RouteMatch) -> UriRouterContext {
        m.decorate_context(&Context::root())
            .get::<UriRouterContext>()
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_equals_requires_whole_path() {
        let matcher = uri(RoutingMode::Equals, "users");
        let ctx = Context::root();
        assert!(matcher.evaluate(&ctx, &read("users")).is_some());
        assert!(matcher.evaluate(&ctx, &read("USERS")).is_some());
        assert!(matcher.evaluate(&ctx, &read("users/1")).is_none());
        assert!(matcher.evaluate(&ctx, &read("usersx")).is_none());
    }

    #[test]
    fn test_starts_with_splits_remaining() {
        let matcher = uri(RoutingMode::StartsWith, "/users/");
        let m = matcher.evaluate(&Context::root(), &read("users/42/devices")).unwrap();
        let rc = router_context(m.as_ref());
        assert_eq!(rc.matched_uri, "users");
        assert_eq!(rc.remaining_uri, "42/devices");

        assert!(matcher.evaluate(&Context::root(), &read("usersx/1")).is_none());
    }

    #[test]
    fn test_empty_template_starts_with_everything() {
        let matcher = uri(RoutingMode::StartsWith, "");
        let m = matcher.evaluate(&Context::root(), &read("a/b")).unwrap();
        let rc = router_context(m.as_ref());
        assert_eq!(rc.matched_uri, "");
        assert_eq!(rc.remaining_uri, "a/b");
    }

    #[test]
    fn test_variables_are_decoded() {
        let matcher = uri(RoutingMode::Equals, "users/{id}/devices/{device_1}");
        let m = matcher
            .evaluate(&Context::root(), &read("users/b%20jensen/devices/x"))
            .unwrap();
        let rc = router_context(m.as_ref());
        assert_eq!(rc.variable("id"), Some("b jensen"));
        assert_eq!(rc.variable("device_1"), Some("x"));
    }

    #[test]
    fn test_template_literals_are_escaped() {
        let matcher = uri(RoutingMode::Equals, "a.b");
        assert!(matcher.evaluate(&Context::root(), &read("a.b")).is_some());
        assert!(matcher.evaluate(&Context::root(), &read("axb")).is_none());
    }

    #[test]
    fn test_invalid_templates() {
        assert!(UriRouteMatcher::new(RoutingMode::Equals, "users/{}").is_err());
        assert!(UriRouteMatcher::new(RoutingMode::Equals, "users/{i-d}").is_err());
        assert!(UriRouteMatcher::new(RoutingMode::Equals, "users/{id").is_err());
    }

    #[test]
    fn test_uri_match_ordering() {
        let ctx = Context::root();
        let request = read("users");
        let exact = uri(RoutingMode::Equals, "users").evaluate(&ctx, &request).unwrap();
        let prefix = uri(RoutingMode::StartsWith, "users").evaluate(&ctx, &request).unwrap();
        let var = uri(RoutingMode::Equals, "{coll}").evaluate(&ctx, &request).unwrap();
        assert!(exact.is_better_than(prefix.as_ref()).unwrap());
        assert!(!prefix.is_better_than(exact.as_ref()).unwrap());
        assert!(exact.is_better_than(var.as_ref()).unwrap());

        let longer = uri(RoutingMode::StartsWith, "users/1")
            .evaluate(&ctx, &read("users/1/x"))
            .unwrap();
        let shorter = uri(RoutingMode::StartsWith, "users")
            .evaluate(&ctx, &read("users/1/x"))
            .unwrap();
        assert!(longer.is_better_than(shorter.as_ref()).unwrap());
    }

    #[test]
    fn test_uri_and_version_matches_are_incomparable() {
        let ctx = Context::root();
        let request = read("users").with_resource_version(Version::new(1, 0));
        let uri_match = uri(RoutingMode::Equals, "users").evaluate(&ctx, &request).unwrap();
        let version_match = ApiVersionRouteMatcher::new(Version::new(1, 0), VersionBehaviour::default())
            .evaluate(&ctx, &request)
            .unwrap();
        assert!(uri_match.is_better_than(version_match.as_ref()).is_err());
        assert!(version_match.is_better_than(uri_match.as_ref()).is_err());
    }

    #[test]
    fn test_version_selection() {
        let behaviour = VersionBehaviour::default();
        let v1_0 = ApiVersionRouteMatcher::new(Version::new(1, 0), behaviour.clone());
        let v1_5 = ApiVersionRouteMatcher::new(Version::new(1, 5), behaviour.clone());
        let ctx = Context::root();

        let exact_req = read("x").with_resource_version(Version::new(1, 0));
        let exact = v1_0.evaluate(&ctx, &exact_req).unwrap();
        let compatible = v1_5.evaluate(&ctx, &exact_req).unwrap();
        assert!(exact.is_better_than(compatible.as_ref()).unwrap());

        let newer_req = read("x").with_resource_version(Version::new(1, 3));
        assert!(v1_0.evaluate(&ctx, &newer_req).is_none());
        assert!(v1_5.evaluate(&ctx, &newer_req).is_some());

        let other_major = read("x").with_resource_version(Version::new(2, 0));
        assert!(v1_5.evaluate(&ctx, &other_major).is_none());
    }

    #[test]
    fn test_version_from_accept_context() {
        let matcher = ApiVersionRouteMatcher::new(Version::new(2, 0), VersionBehaviour::default());
        let ctx = Context::root().push(AcceptApiVersionContext::new(None, Some(Version::new(2, 0))));
        let m = matcher.evaluate(&ctx, &read("x")).unwrap();
        let decorated = m.decorate_context(&ctx);
        let selected = decorated.get::<ApiVersionRouterContext>().unwrap();
        assert_eq!(selected.resource_version, Version::new(2, 0));
        assert!(!selected.defaulted);
    }

    #[test]
    fn test_default_behaviour_without_version() {
        let behaviour = VersionBehaviour::default();
        let old = ApiVersionRouteMatcher::new(Version::new(1, 0), behaviour.clone());
        let new = ApiVersionRouteMatcher::new(Version::new(2, 0), behaviour.clone());
        let ctx = Context::root();
        let request = read("x");

        let (o, n) = (old.evaluate(&ctx, &request).unwrap(), new.evaluate(&ctx, &request).unwrap());
        assert!(n.is_better_than(o.as_ref()).unwrap());

        behaviour.set(DefaultVersionBehaviour::Oldest);
        let (o, n) = (old.evaluate(&ctx, &request).unwrap(), new.evaluate(&ctx, &request).unwrap());
        assert!(o.is_better_than(n.as_ref()).unwrap());

        behaviour.set(DefaultVersionBehaviour::None);
        assert!(old.evaluate(&ctx, &request).is_none());
    }
}
