//! Typed requests.
//!
//! # Data Flow
//! ```text
//! protocol adapter builds XRequest::new(path).with_*(..)
//!     → Request::from(x)                      (closed sum over 7 kinds)
//!     → Router: request.with_resource_path(remaining)  (routed copy)
//!     → RequestHandler::handle_x(ctx, x)
//! ```
//!
//! # Design Decisions
//! - Seven concrete structs share a `RequestBase`; the object-safe
//!   `ResourceRequest` trait exposes the common part
//! - `Request` is an enum, so dispatch is an exhaustive `match` and
//!   `RequestType` can never disagree with the concrete variant
//! - Routing never mutates a request in place; it clones and rewrites

mod types;
mod visitor;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{ResourceError, ResourceResult};
use crate::json::JsonPointer;
use crate::path::ResourcePath;
use crate::routing::Version;

pub use types::{
    ActionRequest, CreateRequest, DeleteRequest, PatchRequest, QueryRequest, ReadRequest,
    UpdateRequest,
};
pub use visitor::RequestVisitor;

/// The seven request kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    Action,
    Create,
    Read,
    Update,
    Delete,
    Patch,
    Query,
}

impl RequestType {
    pub const ALL: [RequestType; 7] = [
        RequestType::Action,
        RequestType::Create,
        RequestType::Read,
        RequestType::Update,
        RequestType::Delete,
        RequestType::Patch,
        RequestType::Query,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::Action => "action",
            RequestType::Create => "create",
            RequestType::Read => "read",
            RequestType::Update => "update",
            RequestType::Delete => "delete",
            RequestType::Patch => "patch",
            RequestType::Query => "query",
        }
    }

    /// Whether `name` is reserved for this kind of request.
    /// Actions only reserve `_mimeType`.
    pub fn is_reserved_parameter(&self, name: &str) -> bool {
        match self {
            RequestType::Action => name == "_mimeType",
            _ => name.starts_with('_'),
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State shared by every request kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestBase {
    pub resource_path: ResourcePath,
    /// Field selection. Empty means all fields.
    pub fields: Vec<JsonPointer>,
    pub additional_parameters: BTreeMap<String, String>,
    pub resource_version: Option<Version>,
    /// Locale tags in order of preference.
    pub preferred_locales: Vec<String>,
}

impl RequestBase {
    pub fn new(resource_path: ResourcePath) -> Self {
        Self {
            resource_path,
            ..Default::default()
        }
    }
}

/// Common view over all request kinds.
pub trait ResourceRequest: Send + Sync + fmt::Debug {
    fn base(&self) -> &RequestBase;

    fn base_mut(&mut self) -> &mut RequestBase;

    fn request_type(&self) -> RequestType;

    fn resource_path(&self) -> &ResourcePath {
        &self.base().resource_path
    }

    fn fields(&self) -> &[JsonPointer] {
        &self.base().fields
    }

    fn additional_parameters(&self) -> &BTreeMap<String, String> {
        &self.base().additional_parameters
    }

    fn additional_parameter(&self, name: &str) -> Option<&str> {
        self.base().additional_parameters.get(name).map(String::as_str)
    }

    fn resource_version(&self) -> Option<Version> {
        self.base().resource_version
    }

    fn preferred_locales(&self) -> &[String] {
        &self.base().preferred_locales
    }

    fn set_resource_path(&mut self, path: ResourcePath) {
        self.base_mut().resource_path = path;
    }

    fn add_field(&mut self, field: JsonPointer) {
        self.base_mut().fields.push(field);
    }

    /// Set a provider-specific parameter. Reserved names are rejected.
    fn set_additional_parameter(&mut self, name: &str, value: &str) -> ResourceResult<()> {
        if self.request_type().is_reserved_parameter(name) {
            return Err(ResourceError::BadRequest(format!(
                "Unrecognized request parameter '{name}'"
            )));
        }
        self.base_mut()
            .additional_parameters
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn set_resource_version(&mut self, version: Option<Version>) {
        self.base_mut().resource_version = version;
    }

    fn set_preferred_locales(&mut self, locales: Vec<String>) {
        self.base_mut().preferred_locales = locales;
    }

    /// JSON fields shared by every kind.
    fn base_json(&self) -> Value {
        let base = self.base();
        let mut value = json!({
            "method": self.request_type().as_str(),
            "resourcePath": base.resource_path.to_string(),
            "fields": base.fields.iter().map(ToString::to_string).collect::<Vec<_>>(),
        });
        if let Some(version) = base.resource_version {
            value["resourceVersion"] = Value::String(version.to_string());
        }
        value
    }
}

/// One request of any kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Action(ActionRequest),
    Create(CreateRequest),
    Read(ReadRequest),
    Update(UpdateRequest),
    Delete(DeleteRequest),
    Patch(PatchRequest),
    Query(QueryRequest),
}

impl Request {
    pub fn as_resource_request(&self) -> &dyn ResourceRequest {
        match self {
            Request::Action(r) => r,
            Request::Create(r) => r,
            Request::Read(r) => r,
            Request::Update(r) => r,
            Request::Delete(r) => r,
            Request::Patch(r) => r,
            Request::Query(r) => r,
        }
    }

    pub fn as_resource_request_mut(&mut self) -> &mut dyn ResourceRequest {
        match self {
            Request::Action(r) => r,
            Request::Create(r) => r,
            Request::Read(r) => r,
            Request::Update(r) => r,
            Request::Delete(r) => r,
            Request::Patch(r) => r,
            Request::Query(r) => r,
        }
    }

    pub fn request_type(&self) -> RequestType {
        self.as_resource_request().request_type()
    }

    pub fn resource_path(&self) -> &ResourcePath {
        self.as_resource_request().resource_path()
    }

    pub fn resource_version(&self) -> Option<Version> {
        self.as_resource_request().resource_version()
    }

    /// A copy of this request addressed to `path`.
    pub fn with_resource_path(&self, path: ResourcePath) -> Request {
        let mut copy = self.clone();
        copy.as_resource_request_mut().set_resource_path(path);
        copy
    }

    /// Double dispatch to the visitor method for this kind.
    pub fn accept<V, P>(&self, visitor: &mut V, param: P) -> V::Output
    where
        V: RequestVisitor<P> + ?Sized,
    {
        match self {
            Request::Action(r) => visitor.visit_action(param, r),
            Request::Create(r) => visitor.visit_create(param, r),
            Request::Read(r) => visitor.visit_read(param, r),
            Request::Update(r) => visitor.visit_update(param, r),
            Request::Delete(r) => visitor.visit_delete(param, r),
            Request::Patch(r) => visitor.visit_patch(param, r),
            Request::Query(r) => visitor.visit_query(param, r),
        }
    }

    /// JSON description used in logs and by the demo binary.
    pub fn to_json(&self) -> Value {
        self.accept(&mut visitor::JsonDescriber, ())
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

macro_rules! impl_from_request {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Request {
                fn from(request: $ty) -> Self {
                    Request::$variant(request)
                }
            }
        )*
    };
}

impl_from_request!(
    Action => ActionRequest,
    Create => CreateRequest,
    Read => ReadRequest,
    Update => UpdateRequest,
    Delete => DeleteRequest,
    Patch => PatchRequest,
    Query => QueryRequest,
);
