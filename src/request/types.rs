//! The seven concrete request kinds.

use serde_json::Value;

use super::{RequestBase, RequestType, ResourceRequest};
use crate::error::ResourceResult;
use crate::json::{JsonPointer, PatchOperation, QueryFilter, SortKey};
use crate::path::ResourcePath;
use crate::response::CountPolicy;
use crate::routing::Version;

/// Implements `ResourceRequest` and the shared `with_*` builders.
macro_rules! request_common {
    ($ty:ident, $kind:expr) => {
        impl ResourceRequest for $ty {
            fn base(&self) -> &RequestBase {
                &self.base
            }

            fn base_mut(&mut self) -> &mut RequestBase {
                &mut self.base
            }

            fn request_type(&self) -> RequestType {
                $kind
            }
        }

        impl $ty {
            pub fn with_resource_path(mut self, path: ResourcePath) -> Self {
                self.base.resource_path = path;
                self
            }

            pub fn with_field(mut self, field: impl Into<JsonPointer>) -> Self {
                self.base.fields.push(field.into());
                self
            }

            pub fn with_fields<I, F>(mut self, fields: I) -> Self
            where
                I: IntoIterator<Item = F>,
                F: Into<JsonPointer>,
            {
                self.base.fields.extend(fields.into_iter().map(Into::into));
                self
            }

            pub fn with_resource_version(mut self, version: Version) -> Self {
                self.base.resource_version = Some(version);
                self
            }

            pub fn with_preferred_locales<I, S>(mut self, locales: I) -> Self
            where
                I: IntoIterator<Item = S>,
                S: Into<String>,
            {
                self.base.preferred_locales = locales.into_iter().map(Into::into).collect();
                self
            }

            /// Fails for reserved parameter names.
            pub fn with_additional_parameter(mut self, name: &str, value: &str) -> ResourceResult<Self> {
                self.set_additional_parameter(name, value)?;
                Ok(self)
            }
        }
    };
}

/// Invoke a named action on a collection or instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    base: RequestBase,
    pub action: String,
    pub content: Value,
}

impl ActionRequest {
    pub fn new(path: ResourcePath, action: impl Into<String>) -> Self {
        Self {
            base: RequestBase::new(path),
            action: action.into(),
            content: Value::Null,
        }
    }

    pub fn with_content(mut self, content: Value) -> Self {
        self.content = content;
        self
    }
}

request_common!(ActionRequest, RequestType::Action);

/// Create a resource inside the container at the request path.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateRequest {
    base: RequestBase,
    pub content: Value,
    /// Client-chosen id. `None` lets the provider assign one.
    pub new_resource_id: Option<String>,
}

impl CreateRequest {
    pub fn new(container: ResourcePath, content: Value) -> Self {
        Self {
            base: RequestBase::new(container),
            content,
            new_resource_id: None,
        }
    }

    pub fn with_new_resource_id(mut self, id: impl Into<String>) -> Self {
        self.new_resource_id = Some(id.into());
        self
    }
}

request_common!(CreateRequest, RequestType::Create);

#[derive(Debug, Clone, PartialEq)]
pub struct ReadRequest {
    base: RequestBase,
}

impl ReadRequest {
    pub fn new(path: ResourcePath) -> Self {
        Self {
            base: RequestBase::new(path),
        }
    }
}

request_common!(ReadRequest, RequestType::Read);

/// Replace a resource's content.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    base: RequestBase,
    pub content: Value,
    /// Expected current revision. `None` means unconditional.
    pub revision: Option<String>,
}

impl UpdateRequest {
    pub fn new(path: ResourcePath, content: Value) -> Self {
        Self {
            base: RequestBase::new(path),
            content,
            revision: None,
        }
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }
}

request_common!(UpdateRequest, RequestType::Update);

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteRequest {
    base: RequestBase,
    pub revision: Option<String>,
}

impl DeleteRequest {
    pub fn new(path: ResourcePath) -> Self {
        Self {
            base: RequestBase::new(path),
            revision: None,
        }
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }
}

request_common!(DeleteRequest, RequestType::Delete);

/// Apply an ordered list of patch operations.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchRequest {
    base: RequestBase,
    pub operations: Vec<PatchOperation>,
    pub revision: Option<String>,
}

impl PatchRequest {
    pub fn new(path: ResourcePath, operations: Vec<PatchOperation>) -> Self {
        Self {
            base: RequestBase::new(path),
            operations,
            revision: None,
        }
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }
}

request_common!(PatchRequest, RequestType::Patch);

/// Search a collection.
///
/// At most one of `query_filter`, `query_id`, `query_expression` is
/// normally set; providers decide which they support.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    base: RequestBase,
    pub query_filter: Option<QueryFilter>,
    pub query_id: Option<String>,
    pub query_expression: Option<String>,
    pub sort_keys: Vec<SortKey>,
    /// Zero disables paging.
    pub page_size: usize,
    pub paged_results_cookie: Option<String>,
    pub paged_results_offset: usize,
    pub total_paged_results_policy: CountPolicy,
}

impl QueryRequest {
    pub fn new(path: ResourcePath) -> Self {
        Self {
            base: RequestBase::new(path),
            query_filter: None,
            query_id: None,
            query_expression: None,
            sort_keys: Vec::new(),
            page_size: 0,
            paged_results_cookie: None,
            paged_results_offset: 0,
            total_paged_results_policy: CountPolicy::None,
        }
    }

    pub fn with_query_filter(mut self, filter: QueryFilter) -> Self {
        self.query_filter = Some(filter);
        self
    }

    pub fn with_query_id(mut self, id: impl Into<String>) -> Self {
        self.query_id = Some(id.into());
        self
    }

    pub fn with_query_expression(mut self, expression: impl Into<String>) -> Self {
        self.query_expression = Some(expression.into());
        self
    }

    pub fn with_sort_key(mut self, key: SortKey) -> Self {
        self.sort_keys.push(key);
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_paged_results_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.paged_results_cookie = Some(cookie.into());
        self
    }

    pub fn with_paged_results_offset(mut self, offset: usize) -> Self {
        self.paged_results_offset = offset;
        self
    }

    pub fn with_total_paged_results_policy(mut self, policy: CountPolicy) -> Self {
        self.total_paged_results_policy = policy;
        self
    }
}

request_common!(QueryRequest, RequestType::Query);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(s: &str) -> ResourcePath {
        ResourcePath::parse(s).unwrap()
    }

    #[test]
    fn test_builders() {
        let create = CreateRequest::new(path("users"), json!({"name": "alice"}))
            .with_new_resource_id("alice")
            .with_fields(["/name", "/_id"])
            .with_preferred_locales(["fr", "en"]);
        assert_eq!(create.new_resource_id.as_deref(), Some("alice"));
        assert_eq!(create.fields().len(), 2);
        assert_eq!(create.preferred_locales(), ["fr", "en"]);

        let query = QueryRequest::new(path("users"))
            .with_page_size(10)
            .with_sort_key(SortKey::descending("/age"))
            .with_total_paged_results_policy(CountPolicy::Exact);
        assert_eq!(query.page_size, 10);
        assert_eq!(query.sort_keys.len(), 1);
        assert_eq!(query.total_paged_results_policy, CountPolicy::Exact);
    }

    #[test]
    fn test_additional_parameter_builder_rejects_reserved() {
        assert!(ReadRequest::new(path("a"))
            .with_additional_parameter("_prettyPrint", "true")
            .is_err());
        let read = ReadRequest::new(path("a"))
            .with_additional_parameter("realm", "root")
            .unwrap();
        assert_eq!(read.additional_parameter("realm"), Some("root"));
    }

    #[test]
    fn test_resource_version() {
        let version = Version::parse("2.1").unwrap();
        let read = ReadRequest::new(path("a")).with_resource_version(version);
        assert_eq!(read.resource_version(), Some(version));
    }
}
