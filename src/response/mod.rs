//! Typed responses.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::json::JsonPointer;
use crate::routing::Version;

/// Content key carrying the resource id.
pub const FIELD_CONTENT_ID: &str = "_id";
/// Content key carrying the resource revision.
pub const FIELD_CONTENT_REVISION: &str = "_rev";

/// A stored or returned resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceResponse {
    pub id: Option<String>,
    /// Opaque optimistic-concurrency token.
    pub revision: Option<String>,
    pub content: Value,
    /// Fields the content was filtered to, if any.
    pub fields: Vec<JsonPointer>,
    /// Set by a version router for routed queries.
    pub resource_api_version: Option<Version>,
}

impl ResourceResponse {
    pub fn new(id: Option<String>, revision: Option<String>, content: Value) -> Self {
        Self {
            id,
            revision,
            content,
            fields: Vec::new(),
            resource_api_version: None,
        }
    }

    /// Copy restricted to `fields`.
    ///
    /// An empty pointer keeps every top-level field; missing fields are
    /// dropped; each kept value is keyed by its pointer's leaf.
    pub fn filtered(&self, fields: &[JsonPointer]) -> Self {
        if fields.is_empty() {
            return self.clone();
        }
        let mut filtered = Map::new();
        for field in fields {
            if field.is_empty() {
                if let Value::Object(all) = &self.content {
                    filtered.extend(all.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
                continue;
            }
            if let (Some(leaf), Some(value)) = (field.leaf(), field.get(&self.content)) {
                filtered.insert(leaf.to_string(), value.clone());
            }
        }
        Self {
            content: Value::Object(filtered),
            fields: fields.to_vec(),
            ..self.clone()
        }
    }

    pub fn to_json(&self) -> Value {
        let mut value = json!({
            "id": self.id,
            "revision": self.revision,
            "content": self.content,
        });
        if let Some(version) = self.resource_api_version {
            value["resourceApiVersion"] = Value::String(version.to_string());
        }
        value
    }
}

/// Result of an action.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResponse {
    pub content: Value,
}

impl ActionResponse {
    pub fn new(content: Value) -> Self {
        Self { content }
    }
}

/// How a provider should count the total results of a paged query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CountPolicy {
    #[default]
    None,
    Estimate,
    Exact,
}

/// Terminal result of a query, after every resource was streamed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResponse {
    /// Opaque continuation token. `None` on the final page.
    pub paged_results_cookie: Option<String>,
    pub total_paged_results_policy: CountPolicy,
    /// Only meaningful when the policy is not `None`.
    pub total_paged_results: Option<usize>,
    pub remaining_paged_results: Option<usize>,
}

impl QueryResponse {
    pub fn new(paged_results_cookie: Option<String>) -> Self {
        Self {
            paged_results_cookie,
            ..Default::default()
        }
    }

    pub fn with_count(
        paged_results_cookie: Option<String>,
        policy: CountPolicy,
        total: usize,
    ) -> Self {
        Self {
            paged_results_cookie,
            total_paged_results_policy: policy,
            total_paged_results: Some(total),
            remaining_paged_results: None,
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "pagedResultsCookie": self.paged_results_cookie,
            "totalPagedResultsPolicy": self.total_paged_results_policy,
            "totalPagedResults": self.total_paged_results,
            "remainingPagedResults": self.remaining_paged_results,
        })
    }
}

/// Any terminal response, as returned by [`dispatch`](crate::handler::dispatch).
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Action(ActionResponse),
    Resource(ResourceResponse),
    Query(QueryResponse),
}

impl Response {
    pub fn to_json(&self) -> Value {
        match self {
            Response::Action(action) => action.content.clone(),
            Response::Resource(resource) => resource.to_json(),
            Response::Query(query) => query.to_json(),
        }
    }
}
