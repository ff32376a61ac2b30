//! In-memory collection provider.
//!
//! Resources live in a [`DashMap`] so reads never block. Every write
//! (create, update, delete, patch, clear) serializes on one lock, which
//! keeps revision checks and id allocation consistent.
//!
//! Queries evaluate the filter with three-valued logic: a comparison whose
//! field is missing or of another JSON type is undefined rather than false,
//! so `!(age gt 3)` does not match resources without an `age`.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Mutex;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use dashmap::DashMap;
use serde_json::Value;

use crate::config::BackendConfig;
use crate::context::Context;
use crate::error::{ResourceError, ResourceResult};
use crate::handler::QueryResourceHandler;
use crate::json::{apply_patch, JsonPointer, QueryFilter, SortKey};
use crate::request::{
    ActionRequest, CreateRequest, DeleteRequest, PatchRequest, QueryRequest, ReadRequest,
    UpdateRequest,
};
use crate::resources::provider::CollectionResourceProvider;
use crate::response::{
    ActionResponse, CountPolicy, QueryResponse, ResourceResponse, FIELD_CONTENT_ID,
    FIELD_CONTENT_REVISION,
};

const CLEAR_ACTION: &str = "clear";
const INITIAL_REVISION: &str = "0";

/// A collection held entirely in memory.
pub struct MemoryBackend {
    resources: DashMap<String, ResourceResponse>,
    write_lock: Mutex<()>,
    next_id: AtomicU64,
    /// Largest page served; 0 means unlimited.
    page_size_limit: usize,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            resources: DashMap::new(),
            write_lock: Mutex::new(()),
            next_id: AtomicU64::new(0),
            page_size_limit: 0,
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new().with_page_size_limit(config.page_size_limit)
    }

    /// Queries asking for larger pages, or for no paging at all, are
    /// served `limit` resources at a time.
    pub fn with_page_size_limit(mut self, limit: usize) -> Self {
        self.page_size_limit = limit;
        self
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    fn effective_page_size(&self, requested: usize) -> usize {
        match self.page_size_limit {
            0 => requested,
            limit if requested == 0 || requested > limit => limit,
            _ => requested,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        // The guarded data is `()`, so a poisoned lock carries no torn state.
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Resource `id` after checking the caller's revision, plus the
    /// revision its next write gets. `verb` names the write in errors.
    fn resource_for_update(
        &self,
        id: &str,
        revision: Option<&str>,
        verb: &str,
    ) -> ResourceResult<(ResourceResponse, String)> {
        let existing = self
            .resources
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                ResourceError::NotFound(format!(
                    "The resource with ID '{id}' could not be {verb} because it does not exist"
                ))
            })?;
        let current = existing.revision.clone().unwrap_or_default();
        if let Some(expected) = revision {
            if expected != current {
                return Err(ResourceError::PreconditionFailed(format!(
                    "The resource with ID '{id}' could not be {verb} because it does not have the required version"
                )));
            }
        }
        let next = next_revision(&current)?;
        Ok((existing, next))
    }

    fn allocate_id(&self) -> String {
        loop {
            let candidate = self.next_id.fetch_add(1, AtomicOrdering::Relaxed).to_string();
            if !self.resources.contains_key(&candidate) {
                return candidate;
            }
        }
    }
}

fn next_revision(revision: &str) -> ResourceResult<String> {
    revision
        .parse::<u64>()
        .map(|n| (n + 1).to_string())
        .map_err(|_| {
            ResourceError::InternalServerError(format!(
                "Malformed revision number '{revision}' encountered while updating a resource"
            ))
        })
}

/// Writes the id and revision into the content object.
fn stamp(mut resource: ResourceResponse) -> ResourceResult<ResourceResponse> {
    let Value::Object(content) = &mut resource.content else {
        return Err(ResourceError::BadRequest(
            "The request could not be processed because the provided content is not a JSON object"
                .into(),
        ));
    };
    content.insert(
        FIELD_CONTENT_ID.to_string(),
        resource.id.clone().map_or(Value::Null, Value::String),
    );
    content.insert(
        FIELD_CONTENT_REVISION.to_string(),
        resource.revision.clone().map_or(Value::Null, Value::String),
    );
    Ok(resource)
}

#[async_trait]
impl CollectionResourceProvider for MemoryBackend {
    async fn action_collection(
        &self,
        _context: &Context,
        request: ActionRequest,
    ) -> ResourceResult<ActionResponse> {
        if request.action != CLEAR_ACTION {
            return Err(ResourceError::NotSupported(format!(
                "Unrecognized action ID '{}'. Supported action IDs: {CLEAR_ACTION}",
                request.action
            )));
        }
        let cleared = {
            let _guard = self.lock();
            let size = self.resources.len();
            self.resources.clear();
            size
        };
        tracing::debug!(cleared, "Cleared in-memory collection");
        Ok(ActionResponse::new(serde_json::json!({ "cleared": cleared })))
    }

    async fn action_instance(
        &self,
        _context: &Context,
        _resource_id: &str,
        _request: ActionRequest,
    ) -> ResourceResult<ActionResponse> {
        Err(ResourceError::NotSupported(
            "Actions are not supported for resource instances".into(),
        ))
    }

    async fn create_instance(
        &self,
        _context: &Context,
        request: CreateRequest,
    ) -> ResourceResult<ResourceResponse> {
        let _guard = self.lock();
        let id = match request.new_resource_id {
            Some(id) if self.resources.contains_key(&id) => {
                return Err(ResourceError::PreconditionFailed(format!(
                    "The resource with ID '{id}' could not be created because there is already another resource with the same ID"
                )));
            }
            Some(id) => id,
            None => self.allocate_id(),
        };
        let resource = stamp(ResourceResponse::new(
            Some(id.clone()),
            Some(INITIAL_REVISION.to_string()),
            request.content,
        ))?;
        self.resources.insert(id, resource.clone());
        Ok(resource)
    }

    async fn delete_instance(
        &self,
        _context: &Context,
        resource_id: &str,
        request: DeleteRequest,
    ) -> ResourceResult<ResourceResponse> {
        let _guard = self.lock();
        let (existing, _) =
            self.resource_for_update(resource_id, request.revision.as_deref(), "deleted")?;
        self.resources.remove(resource_id);
        Ok(existing)
    }

    async fn patch_instance(
        &self,
        _context: &Context,
        resource_id: &str,
        request: PatchRequest,
    ) -> ResourceResult<ResourceResponse> {
        let _guard = self.lock();
        let (existing, revision) =
            self.resource_for_update(resource_id, request.revision.as_deref(), "patched")?;
        let mut content = existing.content;
        apply_patch(&mut content, &request.operations)?;
        let resource = stamp(ResourceResponse::new(
            Some(resource_id.to_string()),
            Some(revision),
            content,
        ))?;
        self.resources.insert(resource_id.to_string(), resource.clone());
        Ok(resource)
    }

    async fn query_collection(
        &self,
        _context: &Context,
        request: QueryRequest,
        handler: &mut dyn QueryResourceHandler,
    ) -> ResourceResult<QueryResponse> {
        if request.query_id.is_some() {
            return Err(ResourceError::NotSupported("Query by ID not supported".into()));
        }
        if request.query_expression.is_some() {
            return Err(ResourceError::NotSupported(
                "Query by expression not supported".into(),
            ));
        }

        let page_size = self.effective_page_size(request.page_size);
        let first_index = match &request.paged_results_cookie {
            Some(cookie) if page_size > 0 => {
                if request.paged_results_offset > 0 {
                    return Err(ResourceError::BadRequest(
                        "Cookies and offsets are mutually exclusive".into(),
                    ));
                }
                let cookie = PagedCookie::decode(cookie)?;
                if cookie.sort_keys != request.sort_keys {
                    return Err(ResourceError::BadRequest(
                        "The paged results cookie was issued for a different sort order".into(),
                    ));
                }
                cookie.last_index
            }
            _ => request.paged_results_offset,
        };

        let mut matches: Vec<ResourceResponse> = self
            .resources
            .iter()
            .filter(|entry| {
                request
                    .query_filter
                    .as_ref()
                    .map_or(true, |filter| evaluate(filter, &entry.value().content) == FilterResult::True)
            })
            .map(|entry| entry.value().clone())
            .collect();
        if !request.sort_keys.is_empty() {
            matches.sort_by(|a, b| compare_resources(&request.sort_keys, a, b));
        }

        let total = matches.len();
        let last_index = if page_size > 0 {
            first_index.saturating_add(page_size).min(total)
        } else {
            total
        };
        let page = matches
            .into_iter()
            .skip(first_index)
            .take(last_index.saturating_sub(first_index));
        for resource in page {
            if !handler.handle_resource(resource) {
                break;
            }
        }

        let cookie = (page_size > 0 && last_index < total).then(|| {
            PagedCookie {
                last_index,
                sort_keys: request.sort_keys.clone(),
            }
            .encode()
        });
        let mut response = match request.total_paged_results_policy {
            CountPolicy::None => QueryResponse::new(cookie),
            policy @ (CountPolicy::Exact | CountPolicy::Estimate) => {
                QueryResponse::with_count(cookie, policy, total)
            }
        };
        if page_size > 0 {
            response.remaining_paged_results = Some(total - last_index);
        }
        Ok(response)
    }

    async fn read_instance(
        &self,
        _context: &Context,
        resource_id: &str,
        _request: ReadRequest,
    ) -> ResourceResult<ResourceResponse> {
        self.resources
            .get(resource_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                ResourceError::NotFound(format!(
                    "The resource with ID '{resource_id}' could not be read because it does not exist"
                ))
            })
    }

    async fn update_instance(
        &self,
        _context: &Context,
        resource_id: &str,
        request: UpdateRequest,
    ) -> ResourceResult<ResourceResponse> {
        let _guard = self.lock();
        let (_, revision) =
            self.resource_for_update(resource_id, request.revision.as_deref(), "updated")?;
        let resource = stamp(ResourceResponse::new(
            Some(resource_id.to_string()),
            Some(revision),
            request.content,
        ))?;
        self.resources.insert(resource_id.to_string(), resource.clone());
        Ok(resource)
    }
}

/// Position after the last served resource, and the sort it applies to.
#[derive(Debug, Clone, PartialEq)]
struct PagedCookie {
    last_index: usize,
    sort_keys: Vec<SortKey>,
}

impl PagedCookie {
    fn encode(&self) -> String {
        let keys: Vec<String> = self.sort_keys.iter().map(ToString::to_string).collect();
        STANDARD.encode(format!("{}:{}", self.last_index, keys.join(",")))
    }

    fn decode(cookie: &str) -> ResourceResult<Self> {
        let invalid = || ResourceError::BadRequest("Invalid paged results cookie".into());
        let bytes = STANDARD.decode(cookie).map_err(|_| invalid())?;
        let text = String::from_utf8(bytes).map_err(|_| invalid())?;
        let (index, keys) = text.split_once(':').ok_or_else(invalid)?;
        let last_index = index.parse().map_err(|_| invalid())?;
        let sort_keys = if keys.is_empty() {
            Vec::new()
        } else {
            SortKey::parse_list(keys).map_err(|_| invalid())?
        };
        Ok(Self {
            last_index,
            sort_keys,
        })
    }
}

/// Outcome of a filter over one resource, ordered so that `and` is `min`
/// and `or` is `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum FilterResult {
    False,
    Undefined,
    True,
}

impl From<bool> for FilterResult {
    fn from(b: bool) -> Self {
        if b {
            Self::True
        } else {
            Self::False
        }
    }
}

fn evaluate(filter: &QueryFilter, content: &Value) -> FilterResult {
    match filter {
        QueryFilter::And(subs) => {
            let mut result = FilterResult::True;
            for sub in subs {
                result = result.min(evaluate(sub, content));
                if result == FilterResult::False {
                    break;
                }
            }
            result
        }
        QueryFilter::Or(subs) => {
            let mut result = FilterResult::False;
            for sub in subs {
                result = result.max(evaluate(sub, content));
                if result == FilterResult::True {
                    break;
                }
            }
            result
        }
        QueryFilter::Not(sub) => match evaluate(sub, content) {
            FilterResult::True => FilterResult::False,
            FilterResult::False => FilterResult::True,
            FilterResult::Undefined => FilterResult::Undefined,
        },
        QueryFilter::BooleanLiteral(b) => (*b).into(),
        QueryFilter::Present { field } => field.get(content).is_some().into(),
        QueryFilter::ExtendedMatch { .. } => FilterResult::Undefined,
        QueryFilter::Equals { field, value } => {
            compare(field, value, content, |v| compare_values(value, v) == Ordering::Equal)
        }
        QueryFilter::Contains { field, value } => {
            compare(field, value, content, |v| text_match(value, v, |s, a| s.contains(a)))
        }
        QueryFilter::StartsWith { field, value } => {
            compare(field, value, content, |v| text_match(value, v, |s, a| s.starts_with(a)))
        }
        QueryFilter::GreaterThan { field, value } => {
            compare(field, value, content, |v| compare_values(value, v) == Ordering::Less)
        }
        QueryFilter::GreaterThanOrEqual { field, value } => {
            compare(field, value, content, |v| compare_values(value, v) != Ordering::Greater)
        }
        QueryFilter::LessThan { field, value } => {
            compare(field, value, content, |v| compare_values(value, v) == Ordering::Greater)
        }
        QueryFilter::LessThanOrEqual { field, value } => {
            compare(field, value, content, |v| compare_values(value, v) != Ordering::Less)
        }
    }
}

/// True if any compatible value of `field` satisfies `test`; undefined if
/// none is compatible with the assertion.
fn compare(
    field: &JsonPointer,
    assertion: &Value,
    content: &Value,
    test: impl Fn(&Value) -> bool,
) -> FilterResult {
    let mut result = FilterResult::Undefined;
    for value in values_of(field, content) {
        if !is_compatible(assertion, value) {
            continue;
        }
        if test(value) {
            return FilterResult::True;
        }
        result = FilterResult::False;
    }
    result
}

/// Case-insensitive substring test for strings; plain equality otherwise.
fn text_match(assertion: &Value, value: &Value, test: impl Fn(&str, &str) -> bool) -> bool {
    match (assertion, value) {
        (Value::String(a), Value::String(v)) => test(&v.to_lowercase(), &a.to_lowercase()),
        _ => compare_values(assertion, value) == Ordering::Equal,
    }
}

/// Elements of an array field, or the field itself.
fn values_of<'a>(field: &JsonPointer, content: &'a Value) -> Vec<&'a Value> {
    match field.get(content) {
        None => Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(value) => vec![value],
    }
}

fn is_compatible(a: &Value, b: &Value) -> bool {
    matches!(
        (a, b),
        (Value::String(_), Value::String(_))
            | (Value::Number(_), Value::Number(_))
            | (Value::Bool(_), Value::Bool(_))
    )
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Strings compare case-insensitively and numbers as floats; values of
/// different types order by type.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::String(x), Value::String(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Smallest value of the field, which is what the resource sorts by.
fn sort_value<'a>(field: &JsonPointer, content: &'a Value) -> Option<&'a Value> {
    values_of(field, content)
        .into_iter()
        .min_by(|a, b| compare_values(a, b))
}

fn compare_resources(keys: &[SortKey], a: &ResourceResponse, b: &ResourceResponse) -> Ordering {
    for key in keys {
        let ordering = match (sort_value(&key.field, &a.content), sort_value(&key.field, &b.content)) {
            (None, None) => Ordering::Equal,
            // Missing values sort last in either direction.
            (None, Some(_)) => return Ordering::Greater,
            (Some(_), None) => return Ordering::Less,
            (Some(x), Some(y)) if key.ascending => compare_values(x, y),
            (Some(x), Some(y)) => compare_values(y, x),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json::PatchOperation;
    use crate::path::ResourcePath;
    use serde_json::json;

    fn users() -> ResourcePath {
        ResourcePath::parse("users").unwrap()
    }

    async fn seeded() -> MemoryBackend {
        let backend = MemoryBackend::new();
        let ctx = Context::root();
        for (id, name, age) in [("alice", "Alice", 31), ("bob", "bob", 25), ("carol", "Carol", 47)] {
            backend
                .create_instance(
                    &ctx,
                    CreateRequest::new(users(), json!({"name": name, "age": age}))
                        .with_new_resource_id(id),
                )
                .await
                .unwrap();
        }
        backend
    }

    async fn query_ids(backend: &MemoryBackend, request: QueryRequest) -> (Vec<String>, QueryResponse) {
        let mut ids = Vec::new();
        let mut collect = |r: ResourceResponse| {
            ids.push(r.id.unwrap_or_default());
            true
        };
        let response = backend
            .query_collection(&Context::root(), request, &mut collect)
            .await
            .unwrap();
        (ids, response)
    }

    #[tokio::test]
    async fn test_create_stamps_id_and_revision() {
        let backend = MemoryBackend::new();
        let created = backend
            .create_instance(&Context::root(), CreateRequest::new(users(), json!({"name": "x"})))
            .await
            .unwrap();
        assert_eq!(created.id.as_deref(), Some("0"));
        assert_eq!(created.revision.as_deref(), Some("0"));
        assert_eq!(created.content, json!({"name": "x", "_id": "0", "_rev": "0"}));
    }

    #[tokio::test]
    async fn test_generated_ids_skip_client_ids() {
        let backend = MemoryBackend::new();
        let ctx = Context::root();
        backend
            .create_instance(&ctx, CreateRequest::new(users(), json!({})).with_new_resource_id("0"))
            .await
            .unwrap();
        let generated = backend
            .create_instance(&ctx, CreateRequest::new(users(), json!({})))
            .await
            .unwrap();
        assert_eq!(generated.id.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let backend = seeded().await;
        let err = backend
            .create_instance(
                &Context::root(),
                CreateRequest::new(users(), json!({})).with_new_resource_id("bob"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), 412);
    }

    #[tokio::test]
    async fn test_non_object_content_rejected() {
        let backend = MemoryBackend::new();
        let err = backend
            .create_instance(&Context::root(), CreateRequest::new(users(), json!([1, 2])))
            .await
            .unwrap_err();
        assert_eq!(err.code(), 400);
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_update_checks_revision() {
        let backend = seeded().await;
        let ctx = Context::root();
        let path = ResourcePath::parse("users/bob").unwrap();

        let updated = backend
            .update_instance(&ctx, "bob", UpdateRequest::new(path.clone(), json!({"name": "Bob"})).with_revision("0"))
            .await
            .unwrap();
        assert_eq!(updated.revision.as_deref(), Some("1"));

        let err = backend
            .update_instance(&ctx, "bob", UpdateRequest::new(path, json!({})).with_revision("0"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ResourceError::PreconditionFailed(
                "The resource with ID 'bob' could not be updated because it does not have the required version".into()
            )
        );
    }

    #[tokio::test]
    async fn test_missing_resource_not_found() {
        let backend = MemoryBackend::new();
        let ctx = Context::root();
        let path = ResourcePath::parse("users/nobody").unwrap();
        let err = backend
            .read_instance(&ctx, "nobody", ReadRequest::new(path.clone()))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ResourceError::NotFound(
                "The resource with ID 'nobody' could not be read because it does not exist".into()
            )
        );
        let err = backend
            .delete_instance(&ctx, "nobody", DeleteRequest::new(path.clone()))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ResourceError::NotFound(
                "The resource with ID 'nobody' could not be deleted because it does not exist".into()
            )
        );
        let err = backend
            .patch_instance(&ctx, "nobody", PatchRequest::new(path, Vec::new()))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ResourceError::NotFound(
                "The resource with ID 'nobody' could not be patched because it does not exist".into()
            )
        );
    }

    #[tokio::test]
    async fn test_patch_increments_revision() {
        let backend = seeded().await;
        let patched = backend
            .patch_instance(
                &Context::root(),
                "carol",
                PatchRequest::new(
                    ResourcePath::parse("users/carol").unwrap(),
                    vec![PatchOperation::increment("/age", 1)],
                ),
            )
            .await
            .unwrap();
        assert_eq!(patched.content["age"], 48);
        assert_eq!(patched.revision.as_deref(), Some("1"));
        assert_eq!(patched.content["_rev"], "1");
    }

    #[tokio::test]
    async fn test_clear_action() {
        let backend = seeded().await;
        let ctx = Context::root();
        let response = backend
            .action_collection(&ctx, ActionRequest::new(users(), "clear"))
            .await
            .unwrap();
        assert_eq!(response.content, json!({"cleared": 3}));
        assert!(backend.is_empty());

        let err = backend
            .action_collection(&ctx, ActionRequest::new(users(), "purge"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ResourceError::NotSupported(
                "Unrecognized action ID 'purge'. Supported action IDs: clear".into()
            )
        );
    }

    #[tokio::test]
    async fn test_filter_three_valued_logic() {
        let backend = seeded().await;
        backend
            .create_instance(&Context::root(), CreateRequest::new(users(), json!({"name": "dave"})).with_new_resource_id("dave"))
            .await
            .unwrap();

        let over_30 = QueryFilter::parse("/age gt 30").unwrap();
        let (mut ids, _) = query_ids(&backend, QueryRequest::new(users()).with_query_filter(over_30.clone())).await;
        ids.sort();
        assert_eq!(ids, vec!["alice", "carol"]);

        // dave has no age: undefined under negation too
        let (ids, _) = query_ids(
            &backend,
            QueryRequest::new(users()).with_query_filter(QueryFilter::not(over_30)),
        )
        .await;
        assert_eq!(ids, vec!["bob"]);

        let (mut ids, _) = query_ids(
            &backend,
            QueryRequest::new(users()).with_query_filter(QueryFilter::parse("/name sw \"c\" or /name eq \"BOB\"").unwrap()),
        )
        .await;
        ids.sort();
        assert_eq!(ids, vec!["bob", "carol"]);
    }

    #[tokio::test]
    async fn test_sort_missing_values_last() {
        let backend = seeded().await;
        backend
            .create_instance(&Context::root(), CreateRequest::new(users(), json!({"name": "Ann"})).with_new_resource_id("ann"))
            .await
            .unwrap();
        let (ids, _) = query_ids(
            &backend,
            QueryRequest::new(users()).with_sort_key(SortKey::descending("/age")),
        )
        .await;
        assert_eq!(ids, vec!["carol", "alice", "bob", "ann"]);

        let (ids, _) = query_ids(
            &backend,
            QueryRequest::new(users()).with_sort_key(SortKey::ascending("/name")),
        )
        .await;
        assert_eq!(ids, vec!["alice", "ann", "bob", "carol"]);
    }

    #[tokio::test]
    async fn test_paging_with_cookie() {
        let backend = seeded().await;
        let request = || {
            QueryRequest::new(users())
                .with_sort_key(SortKey::ascending("/age"))
                .with_page_size(2)
                .with_total_paged_results_policy(CountPolicy::Exact)
        };
        let (ids, first) = query_ids(&backend, request()).await;
        assert_eq!(ids, vec!["bob", "alice"]);
        assert_eq!(first.total_paged_results, Some(3));
        assert_eq!(first.remaining_paged_results, Some(1));
        let cookie = first.paged_results_cookie.unwrap();

        let mut ignore = |_: ResourceResponse| true;
        let err = backend
            .query_collection(
                &Context::root(),
                QueryRequest::new(users())
                    .with_sort_key(SortKey::descending("/age"))
                    .with_page_size(2)
                    .with_paged_results_cookie(cookie.clone()),
                &mut ignore,
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ResourceError::BadRequest(
                "The paged results cookie was issued for a different sort order".into()
            )
        );

        let (ids, last) = query_ids(&backend, request().with_paged_results_cookie(cookie)).await;
        assert_eq!(ids, vec!["carol"]);
        assert_eq!(last.paged_results_cookie, None);
    }

    #[tokio::test]
    async fn test_cookie_and_offset_exclusive() {
        let backend = seeded().await;
        let mut ignore = |_: ResourceResponse| true;
        let err = backend
            .query_collection(
                &Context::root(),
                QueryRequest::new(users())
                    .with_page_size(1)
                    .with_paged_results_cookie(STANDARD.encode("1:"))
                    .with_paged_results_offset(1),
                &mut ignore,
            )
            .await
            .unwrap_err();
        assert_eq!(err, ResourceError::BadRequest("Cookies and offsets are mutually exclusive".into()));

        let err = backend
            .query_collection(
                &Context::root(),
                QueryRequest::new(users()).with_page_size(1).with_paged_results_cookie("%%%"),
                &mut ignore,
            )
            .await
            .unwrap_err();
        assert_eq!(err, ResourceError::BadRequest("Invalid paged results cookie".into()));
    }

    #[tokio::test]
    async fn test_page_size_limit_caps_unpaged_query() {
        let backend = seeded().await.with_page_size_limit(2);
        let (ids, response) = query_ids(&backend, QueryRequest::new(users())).await;
        assert_eq!(ids.len(), 2);
        assert!(response.paged_results_cookie.is_some());
    }

    #[tokio::test]
    async fn test_query_by_id_not_supported() {
        let backend = MemoryBackend::new();
        let mut ignore = |_: ResourceResponse| true;
        let err = backend
            .query_collection(&Context::root(), QueryRequest::new(users()).with_query_id("all"), &mut ignore)
            .await
            .unwrap_err();
        assert_eq!(err, ResourceError::NotSupported("Query by ID not supported".into()));
    }

    #[tokio::test]
    async fn test_consumer_can_stop_early() {
        let backend = seeded().await;
        let mut seen = 0;
        let mut first_only = |_: ResourceResponse| {
            seen += 1;
            false
        };
        backend
            .query_collection(&Context::root(), QueryRequest::new(users()), &mut first_only)
            .await
            .unwrap();
        assert_eq!(seen, 1);
    }
}
