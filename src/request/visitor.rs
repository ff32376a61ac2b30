//! Double dispatch over the request kinds.

use serde_json::{json, Value};

use super::{
    ActionRequest, CreateRequest, DeleteRequest, PatchRequest, QueryRequest, ReadRequest,
    ResourceRequest, UpdateRequest,
};

/// One method per request kind. Adding a kind breaks every visitor at
/// compile time.
pub trait RequestVisitor<P> {
    type Output;

    fn visit_action(&mut self, param: P, request: &ActionRequest) -> Self::Output;

    fn visit_create(&mut self, param: P, request: &CreateRequest) -> Self::Output;

    fn visit_read(&mut self, param: P, request: &ReadRequest) -> Self::Output;

    fn visit_update(&mut self, param: P, request: &UpdateRequest) -> Self::Output;

    fn visit_delete(&mut self, param: P, request: &DeleteRequest) -> Self::Output;

    fn visit_patch(&mut self, param: P, request: &PatchRequest) -> Self::Output;

    fn visit_query(&mut self, param: P, request: &QueryRequest) -> Self::Output;
}

/// Renders a request as JSON.
pub(super) struct JsonDescriber;

impl JsonDescriber {
    fn extend(mut base: Value, extra: Value) -> Value {
        if let (Value::Object(target), Value::Object(extra)) = (&mut base, extra) {
            target.extend(extra);
        }
        base
    }
}

impl RequestVisitor<()> for JsonDescriber {
    type Output = Value;

    fn visit_action(&mut self, _: (), request: &ActionRequest) -> Value {
        Self::extend(
            request.base_json(),
            json!({
                "action": request.action,
                "content": request.content,
                "additionalParameters": request.additional_parameters(),
            }),
        )
    }

    fn visit_create(&mut self, _: (), request: &CreateRequest) -> Value {
        Self::extend(
            request.base_json(),
            json!({
                "newResourceId": request.new_resource_id,
                "content": request.content,
            }),
        )
    }

    fn visit_read(&mut self, _: (), request: &ReadRequest) -> Value {
        request.base_json()
    }

    fn visit_update(&mut self, _: (), request: &UpdateRequest) -> Value {
        Self::extend(
            request.base_json(),
            json!({
                "revision": request.revision,
                "content": request.content,
            }),
        )
    }

    fn visit_delete(&mut self, _: (), request: &DeleteRequest) -> Value {
        Self::extend(request.base_json(), json!({ "revision": request.revision }))
    }

    fn visit_patch(&mut self, _: (), request: &PatchRequest) -> Value {
        Self::extend(
            request.base_json(),
            json!({
                "revision": request.revision,
                "patchOperations": request.operations,
            }),
        )
    }

    fn visit_query(&mut self, _: (), request: &QueryRequest) -> Value {
        Self::extend(
            request.base_json(),
            json!({
                "queryId": request.query_id,
                "queryExpression": request.query_expression,
                "queryFilter": request.query_filter.as_ref().map(ToString::to_string),
                "sortKeys": request.sort_keys.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "pageSize": request.page_size,
                "pagedResultsOffset": request.paged_results_offset,
                "pagedResultsCookie": request.paged_results_cookie,
                "totalPagedResultsPolicy": request.total_paged_results_policy,
                "additionalParameters": request.additional_parameters(),
            }),
        )
    }
}
