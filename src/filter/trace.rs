//! Per-request span, log line and metrics.

use std::time::Instant;

use async_trait::async_trait;
use tracing::Instrument;

use crate::context::Context;
use crate::error::ResourceResult;
use crate::filter::{Filter, Next};
use crate::handler::QueryResourceHandler;
use crate::observability::{metrics, tracing::{record_outcome, request_span}};
use crate::request::{
    ActionRequest, CreateRequest, DeleteRequest, PatchRequest, QueryRequest, ReadRequest,
    RequestType, ResourceRequest, UpdateRequest,
};
use crate::response::{ActionResponse, QueryResponse, ResourceResponse};

/// Wraps every request in a `request` span and records its outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingFilter;

impl TracingFilter {
    pub fn new() -> Self {
        Self
    }
}

fn finish<T>(span: &tracing::Span, request_type: RequestType, start: Instant, result: &ResourceResult<T>) {
    let code = record_outcome(span, result, start.elapsed().as_millis());
    metrics::record_request(request_type, code, start);
    let _entered = span.enter();
    match result {
        Ok(_) => tracing::debug!(code, "Request completed"),
        Err(e) if e.is_server_error() => tracing::error!(code, error = %e, "Request failed"),
        Err(e) => tracing::info!(code, error = %e, "Request rejected"),
    }
}

/// Shared body of the six non-query operations.
macro_rules! traced {
    ($context:ident, $request:ident, $next:ident, $handle:ident) => {{
        let span = request_span($context, &$request);
        let request_type = $request.request_type();
        let start = Instant::now();
        let result = $next
            .$handle($context, $request)
            .instrument(span.clone())
            .await;
        finish(&span, request_type, start, &result);
        result
    }};
}

#[async_trait]
impl Filter for TracingFilter {
    async fn filter_action(
        &self,
        context: &Context,
        request: ActionRequest,
        next: Next<'_>,
    ) -> ResourceResult<ActionResponse> {
        traced!(context, request, next, handle_action)
    }

    async fn filter_create(
        &self,
        context: &Context,
        request: CreateRequest,
        next: Next<'_>,
    ) -> ResourceResult<ResourceResponse> {
        traced!(context, request, next, handle_create)
    }

    async fn filter_read(
        &self,
        context: &Context,
        request: ReadRequest,
        next: Next<'_>,
    ) -> ResourceResult<ResourceResponse> {
        traced!(context, request, next, handle_read)
    }

    async fn filter_update(
        &self,
        context: &Context,
        request: UpdateRequest,
        next: Next<'_>,
    ) -> ResourceResult<ResourceResponse> {
        traced!(context, request, next, handle_update)
    }

    async fn filter_delete(
        &self,
        context: &Context,
        request: DeleteRequest,
        next: Next<'_>,
    ) -> ResourceResult<ResourceResponse> {
        traced!(context, request, next, handle_delete)
    }

    async fn filter_patch(
        &self,
        context: &Context,
        request: PatchRequest,
        next: Next<'_>,
    ) -> ResourceResult<ResourceResponse> {
        traced!(context, request, next, handle_patch)
    }

    async fn filter_query(
        &self,
        context: &Context,
        request: QueryRequest,
        handler: &mut dyn QueryResourceHandler,
        next: Next<'_>,
    ) -> ResourceResult<QueryResponse> {
        let span = request_span(context, &request);
        let start = Instant::now();
        let mut streamed = 0usize;
        let result = {
            let mut counting = |resource: ResourceResponse| {
                streamed += 1;
                handler.handle_resource(resource)
            };
            next.handle_query(context, request, &mut counting)
                .instrument(span.clone())
                .await
        };
        span.record("streamed", streamed as u64);
        finish(&span, RequestType::Query, start, &result);
        result
    }
}
