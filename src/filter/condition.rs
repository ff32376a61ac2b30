//! Applying a filter only to some requests.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;

use crate::context::Context;
use crate::error::{ResourceError, ResourceResult};
use crate::filter::{Filter, Next};
use crate::handler::QueryResourceHandler;
use crate::request::{
    ActionRequest, CreateRequest, DeleteRequest, PatchRequest, QueryRequest, ReadRequest,
    RequestType, ResourceRequest, UpdateRequest,
};
use crate::response::{ActionResponse, QueryResponse, ResourceResponse};

/// A predicate over a request and its context.
pub trait FilterCondition: Send + Sync {
    fn matches(&self, context: &Context, request: &dyn ResourceRequest) -> bool;
}

impl<F> FilterCondition for F
where
    F: Fn(&Context, &dyn ResourceRequest) -> bool + Send + Sync,
{
    fn matches(&self, context: &Context, request: &dyn ResourceRequest) -> bool {
        self(context, request)
    }
}

pub fn always() -> Arc<dyn FilterCondition> {
    Arc::new(|_: &Context, _: &dyn ResourceRequest| true)
}

pub fn never() -> Arc<dyn FilterCondition> {
    Arc::new(|_: &Context, _: &dyn ResourceRequest| false)
}

/// True for requests of any of `types`.
pub fn match_request_type<I>(types: I) -> Arc<dyn FilterCondition>
where
    I: IntoIterator<Item = RequestType>,
{
    let types: HashSet<RequestType> = types.into_iter().collect();
    Arc::new(move |_: &Context, request: &dyn ResourceRequest| {
        types.contains(&request.request_type())
    })
}

/// True when `pattern` matches the whole resource path as routed to the
/// filter.
pub fn match_resource_path(pattern: &str) -> ResourceResult<Arc<dyn FilterCondition>> {
    let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
        ResourceError::BadRequest(format!("Invalid resource path pattern '{pattern}': {e}"))
    })?;
    Ok(Arc::new(move |_: &Context, request: &dyn ResourceRequest| {
        regex.is_match(request.resource_path().as_str())
    }))
}

/// True when every condition is true. Empty is true.
pub fn and(conditions: Vec<Arc<dyn FilterCondition>>) -> Arc<dyn FilterCondition> {
    Arc::new(move |context: &Context, request: &dyn ResourceRequest| {
        conditions.iter().all(|c| c.matches(context, request))
    })
}

/// True when any condition is true. Empty is false.
pub fn or(conditions: Vec<Arc<dyn FilterCondition>>) -> Arc<dyn FilterCondition> {
    Arc::new(move |context: &Context, request: &dyn ResourceRequest| {
        conditions.iter().any(|c| c.matches(context, request))
    })
}

pub fn not(condition: Arc<dyn FilterCondition>) -> Arc<dyn FilterCondition> {
    Arc::new(move |context: &Context, request: &dyn ResourceRequest| {
        !condition.matches(context, request)
    })
}

/// Runs `filter` for requests matching `condition`; others go straight
/// to the rest of the chain.
pub struct ConditionalFilter<F> {
    condition: Arc<dyn FilterCondition>,
    filter: F,
}

pub fn conditional_filter<F: Filter>(
    condition: Arc<dyn FilterCondition>,
    filter: F,
) -> ConditionalFilter<F> {
    ConditionalFilter { condition, filter }
}

#[async_trait]
impl<F: Filter> Filter for ConditionalFilter<F> {
    async fn filter_action(
        &self,
        context: &Context,
        request: ActionRequest,
        next: Next<'_>,
    ) -> ResourceResult<ActionResponse> {
        if self.condition.matches(context, &request) {
            self.filter.filter_action(context, request, next).await
        } else {
            next.handle_action(context, request).await
        }
    }

    async fn filter_create(
        &self,
        context: &Context,
        request: CreateRequest,
        next: Next<'_>,
    ) -> ResourceResult<ResourceResponse> {
        if self.condition.matches(context, &request) {
            self.filter.filter_create(context, request, next).await
        } else {
            next.handle_create(context, request).await
        }
    }

    async fn filter_read(
        &self,
        context: &Context,
        request: ReadRequest,
        next: Next<'_>,
    ) -> ResourceResult<ResourceResponse> {
        if self.condition.matches(context, &request) {
            self.filter.filter_read(context, request, next).await
        } else {
            next.handle_read(context, request).await
        }
    }

    async fn filter_update(
        &self,
        context: &Context,
        request: UpdateRequest,
        next: Next<'_>,
    ) -> ResourceResult<ResourceResponse> {
        if self.condition.matches(context, &request) {
            self.filter.filter_update(context, request, next).await
        } else {
            next.handle_update(context, request).await
        }
    }

    async fn filter_delete(
        &self,
        context: &Context,
        request: DeleteRequest,
        next: Next<'_>,
    ) -> ResourceResult<ResourceResponse> {
        if self.condition.matches(context, &request) {
            self.filter.filter_delete(context, request, next).await
        } else {
            next.handle_delete(context, request).await
        }
    }

    async fn filter_patch(
        &self,
        context: &Context,
        request: PatchRequest,
        next: Next<'_>,
    ) -> ResourceResult<ResourceResponse> {
        if self.condition.matches(context, &request) {
            self.filter.filter_patch(context, request, next).await
        } else {
            next.handle_patch(context, request).await
        }
    }

    async fn filter_query(
        &self,
        context: &Context,
        request: QueryRequest,
        handler: &mut dyn QueryResourceHandler,
        next: Next<'_>,
    ) -> ResourceResult<QueryResponse> {
        if self.condition.matches(context, &request) {
            self.filter.filter_query(context, request, handler, next).await
        } else {
            next.handle_query(context, request, handler).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::ResourcePath;

    fn read(path: &str) -> ReadRequest {
        ReadRequest::new(ResourcePath::parse(path).unwrap())
    }

    #[test]
    fn test_request_type_condition() {
        let ctx = Context::root();
        let reads_and_queries = match_request_type([RequestType::Read, RequestType::Query]);
        assert!(reads_and_queries.matches(&ctx, &read("a")));
        let delete = DeleteRequest::new(ResourcePath::empty());
        assert!(!reads_and_queries.matches(&ctx, &delete));
    }

    #[test]
    fn test_resource_path_condition_matches_whole_path() {
        let ctx = Context::root();
        let users = match_resource_path("users(/.*)?").unwrap();
        assert!(users.matches(&ctx, &read("users")));
        assert!(users.matches(&ctx, &read("users/42")));
        assert!(!users.matches(&ctx, &read("admin/users")));
        assert!(match_resource_path("(").is_err());
    }

    #[test]
    fn test_combinators() {
        let ctx = Context::root();
        let request = read("users/1");
        assert!(and(vec![]).matches(&ctx, &request));
        assert!(!or(vec![]).matches(&ctx, &request));
        assert!(or(vec![never(), always()]).matches(&ctx, &request));
        assert!(!and(vec![always(), never()]).matches(&ctx, &request));
        assert!(not(never()).matches(&ctx, &request));
    }
}
