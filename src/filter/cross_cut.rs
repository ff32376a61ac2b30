//! Filters that carry state from the request to its response.
//!
//! A [`CrossCutFilter`] inspects a request, decides whether to answer it
//! directly, and otherwise produces a `State` value that is handed back to
//! it together with the outcome. Create, read, update, delete and patch
//! share one set of "generic" hooks since they all produce a
//! [`ResourceResponse`].

use async_trait::async_trait;

use crate::context::Context;
use crate::error::{ResourceError, ResourceResult};
use crate::filter::{Filter, Next};
use crate::handler::QueryResourceHandler;
use crate::request::{
    ActionRequest, CreateRequest, DeleteRequest, PatchRequest, QueryRequest, ReadRequest,
    ResourceRequest, UpdateRequest,
};
use crate::response::{ActionResponse, QueryResponse, ResourceResponse};

/// Outcome of a request hook.
pub enum Flow<S, R> {
    /// Forward with this context and remember `state` for the response hook.
    Continue { context: Context, state: S },
    /// Do not forward; this is the outcome.
    Respond(ResourceResult<R>),
}

#[async_trait]
pub trait CrossCutFilter: Send + Sync {
    type State: Send + Sync + 'static;

    async fn filter_action_request(
        &self,
        context: &Context,
        request: &mut ActionRequest,
    ) -> Flow<Self::State, ActionResponse>;

    async fn filter_action_result(
        &self,
        _state: Self::State,
        response: ActionResponse,
    ) -> ResourceResult<ActionResponse> {
        Ok(response)
    }

    async fn filter_action_error(
        &self,
        _state: Self::State,
        error: ResourceError,
    ) -> ResourceResult<ActionResponse> {
        Err(error)
    }

    /// Called for create, read, update, delete and patch.
    async fn filter_generic_request(
        &self,
        context: &Context,
        request: &mut dyn ResourceRequest,
    ) -> Flow<Self::State, ResourceResponse>;

    async fn filter_generic_result(
        &self,
        _state: Self::State,
        response: ResourceResponse,
    ) -> ResourceResult<ResourceResponse> {
        Ok(response)
    }

    async fn filter_generic_error(
        &self,
        _state: Self::State,
        error: ResourceError,
    ) -> ResourceResult<ResourceResponse> {
        Err(error)
    }

    async fn filter_query_request(
        &self,
        context: &Context,
        request: &mut QueryRequest,
    ) -> Flow<Self::State, QueryResponse>;

    /// Called once per streamed resource. `None` drops the resource.
    fn filter_query_resource(
        &self,
        _state: &Self::State,
        resource: ResourceResponse,
    ) -> Option<ResourceResponse> {
        Some(resource)
    }

    async fn filter_query_result(
        &self,
        _state: Self::State,
        response: QueryResponse,
    ) -> ResourceResult<QueryResponse> {
        Ok(response)
    }

    async fn filter_query_error(
        &self,
        _state: Self::State,
        error: ResourceError,
    ) -> ResourceResult<QueryResponse> {
        Err(error)
    }
}

/// Adapts a [`CrossCutFilter`] to a [`Filter`].
pub struct CrossCutAdapter<F> {
    inner: F,
}

pub fn as_filter<F: CrossCutFilter + 'static>(filter: F) -> CrossCutAdapter<F> {
    CrossCutAdapter { inner: filter }
}

impl<F> CrossCutAdapter<F> {
    pub fn inner(&self) -> &F {
        &self.inner
    }
}

/// Shared body of the five generic operations.
macro_rules! generic_operation {
    ($self:ident, $context:ident, $request:ident, $next:ident, $handle:ident) => {{
        let mut $request = $request;
        match $self.inner.filter_generic_request($context, &mut $request).await {
            Flow::Respond(outcome) => outcome,
            Flow::Continue { context, state } => match $next.$handle(&context, $request).await {
                Ok(response) => $self.inner.filter_generic_result(state, response).await,
                Err(error) => $self.inner.filter_generic_error(state, error).await,
            },
        }
    }};
}

#[async_trait]
impl<F: CrossCutFilter + 'static> Filter for CrossCutAdapter<F> {
    async fn filter_action(
        &self,
        context: &Context,
        mut request: ActionRequest,
        next: Next<'_>,
    ) -> ResourceResult<ActionResponse> {
        match self.inner.filter_action_request(context, &mut request).await {
            Flow::Respond(outcome) => outcome,
            Flow::Continue { context, state } => match next.handle_action(&context, request).await {
                Ok(response) => self.inner.filter_action_result(state, response).await,
                Err(error) => self.inner.filter_action_error(state, error).await,
            },
        }
    }

    async fn filter_create(
        &self,
        context: &Context,
        request: CreateRequest,
        next: Next<'_>,
    ) -> ResourceResult<ResourceResponse> {
        generic_operation!(self, context, request, next, handle_create)
    }

    async fn filter_read(
        &self,
        context: &Context,
        request: ReadRequest,
        next: Next<'_>,
    ) -> ResourceResult<ResourceResponse> {
        generic_operation!(self, context, request, next, handle_read)
    }

    async fn filter_update(
        &self,
        context: &Context,
        request: UpdateRequest,
        next: Next<'_>,
    ) -> ResourceResult<ResourceResponse> {
        generic_operation!(self, context, request, next, handle_update)
    }

    async fn filter_delete(
        &self,
        context: &Context,
        request: DeleteRequest,
        next: Next<'_>,
    ) -> ResourceResult<ResourceResponse> {
        generic_operation!(self, context, request, next, handle_delete)
    }

    async fn filter_patch(
        &self,
        context: &Context,
        request: PatchRequest,
        next: Next<'_>,
    ) -> ResourceResult<ResourceResponse> {
        generic_operation!(self, context, request, next, handle_patch)
    }

    async fn filter_query(
        &self,
        context: &Context,
        mut request: QueryRequest,
        handler: &mut dyn QueryResourceHandler,
        next: Next<'_>,
    ) -> ResourceResult<QueryResponse> {
        let (context, state) = match self.inner.filter_query_request(context, &mut request).await {
            Flow::Respond(outcome) => return outcome,
            Flow::Continue { context, state } => (context, state),
        };

        let outcome = {
            let inner = &self.inner;
            let state = &state;
            let mut filtered = |resource: ResourceResponse| match inner.filter_query_resource(state, resource) {
                Some(resource) => handler.handle_resource(resource),
                None => true,
            };
            next.handle_query(&context, request, &mut filtered).await
        };

        match outcome {
            Ok(response) => self.inner.filter_query_result(state, response).await,
            Err(error) => self.inner.filter_query_error(state, error).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SecurityContext;
    use crate::filter::FilterChain;
    use crate::handler::RequestHandler;
    use crate::path::ResourcePath;
    use serde_json::json;

    /// Denies anonymous callers, hides `secret` resources from queries and
    /// stamps the caller on every generic response.
    struct Guard;

    #[async_trait]
    impl CrossCutFilter for Guard {
        type State = String;

        async fn filter_action_request(
            &self,
            context: &Context,
            _: &mut ActionRequest,
        ) -> Flow<String, ActionResponse> {
            caller(context)
        }

        async fn filter_generic_request(
            &self,
            context: &Context,
            request: &mut dyn ResourceRequest,
        ) -> Flow<String, ResourceResponse> {
            request.add_field("".into());
            caller(context)
        }

        async fn filter_generic_result(
            &self,
            state: String,
            mut response: ResourceResponse,
        ) -> ResourceResult<ResourceResponse> {
            response.content["seenBy"] = json!(state);
            Ok(response)
        }

        async fn filter_generic_error(
            &self,
            state: String,
            error: ResourceError,
        ) -> ResourceResult<ResourceResponse> {
            Err(error.with_detail(json!({ "caller": state })))
        }

        async fn filter_query_request(
            &self,
            context: &Context,
            _: &mut QueryRequest,
        ) -> Flow<String, QueryResponse> {
            caller(context)
        }

        fn filter_query_resource(&self, _: &String, resource: ResourceResponse) -> Option<ResourceResponse> {
            (resource.id.as_deref() != Some("secret")).then_some(resource)
        }
    }

    fn caller<R>(context: &Context) -> Flow<String, R> {
        match context.get::<SecurityContext>() {
            Some(security) => Flow::Continue {
                context: context.clone(),
                state: security.authentication_id.clone(),
            },
            None => Flow::Respond(Err(ResourceError::Forbidden("anonymous".into()))),
        }
    }

    /// Serves reads, fails deletes, and streams three resources.
    struct Store;

    #[async_trait]
    impl RequestHandler for Store {
        async fn handle_action(&self, _: &Context, _: ActionRequest) -> ResourceResult<ActionResponse> {
            Ok(ActionResponse::new(json!(null)))
        }
        async fn handle_create(&self, _: &Context, _: CreateRequest) -> ResourceResult<ResourceResponse> {
            Err(ResourceError::NotSupported("create".into()))
        }
        async fn handle_read(&self, _: &Context, r: ReadRequest) -> ResourceResult<ResourceResponse> {
            Ok(ResourceResponse::new(
                Some("1".into()),
                None,
                json!({ "fields": r.fields().len() }),
            ))
        }
        async fn handle_update(&self, _: &Context, _: UpdateRequest) -> ResourceResult<ResourceResponse> {
            Err(ResourceError::NotSupported("update".into()))
        }
        async fn handle_delete(&self, _: &Context, _: DeleteRequest) -> ResourceResult<ResourceResponse> {
            Err(ResourceError::NotFound("gone".into()))
        }
        async fn handle_patch(&self, _: &Context, _: PatchRequest) -> ResourceResult<ResourceResponse> {
            Err(ResourceError::NotSupported("patch".into()))
        }
        async fn handle_query(
            &self,
            _: &Context,
            _: QueryRequest,
            handler: &mut dyn QueryResourceHandler,
        ) -> ResourceResult<QueryResponse> {
            for id in ["a", "secret", "b"] {
                handler.handle_resource(ResourceResponse::new(Some(id.into()), None, json!({})));
            }
            Ok(QueryResponse::default())
        }
    }

    fn chain() -> FilterChain {
        let chain = FilterChain::new(Store, Vec::new());
        chain.add_filter(as_filter(Guard));
        chain
    }

    fn alice() -> Context {
        Context::root().push(SecurityContext::new("alice", Default::default()))
    }

    fn path() -> ResourcePath {
        ResourcePath::parse("things/1").unwrap()
    }

    #[tokio::test]
    async fn test_state_reaches_result_hook() {
        let response = chain().handle_read(&alice(), ReadRequest::new(path())).await.unwrap();
        assert_eq!(response.content, json!({ "fields": 1, "seenBy": "alice" }));
    }

    #[tokio::test]
    async fn test_state_reaches_error_hook() {
        let err = chain()
            .handle_delete(&alice(), DeleteRequest::new(path()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), 404);
        assert_eq!(err.detail(), Some(&json!({ "caller": "alice" })));
    }

    #[tokio::test]
    async fn test_request_hook_can_respond() {
        let err = chain()
            .handle_read(&Context::root(), ReadRequest::new(path()))
            .await
            .unwrap_err();
        assert_eq!(err, ResourceError::Forbidden("anonymous".into()));
    }

    #[tokio::test]
    async fn test_query_resources_can_be_dropped() {
        let mut ids = Vec::new();
        let mut collect = |r: ResourceResponse| {
            ids.push(r.id.unwrap_or_default());
            true
        };
        chain()
            .handle_query(&alice(), QueryRequest::new(path()), &mut collect)
            .await
            .unwrap();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
