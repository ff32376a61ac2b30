//! In-process connection to a request handler.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::ConnectionConfig;
use crate::connection::handle::RequestHandle;
use crate::connection::QueryResultHandler;
use crate::context::Context;
use crate::error::ResourceResult;
use crate::handler::{QueryResourceHandler, RequestHandler};
use crate::request::{
    ActionRequest, CreateRequest, DeleteRequest, PatchRequest, QueryRequest, ReadRequest,
    UpdateRequest,
};
use crate::resources::QueryOutcome;
use crate::response::{ActionResponse, QueryResponse, ResourceResponse};

/// Sends requests straight to a handler, without serialization.
#[derive(Clone)]
pub struct InternalConnection {
    handler: Arc<dyn RequestHandler>,
    wait_timeout: Option<Duration>,
}

/// Spawning variant of a single-response operation.
macro_rules! spawning {
    ($name:ident, $request:ty, $response:ty, $handle:ident) => {
        pub fn $name(&self, context: &Context, request: $request) -> RequestHandle<$response> {
            let handler = self.handler.clone();
            let context = context.clone();
            RequestHandle::spawn(
                async move { handler.$handle(&context, request).await },
                |_| {},
                self.wait_timeout,
            )
        }
    };
}

impl InternalConnection {
    pub fn new(handler: Arc<dyn RequestHandler>) -> Self {
        Self {
            handler,
            wait_timeout: None,
        }
    }

    pub fn with_config(mut self, config: &ConnectionConfig) -> Self {
        self.wait_timeout = config.wait_timeout();
        self
    }

    /// Bound applied by [`RequestHandle::wait`]. `None` waits forever.
    pub fn with_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.wait_timeout = timeout;
        self
    }

    pub fn handler(&self) -> &Arc<dyn RequestHandler> {
        &self.handler
    }

    pub async fn action(
        &self,
        context: &Context,
        request: ActionRequest,
    ) -> ResourceResult<ActionResponse> {
        self.handler.handle_action(context, request).await
    }

    pub async fn create(
        &self,
        context: &Context,
        request: CreateRequest,
    ) -> ResourceResult<ResourceResponse> {
        self.handler.handle_create(context, request).await
    }

    pub async fn read(
        &self,
        context: &Context,
        request: ReadRequest,
    ) -> ResourceResult<ResourceResponse> {
        self.handler.handle_read(context, request).await
    }

    pub async fn update(
        &self,
        context: &Context,
        request: UpdateRequest,
    ) -> ResourceResult<ResourceResponse> {
        self.handler.handle_update(context, request).await
    }

    pub async fn delete(
        &self,
        context: &Context,
        request: DeleteRequest,
    ) -> ResourceResult<ResourceResponse> {
        self.handler.handle_delete(context, request).await
    }

    pub async fn patch(
        &self,
        context: &Context,
        request: PatchRequest,
    ) -> ResourceResult<ResourceResponse> {
        self.handler.handle_patch(context, request).await
    }

    pub async fn query(
        &self,
        context: &Context,
        request: QueryRequest,
        handler: &mut dyn QueryResourceHandler,
    ) -> ResourceResult<QueryResponse> {
        self.handler.handle_query(context, request, handler).await
    }

    /// Query gathering every streamed resource.
    pub async fn query_collect(
        &self,
        context: &Context,
        request: QueryRequest,
    ) -> ResourceResult<QueryOutcome> {
        let mut resources = Vec::new();
        let mut collect = |resource: ResourceResponse| {
            resources.push(resource);
            true
        };
        let response = self.query(context, request, &mut collect).await?;
        Ok((resources, response))
    }

    spawning!(action_async, ActionRequest, ActionResponse, handle_action);
    spawning!(create_async, CreateRequest, ResourceResponse, handle_create);
    spawning!(read_async, ReadRequest, ResourceResponse, handle_read);
    spawning!(update_async, UpdateRequest, ResourceResponse, handle_update);
    spawning!(delete_async, DeleteRequest, ResourceResponse, handle_delete);
    spawning!(patch_async, PatchRequest, ResourceResponse, handle_patch);

    /// Runs the query on its own task, streaming to `results`.
    ///
    /// `results` receives exactly one of `handle_result` or `handle_error`
    /// after the last resource, including when the query is cancelled.
    pub fn query_async<H>(
        &self,
        context: &Context,
        request: QueryRequest,
        results: H,
    ) -> RequestHandle<QueryResponse>
    where
        H: QueryResultHandler + 'static,
    {
        let handler = self.handler.clone();
        let context = context.clone();
        let results = Arc::new(Mutex::new(results));
        let streaming = results.clone();
        RequestHandle::spawn(
            async move {
                let mut forward = |resource: ResourceResponse| match streaming.lock() {
                    Ok(mut results) => results.handle_resource(resource),
                    Err(_) => false,
                };
                handler.handle_query(&context, request, &mut forward).await
            },
            move |outcome| {
                let mut results = match results.lock() {
                    Ok(results) => results,
                    Err(poisoned) => poisoned.into_inner(),
                };
                match outcome {
                    Ok(response) => results.handle_result(response.clone()),
                    Err(e) => results.handle_error(e.clone()),
                }
            },
            self.wait_timeout,
        )
    }
}
