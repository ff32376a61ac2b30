//! A request handler assembled from per-operation closures.
//!
//! Build one with [`RegisteredHandler::builder`], registering an async
//! closure for each operation the resource supports. Operations without a
//! registration fail with NotSupported.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::context::Context;
use crate::error::{ResourceError, ResourceResult};
use crate::handler::{QueryResourceHandler, RequestHandler};
use crate::request::{
    ActionRequest, CreateRequest, DeleteRequest, PatchRequest, QueryRequest, ReadRequest,
    RequestType, UpdateRequest,
};
use crate::response::{ActionResponse, QueryResponse, ResourceResponse};

type Operation<R, T> = Arc<dyn Fn(Context, R) -> BoxFuture<'static, ResourceResult<T>> + Send + Sync>;

/// Resources and terminal response of a registered query.
pub type QueryOutcome = (Vec<ResourceResponse>, QueryResponse);

fn boxed<R, T, F, Fut>(f: F) -> Operation<R, T>
where
    F: Fn(Context, R) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ResourceResult<T>> + Send + 'static,
{
    Arc::new(move |context, request| f(context, request).boxed())
}

fn unsupported(request_type: RequestType) -> ResourceError {
    let name = match request_type {
        RequestType::Action => "Action",
        RequestType::Create => "Create",
        RequestType::Read => "Read",
        RequestType::Update => "Update",
        RequestType::Delete => "Delete",
        RequestType::Patch => "Patch",
        RequestType::Query => "Query",
    };
    ResourceError::NotSupported(format!("{name} operations are not supported by this resource"))
}

#[derive(Default, Clone)]
pub struct RegisteredHandler {
    action: Option<Operation<ActionRequest, ActionResponse>>,
    create: Option<Operation<CreateRequest, ResourceResponse>>,
    read: Option<Operation<ReadRequest, ResourceResponse>>,
    update: Option<Operation<UpdateRequest, ResourceResponse>>,
    delete: Option<Operation<DeleteRequest, ResourceResponse>>,
    patch: Option<Operation<PatchRequest, ResourceResponse>>,
    query: Option<Operation<QueryRequest, QueryOutcome>>,
}

impl RegisteredHandler {
    pub fn builder() -> RegisteredHandlerBuilder {
        RegisteredHandlerBuilder::default()
    }

    /// Operations with a registration.
    pub fn supported(&self) -> Vec<RequestType> {
        let registered = [
            self.action.is_some(),
            self.create.is_some(),
            self.read.is_some(),
            self.update.is_some(),
            self.delete.is_some(),
            self.patch.is_some(),
            self.query.is_some(),
        ];
        RequestType::ALL
            .into_iter()
            .zip(registered)
            .filter_map(|(request_type, present)| present.then_some(request_type))
            .collect()
    }
}

/// Collects registrations; registering an operation twice keeps the last.
#[derive(Default)]
pub struct RegisteredHandlerBuilder {
    handler: RegisteredHandler,
}

impl RegisteredHandlerBuilder {
    pub fn action<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Context, ActionRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResourceResult<ActionResponse>> + Send + 'static,
    {
        self.handler.action = Some(boxed(f));
        self
    }

    pub fn create<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Context, CreateRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResourceResult<ResourceResponse>> + Send + 'static,
    {
        self.handler.create = Some(boxed(f));
        self
    }

    pub fn read<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Context, ReadRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResourceResult<ResourceResponse>> + Send + 'static,
    {
        self.handler.read = Some(boxed(f));
        self
    }

    pub fn update<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Context, UpdateRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResourceResult<ResourceResponse>> + Send + 'static,
    {
        self.handler.update = Some(boxed(f));
        self
    }

    pub fn delete<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Context, DeleteRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResourceResult<ResourceResponse>> + Send + 'static,
    {
        self.handler.delete = Some(boxed(f));
        self
    }

    pub fn patch<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Context, PatchRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResourceResult<ResourceResponse>> + Send + 'static,
    {
        self.handler.patch = Some(boxed(f));
        self
    }

    /// The closure returns every resource at once; they are streamed to
    /// the caller in order until it asks to stop.
    pub fn query<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Context, QueryRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResourceResult<QueryOutcome>> + Send + 'static,
    {
        self.handler.query = Some(boxed(f));
        self
    }

    pub fn build(self) -> RegisteredHandler {
        self.handler
    }
}

#[async_trait]
impl RequestHandler for RegisteredHandler {
    async fn handle_action(
        &self,
        context: &Context,
        request: ActionRequest,
    ) -> ResourceResult<ActionResponse> {
        match &self.action {
            Some(op) => op(context.clone(), request).await,
            None => Err(unsupported(RequestType::Action)),
        }
    }

    async fn handle_create(
        &self,
        context: &Context,
        request: CreateRequest,
    ) -> ResourceResult<ResourceResponse> {
        match &self.create {
            Some(op) => op(context.clone(), request).await,
            None => Err(unsupported(RequestType::Create)),
        }
    }

    async fn handle_read(
        &self,
        context: &Context,
        request: ReadRequest,
    ) -> ResourceResult<ResourceResponse> {
        match &self.read {
            Some(op) => op(context.clone(), request).await,
            None => Err(unsupported(RequestType::Read)),
        }
    }

    async fn handle_update(
        &self,
        context: &Context,
        request: UpdateRequest,
    ) -> ResourceResult<ResourceResponse> {
        match &self.update {
            Some(op) => op(context.clone(), request).await,
            None => Err(unsupported(RequestType::Update)),
        }
    }

    async fn handle_delete(
        &self,
        context: &Context,
        request: DeleteRequest,
    ) -> ResourceResult<ResourceResponse> {
        match &self.delete {
            Some(op) => op(context.clone(), request).await,
            None => Err(unsupported(RequestType::Delete)),
        }
    }

    async fn handle_patch(
        &self,
        context: &Context,
        request: PatchRequest,
    ) -> ResourceResult<ResourceResponse> {
        match &self.patch {
            Some(op) => op(context.clone(), request).await,
            None => Err(unsupported(RequestType::Patch)),
        }
    }

    async fn handle_query(
        &self,
        context: &Context,
        request: QueryRequest,
        handler: &mut dyn QueryResourceHandler,
    ) -> ResourceResult<QueryResponse> {
        let Some(op) = &self.query else {
            return Err(unsupported(RequestType::Query));
        };
        let (resources, response) = op(context.clone(), request).await?;
        for resource in resources {
            if !handler.handle_resource(resource) {
                break;
            }
        }
        Ok(response)
    }
}
