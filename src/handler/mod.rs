//! The uniform request handler interface.
//!
//! Routers, filter chains, version routers and provider adapters all
//! implement [`RequestHandler`], so they nest freely.
//!
//! # Design Decisions
//! - Every method is async; callers never assume synchronous completion
//! - A returned `Result` is the single terminal outcome of a request
//! - Query results stream through a `QueryResourceHandler` before the
//!   terminal `QueryResponse` is returned; the `&mut` borrow keeps the
//!   callbacks for one request strictly sequential

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::ResourceResult;
use crate::request::{
    ActionRequest, CreateRequest, DeleteRequest, PatchRequest, QueryRequest, ReadRequest, Request,
    UpdateRequest,
};
use crate::response::{ActionResponse, QueryResponse, ResourceResponse, Response};

/// Receives query results one at a time.
pub trait QueryResourceHandler: Send {
    /// Return `false` to ask the provider to stop sending resources.
    fn handle_resource(&mut self, resource: ResourceResponse) -> bool;
}

impl<F> QueryResourceHandler for F
where
    F: FnMut(ResourceResponse) -> bool + Send,
{
    fn handle_resource(&mut self, resource: ResourceResponse) -> bool {
        self(resource)
    }
}

/// Handles all seven request kinds.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle_action(
        &self,
        context: &Context,
        request: ActionRequest,
    ) -> ResourceResult<ActionResponse>;

    async fn handle_create(
        &self,
        context: &Context,
        request: CreateRequest,
    ) -> ResourceResult<ResourceResponse>;

    async fn handle_read(
        &self,
        context: &Context,
        request: ReadRequest,
    ) -> ResourceResult<ResourceResponse>;

    async fn handle_update(
        &self,
        context: &Context,
        request: UpdateRequest,
    ) -> ResourceResult<ResourceResponse>;

    async fn handle_delete(
        &self,
        context: &Context,
        request: DeleteRequest,
    ) -> ResourceResult<ResourceResponse>;

    async fn handle_patch(
        &self,
        context: &Context,
        request: PatchRequest,
    ) -> ResourceResult<ResourceResponse>;

    async fn handle_query(
        &self,
        context: &Context,
        request: QueryRequest,
        handler: &mut dyn QueryResourceHandler,
    ) -> ResourceResult<QueryResponse>;
}

#[async_trait]
impl<T: RequestHandler + ?Sized> RequestHandler for Arc<T> {
    async fn handle_action(
        &self,
        context: &Context,
        request: ActionRequest,
    ) -> ResourceResult<ActionResponse> {
        (**self).handle_action(context, request).await
    }

    async fn handle_create(
        &self,
        context: &Context,
        request: CreateRequest,
    ) -> ResourceResult<ResourceResponse> {
        (**self).handle_create(context, request).await
    }

    async fn handle_read(
        &self,
        context: &Context,
        request: ReadRequest,
    ) -> ResourceResult<ResourceResponse> {
        (**self).handle_read(context, request).await
    }

    async fn handle_update(
        &self,
        context: &Context,
        request: UpdateRequest,
    ) -> ResourceResult<ResourceResponse> {
        (**self).handle_update(context, request).await
    }

    async fn handle_delete(
        &self,
        context: &Context,
        request: DeleteRequest,
    ) -> ResourceResult<ResourceResponse> {
        (**self).handle_delete(context, request).await
    }

    async fn handle_patch(
        &self,
        context: &Context,
        request: PatchRequest,
    ) -> ResourceResult<ResourceResponse> {
        (**self).handle_patch(context, request).await
    }

    async fn handle_query(
        &self,
        context: &Context,
        request: QueryRequest,
        handler: &mut dyn QueryResourceHandler,
    ) -> ResourceResult<QueryResponse> {
        (**self).handle_query(context, request, handler).await
    }
}

/// Send any request to the matching `handle_*` method.
pub async fn dispatch(
    target: &dyn RequestHandler,
    context: &Context,
    request: Request,
    results: &mut dyn QueryResourceHandler,
) -> ResourceResult<Response> {
    match request {
        Request::Action(r) => target.handle_action(context, r).await.map(Response::Action),
        Request::Create(r) => target.handle_create(context, r).await.map(Response::Resource),
        Request::Read(r) => target.handle_read(context, r).await.map(Response::Resource),
        Request::Update(r) => target.handle_update(context, r).await.map(Response::Resource),
        Request::Delete(r) => target.handle_delete(context, r).await.map(Response::Resource),
        Request::Patch(r) => target.handle_patch(context, r).await.map(Response::Resource),
        Request::Query(r) => target
            .handle_query(context, r, results)
            .await
            .map(Response::Query),
    }
}
