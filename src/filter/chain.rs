//! Filters in front of a handler.

use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;

use crate::context::Context;
use crate::error::ResourceResult;
use crate::filter::{Filter, Next};
use crate::handler::{QueryResourceHandler, RequestHandler};
use crate::request::{
    ActionRequest, CreateRequest, DeleteRequest, PatchRequest, QueryRequest, ReadRequest,
    UpdateRequest,
};
use crate::response::{ActionResponse, QueryResponse, ResourceResponse};

/// A handler that passes every request through an ordered list of filters.
///
/// The filter list may change while requests are in flight; each request
/// runs against the list as it was when the request arrived.
pub struct FilterChain {
    target: Arc<dyn RequestHandler>,
    filters: ArcSwap<Vec<Arc<dyn Filter>>>,
}

impl FilterChain {
    pub fn new<H>(target: H, filters: Vec<Arc<dyn Filter>>) -> Self
    where
        H: RequestHandler + 'static,
    {
        Self {
            target: Arc::new(target),
            filters: ArcSwap::from_pointee(filters),
        }
    }

    /// Append a filter; it runs closest to the target.
    pub fn add_filter<F: Filter + 'static>(&self, filter: F) -> Arc<dyn Filter> {
        let filter: Arc<dyn Filter> = Arc::new(filter);
        self.filters.rcu(|filters| {
            let mut next = Vec::clone(filters);
            next.push(filter.clone());
            next
        });
        filter
    }

    /// Insert a filter at `index`, clamped to the end of the list.
    pub fn insert_filter<F: Filter + 'static>(&self, index: usize, filter: F) -> Arc<dyn Filter> {
        let filter: Arc<dyn Filter> = Arc::new(filter);
        self.filters.rcu(|filters| {
            let mut next = Vec::clone(filters);
            next.insert(index.min(next.len()), filter.clone());
            next
        });
        filter
    }

    /// Remove a filter previously returned by `add_filter` or `insert_filter`.
    pub fn remove_filter(&self, filter: &Arc<dyn Filter>) -> bool {
        let mut removed = false;
        self.filters.rcu(|filters| {
            let mut next = Vec::clone(filters);
            next.retain(|f| !std::ptr::addr_eq(Arc::as_ptr(f), Arc::as_ptr(filter)));
            removed = next.len() != filters.len();
            next
        });
        removed
    }

    pub fn set_filters(&self, filters: Vec<Arc<dyn Filter>>) {
        self.filters.store(Arc::new(filters));
    }

    /// Snapshot of the current filter list.
    pub fn filters(&self) -> Vec<Arc<dyn Filter>> {
        Vec::clone(&self.filters.load())
    }

    pub fn target(&self) -> &Arc<dyn RequestHandler> {
        &self.target
    }
}

#[async_trait]
impl RequestHandler for FilterChain {
    async fn handle_action(
        &self,
        context: &Context,
        request: ActionRequest,
    ) -> ResourceResult<ActionResponse> {
        let filters = self.filters.load_full();
        Next::new(&filters, self.target.as_ref())
            .handle_action(context, request)
            .await
    }

    async fn handle_create(
        &self,
        context: &Context,
        request: CreateRequest,
    ) -> ResourceResult<ResourceResponse> {
        let filters = self.filters.load_full();
        Next::new(&filters, self.target.as_ref())
            .handle_create(context, request)
            .await
    }

    async fn handle_read(
        &self,
        context: &Context,
        request: ReadRequest,
    ) -> ResourceResult<ResourceResponse> {
        let filters = self.filters.load_full();
        Next::new(&filters, self.target.as_ref())
            .handle_read(context, request)
            .await
    }

    async fn handle_update(
        &self,
        context: &Context,
        request: UpdateRequest,
    ) -> ResourceResult<ResourceResponse> {
        let filters = self.filters.load_full();
        Next::new(&filters, self.target.as_ref())
            .handle_update(context, request)
            .await
    }

    async fn handle_delete(
        &self,
        context: &Context,
        request: DeleteRequest,
    ) -> ResourceResult<ResourceResponse> {
        let filters = self.filters.load_full();
        Next::new(&filters, self.target.as_ref())
            .handle_delete(context, request)
            .await
    }

    async fn handle_patch(
        &self,
        context: &Context,
        request: PatchRequest,
    ) -> ResourceResult<ResourceResponse> {
        let filters = self.filters.load_full();
        Next::new(&filters, self.target.as_ref())
            .handle_patch(context, request)
            .await
    }

    async fn handle_query(
        &self,
        context: &Context,
        request: QueryRequest,
        handler: &mut dyn QueryResourceHandler,
    ) -> ResourceResult<QueryResponse> {
        let filters = self.filters.load_full();
        Next::new(&filters, self.target.as_ref())
            .handle_query(context, request, handler)
            .await
    }
}
