//! Request filters.
//!
//! # Data Flow
//! ```text
//! FilterChain (a RequestHandler)
//!     → snapshot of filters [f1, f2, ..., fn]
//!     → f1.filter_x(ctx, request, Next[f2..fn → target])
//!         → may answer itself (Ok / Err)
//!         → or call next.handle_x(ctx', request') once, then inspect the result
//!     → target.handle_x when the filters are exhausted
//! ```
//!
//! # Design Decisions
//! - `Next` is consumed by forwarding, so a filter can forward at most once
//! - A filter returns one `Result`; exactly one terminal outcome per request
//!   is a property of the types, not a runtime check
//! - Default trait methods forward, so a filter only implements what it
//!   intercepts

pub mod chain;
pub mod condition;
pub mod cross_cut;
pub mod trace;

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::ResourceResult;
use crate::handler::{QueryResourceHandler, RequestHandler};
use crate::request::{
    ActionRequest, CreateRequest, DeleteRequest, PatchRequest, QueryRequest, ReadRequest,
    UpdateRequest,
};
use crate::response::{ActionResponse, QueryResponse, ResourceResponse};

pub use chain::FilterChain;
pub use condition::{
    always, and, conditional_filter, match_request_type, match_resource_path, never, not, or,
    ConditionalFilter, FilterCondition,
};
pub use cross_cut::{as_filter, CrossCutAdapter, CrossCutFilter, Flow};
pub use trace::TracingFilter;

/// Intercepts requests on their way to a handler.
#[async_trait]
pub trait Filter: Send + Sync {
    async fn filter_action(
        &self,
        context: &Context,
        request: ActionRequest,
        next: Next<'_>,
    ) -> ResourceResult<ActionResponse> {
        next.handle_action(context, request).await
    }

    async fn filter_create(
        &self,
        context: &Context,
        request: CreateRequest,
        next: Next<'_>,
    ) -> ResourceResult<ResourceResponse> {
        next.handle_create(context, request).await
    }

    async fn filter_read(
        &self,
        context: &Context,
        request: ReadRequest,
        next: Next<'_>,
    ) -> ResourceResult<ResourceResponse> {
        next.handle_read(context, request).await
    }

    async fn filter_update(
        &self,
        context: &Context,
        request: UpdateRequest,
        next: Next<'_>,
    ) -> ResourceResult<ResourceResponse> {
        next.handle_update(context, request).await
    }

    async fn filter_delete(
        &self,
        context: &Context,
        request: DeleteRequest,
        next: Next<'_>,
    ) -> ResourceResult<ResourceResponse> {
        next.handle_delete(context, request).await
    }

    async fn filter_patch(
        &self,
        context: &Context,
        request: PatchRequest,
        next: Next<'_>,
    ) -> ResourceResult<ResourceResponse> {
        next.handle_patch(context, request).await
    }

    async fn filter_query(
        &self,
        context: &Context,
        request: QueryRequest,
        handler: &mut dyn QueryResourceHandler,
        next: Next<'_>,
    ) -> ResourceResult<QueryResponse> {
        next.handle_query(context, request, handler).await
    }
}

#[async_trait]
impl<F: Filter + ?Sized> Filter for Arc<F> {
    async fn filter_action(
        &self,
        context: &Context,
        request: ActionRequest,
        next: Next<'_>,
    ) -> ResourceResult<ActionResponse> {
        (**self).filter_action(context, request, next).await
    }

    async fn filter_create(
        &self,
        context: &Context,
        request: CreateRequest,
        next: Next<'_>,
    ) -> ResourceResult<ResourceResponse> {
        (**self).filter_create(context, request, next).await
    }

    async fn filter_read(
        &self,
        context: &Context,
        request: ReadRequest,
        next: Next<'_>,
    ) -> ResourceResult<ResourceResponse> {
        (**self).filter_read(context, request, next).await
    }

    async fn filter_update(
        &self,
        context: &Context,
        request: UpdateRequest,
        next: Next<'_>,
    ) -> ResourceResult<ResourceResponse> {
        (**self).filter_update(context, request, next).await
    }

    async fn filter_delete(
        &self,
        context: &Context,
        request: DeleteRequest,
        next: Next<'_>,
    ) -> ResourceResult<ResourceResponse> {
        (**self).filter_delete(context, request, next).await
    }

    async fn filter_patch(
        &self,
        context: &Context,
        request: PatchRequest,
        next: Next<'_>,
    ) -> ResourceResult<ResourceResponse> {
        (**self).filter_patch(context, request, next).await
    }

    async fn filter_query(
        &self,
        context: &Context,
        request: QueryRequest,
        handler: &mut dyn QueryResourceHandler,
        next: Next<'_>,
    ) -> ResourceResult<QueryResponse> {
        (**self).filter_query(context, request, handler, next).await
    }
}

/// The remainder of a filter chain. Each method consumes it.
pub struct Next<'a> {
    filters: &'a [Arc<dyn Filter>],
    target: &'a dyn RequestHandler,
}

impl<'a> Next<'a> {
    pub fn new(filters: &'a [Arc<dyn Filter>], target: &'a dyn RequestHandler) -> Self {
        Self { filters, target }
    }

    /// Filters still ahead of the target.
    pub fn remaining(&self) -> usize {
        self.filters.len()
    }

    fn split(self) -> Result<(&'a Arc<dyn Filter>, Next<'a>), &'a dyn RequestHandler> {
        match self.filters.split_first() {
            Some((filter, rest)) => Ok((
                filter,
                Next {
                    filters: rest,
                    target: self.target,
                },
            )),
            None => Err(self.target),
        }
    }

    pub async fn handle_action(
        self,
        context: &Context,
        request: ActionRequest,
    ) -> ResourceResult<ActionResponse> {
        match self.split() {
            Ok((filter, next)) => filter.filter_action(context, request, next).await,
            Err(target) => target.handle_action(context, request).await,
        }
    }

    pub async fn handle_create(
        self,
        context: &Context,
        request: CreateRequest,
    ) -> ResourceResult<ResourceResponse> {
        match self.split() {
            Ok((filter, next)) => filter.filter_create(context, request, next).await,
            Err(target) => target.handle_create(context, request).await,
        }
    }

    pub async fn handle_read(
        self,
        context: &Context,
        request: ReadRequest,
    ) -> ResourceResult<ResourceResponse> {
        match self.split() {
            Ok((filter, next)) => filter.filter_read(context, request, next).await,
            Err(target) => target.handle_read(context, request).await,
        }
    }

    pub async fn handle_update(
        self,
        context: &Context,
        request: UpdateRequest,
    ) -> ResourceResult<ResourceResponse> {
        match self.split() {
            Ok((filter, next)) => filter.filter_update(context, request, next).await,
            Err(target) => target.handle_update(context, request).await,
        }
    }

    pub async fn handle_delete(
        self,
        context: &Context,
        request: DeleteRequest,
    ) -> ResourceResult<ResourceResponse> {
        match self.split() {
            Ok((filter, next)) => filter.filter_delete(context, request, next).await,
            Err(target) => target.handle_delete(context, request).await,
        }
    }

    pub async fn handle_patch(
        self,
        context: &Context,
        request: PatchRequest,
    ) -> ResourceResult<ResourceResponse> {
        match self.split() {
            Ok((filter, next)) => filter.filter_patch(context, request, next).await,
            Err(target) => target.handle_patch(context, request).await,
        }
    }

    pub async fn handle_query(
        self,
        context: &Context,
        request: QueryRequest,
        handler: &mut dyn QueryResourceHandler,
    ) -> ResourceResult<QueryResponse> {
        match self.split() {
            Ok((filter, next)) => filter.filter_query(context, request, handler, next).await,
            Err(target) => target.handle_query(context, request, handler).await,
        }
    }
}
