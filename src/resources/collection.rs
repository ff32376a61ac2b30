//! Exposing a collection provider as a request handler.
//!
//! ```text
//! new_collection(provider) = Router
//!     ""     (equals) → CollectionHandler   action, create, query
//!     "{id}" (equals) → FilterChain[InstanceIdFilter] → InstanceHandler
//!                                           action, read, update, delete, patch
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::{Context, ContextValue, UriRouterContext};
use crate::error::{ResourceError, ResourceResult};
use crate::filter::{Filter, FilterChain, Next};
use crate::handler::{QueryResourceHandler, RequestHandler};
use crate::request::{
    ActionRequest, CreateRequest, DeleteRequest, PatchRequest, QueryRequest, ReadRequest,
    ResourceRequest, UpdateRequest,
};
use crate::resources::provider::CollectionResourceProvider;
use crate::response::{ActionResponse, QueryResponse, ResourceResponse};
use crate::routing::{Router, RoutingMode};

/// Id of the collection member a request addresses.
#[derive(Debug, Clone)]
pub struct InstanceIdContext {
    pub id: String,
}

impl ContextValue for InstanceIdContext {
    const KIND: &'static str = "instanceId";
}

/// Handler for `provider` mounted as a collection: the collection at the
/// mount point, its members one level below.
pub fn new_collection<P>(provider: P) -> ResourceResult<Router>
where
    P: CollectionResourceProvider + 'static,
{
    let provider = Arc::new(provider);
    let router = Router::new();
    router.add_uri_route(
        RoutingMode::Equals,
        "",
        CollectionHandler {
            provider: provider.clone(),
        },
    )?;
    router.add_uri_route(
        RoutingMode::Equals,
        "{id}",
        FilterChain::new(
            InstanceHandler { provider },
            vec![Arc::new(InstanceIdFilter) as Arc<dyn Filter>],
        ),
    )?;
    Ok(router)
}

fn rejected(context: &Context, what: &str) -> ResourceError {
    ResourceError::BadRequest(format!(
        "The resource collection {} cannot be {what}",
        UriRouterContext::base_uri(context)
    ))
}

fn instance_rejected(context: &Context, what: &str) -> ResourceError {
    ResourceError::BadRequest(format!(
        "The resource instance {} cannot be {what}",
        UriRouterContext::base_uri(context)
    ))
}

fn instance_id(context: &Context) -> ResourceResult<&str> {
    context
        .get::<InstanceIdContext>()
        .map(|ctx| ctx.id.as_str())
        .ok_or_else(|| {
            tracing::error!(context = ?context, "Instance request without resource id");
            ResourceError::InternalServerError("No resource id in request context".into())
        })
}

/// Copies the `{id}` template variable into an [`InstanceIdContext`].
struct InstanceIdFilter;

impl InstanceIdFilter {
    fn decorate(context: &Context) -> ResourceResult<Context> {
        let id = context
            .get::<UriRouterContext>()
            .and_then(|router| router.variable("id"))
            .ok_or_else(|| {
                ResourceError::InternalServerError("Route did not capture a resource id".into())
            })?;
        Ok(context.push(InstanceIdContext { id: id.to_string() }))
    }
}

#[async_trait]
impl Filter for InstanceIdFilter {
    async fn filter_action(
        &self,
        context: &Context,
        request: ActionRequest,
        next: Next<'_>,
    ) -> ResourceResult<ActionResponse> {
        next.handle_action(&Self::decorate(context)?, request).await
    }

    async fn filter_create(
        &self,
        context: &Context,
        request: CreateRequest,
        next: Next<'_>,
    ) -> ResourceResult<ResourceResponse> {
        next.handle_create(&Self::decorate(context)?, request).await
    }

    async fn filter_read(
        &self,
        context: &Context,
        request: ReadRequest,
        next: Next<'_>,
    ) -> ResourceResult<ResourceResponse> {
        next.handle_read(&Self::decorate(context)?, request).await
    }

    async fn filter_update(
        &self,
        context: &Context,
        request: UpdateRequest,
        next: Next<'_>,
    ) -> ResourceResult<ResourceResponse> {
        next.handle_update(&Self::decorate(context)?, request).await
    }

    async fn filter_delete(
        &self,
        context: &Context,
        request: DeleteRequest,
        next: Next<'_>,
    ) -> ResourceResult<ResourceResponse> {
        next.handle_delete(&Self::decorate(context)?, request).await
    }

    async fn filter_patch(
        &self,
        context: &Context,
        request: PatchRequest,
        next: Next<'_>,
    ) -> ResourceResult<ResourceResponse> {
        next.handle_patch(&Self::decorate(context)?, request).await
    }

    async fn filter_query(
        &self,
        context: &Context,
        request: QueryRequest,
        handler: &mut dyn QueryResourceHandler,
        next: Next<'_>,
    ) -> ResourceResult<QueryResponse> {
        next.handle_query(&Self::decorate(context)?, request, handler)
            .await
    }
}

/// Requests addressed to the collection itself.
struct CollectionHandler<P> {
    provider: Arc<P>,
}

#[async_trait]
impl<P: CollectionResourceProvider + 'static> RequestHandler for CollectionHandler<P> {
    async fn handle_action(
        &self,
        context: &Context,
        request: ActionRequest,
    ) -> ResourceResult<ActionResponse> {
        self.provider.action_collection(context, request).await
    }

    async fn handle_create(
        &self,
        context: &Context,
        request: CreateRequest,
    ) -> ResourceResult<ResourceResponse> {
        let fields = request.fields().to_vec();
        let created = self.provider.create_instance(context, request).await?;
        Ok(created.filtered(&fields))
    }

    async fn handle_read(
        &self,
        context: &Context,
        _request: ReadRequest,
    ) -> ResourceResult<ResourceResponse> {
        Err(rejected(context, "read"))
    }

    async fn handle_update(
        &self,
        context: &Context,
        _request: UpdateRequest,
    ) -> ResourceResult<ResourceResponse> {
        Err(rejected(context, "updated"))
    }

    async fn handle_delete(
        &self,
        context: &Context,
        _request: DeleteRequest,
    ) -> ResourceResult<ResourceResponse> {
        Err(rejected(context, "deleted"))
    }

    async fn handle_patch(
        &self,
        context: &Context,
        _request: PatchRequest,
    ) -> ResourceResult<ResourceResponse> {
        Err(rejected(context, "patched"))
    }

    async fn handle_query(
        &self,
        context: &Context,
        request: QueryRequest,
        handler: &mut dyn QueryResourceHandler,
    ) -> ResourceResult<QueryResponse> {
        let fields = request.fields().to_vec();
        let mut filtered = |resource: ResourceResponse| handler.handle_resource(resource.filtered(&fields));
        self.provider
            .query_collection(context, request, &mut filtered)
            .await
    }
}

/// Requests addressed to one member of the collection.
struct InstanceHandler<P> {
    provider: Arc<P>,
}

#[async_trait]
impl<P: CollectionResourceProvider + 'static> RequestHandler for InstanceHandler<P> {
    async fn handle_action(
        &self,
        context: &Context,
        request: ActionRequest,
    ) -> ResourceResult<ActionResponse> {
        let id = instance_id(context)?;
        self.provider.action_instance(context, id, request).await
    }

    async fn handle_create(
        &self,
        context: &Context,
        _request: CreateRequest,
    ) -> ResourceResult<ResourceResponse> {
        Err(instance_rejected(context, "created"))
    }

    async fn handle_read(
        &self,
        context: &Context,
        request: ReadRequest,
    ) -> ResourceResult<ResourceResponse> {
        let id = instance_id(context)?;
        let fields = request.fields().to_vec();
        let resource = self.provider.read_instance(context, id, request).await?;
        Ok(resource.filtered(&fields))
    }

    async fn handle_update(
        &self,
        context: &Context,
        request: UpdateRequest,
    ) -> ResourceResult<ResourceResponse> {
        let id = instance_id(context)?;
        let fields = request.fields().to_vec();
        let resource = self.provider.update_instance(context, id, request).await?;
        Ok(resource.filtered(&fields))
    }

    async fn handle_delete(
        &self,
        context: &Context,
        request: DeleteRequest,
    ) -> ResourceResult<ResourceResponse> {
        let id = instance_id(context)?;
        let fields = request.fields().to_vec();
        let resource = self.provider.delete_instance(context, id, request).await?;
        Ok(resource.filtered(&fields))
    }

    async fn handle_patch(
        &self,
        context: &Context,
        request: PatchRequest,
    ) -> ResourceResult<ResourceResponse> {
        let id = instance_id(context)?;
        let fields = request.fields().to_vec();
        let resource = self.provider.patch_instance(context, id, request).await?;
        Ok(resource.filtered(&fields))
    }

    async fn handle_query(
        &self,
        context: &Context,
        _request: QueryRequest,
        _handler: &mut dyn QueryResourceHandler,
    ) -> ResourceResult<QueryResponse> {
        Err(instance_rejected(context, "queried"))
    }
}
