//! Exposing a singleton provider as a request handler.

use async_trait::async_trait;

use crate::context::{Context, UriRouterContext};
use crate::error::{ResourceError, ResourceResult};
use crate::handler::{QueryResourceHandler, RequestHandler};
use crate::request::{
    ActionRequest, CreateRequest, DeleteRequest, PatchRequest, QueryRequest, ReadRequest,
    ResourceRequest, UpdateRequest,
};
use crate::resources::provider::SingletonResourceProvider;
use crate::response::{ActionResponse, QueryResponse, ResourceResponse};

/// Handler for `provider`. Create, delete and query are rejected.
pub fn new_singleton<P>(provider: P) -> SingletonHandler<P>
where
    P: SingletonResourceProvider + 'static,
{
    SingletonHandler { provider }
}

pub struct SingletonHandler<P> {
    provider: P,
}

fn rejected(context: &Context, what: &str) -> ResourceError {
    ResourceError::BadRequest(format!(
        "The singleton resource {} cannot be {what}",
        UriRouterContext::base_uri(context)
    ))
}

#[async_trait]
impl<P: SingletonResourceProvider + 'static> RequestHandler for SingletonHandler<P> {
    async fn handle_action(
        &self,
        context: &Context,
        request: ActionRequest,
    ) -> ResourceResult<ActionResponse> {
        self.provider.action_instance(context, request).await
    }

    async fn handle_create(
        &self,
        context: &Context,
        _request: CreateRequest,
    ) -> ResourceResult<ResourceResponse> {
        Err(rejected(context, "created"))
    }

    async fn handle_read(
        &self,
        context: &Context,
        request: ReadRequest,
    ) -> ResourceResult<ResourceResponse> {
        let fields = request.fields().to_vec();
        let resource = self.provider.read_instance(context, request).await?;
        Ok(resource.filtered(&fields))
    }

    async fn handle_update(
        &self,
        context: &Context,
        request: UpdateRequest,
    ) -> ResourceResult<ResourceResponse> {
        let fields = request.fields().to_vec();
        let resource = self.provider.update_instance(context, request).await?;
        Ok(resource.filtered(&fields))
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
        request: PatchRequest,
    ) -> ResourceResult<ResourceResponse> {
        let fields = request.fields().to_vec();
        let resource = self.provider.patch_instance(context, request).await?;
        Ok(resource.filtered(&fields))
    }

    async fn handle_query(
        &self,
        context: &Context,
        _request: QueryRequest,
        _handler: &mut dyn QueryResourceHandler,
    ) -> ResourceResult<QueryResponse> {
        Err(rejected(context, "queried"))
    }
}
