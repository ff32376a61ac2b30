//! Resource provider interfaces.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::ResourceResult;
use crate::handler::QueryResourceHandler;
use crate::request::{
    ActionRequest, CreateRequest, DeleteRequest, PatchRequest, QueryRequest, ReadRequest,
    UpdateRequest,
};
use crate::response::{ActionResponse, QueryResponse, ResourceResponse};

/// A collection of resources addressed by id.
///
/// Collection-level methods receive requests for the collection itself;
/// instance-level methods receive the id taken from the route.
#[async_trait]
pub trait CollectionResourceProvider: Send + Sync {
    async fn action_collection(
        &self,
        context: &Context,
        request: ActionRequest,
    ) -> ResourceResult<ActionResponse>;

    async fn action_instance(
        &self,
        context: &Context,
        resource_id: &str,
        request: ActionRequest,
    ) -> ResourceResult<ActionResponse>;

    async fn create_instance(
        &self,
        context: &Context,
        request: CreateRequest,
    ) -> ResourceResult<ResourceResponse>;

    async fn delete_instance(
        &self,
        context: &Context,
        resource_id: &str,
        request: DeleteRequest,
    ) -> ResourceResult<ResourceResponse>;

    async fn patch_instance(
        &self,
        context: &Context,
        resource_id: &str,
        request: PatchRequest,
    ) -> ResourceResult<ResourceResponse>;

    async fn query_collection(
        &self,
        context: &Context,
        request: QueryRequest,
        handler: &mut dyn QueryResourceHandler,
    ) -> ResourceResult<QueryResponse>;

    async fn read_instance(
        &self,
        context: &Context,
        resource_id: &str,
        request: ReadRequest,
    ) -> ResourceResult<ResourceResponse>;

    async fn update_instance(
        &self,
        context: &Context,
        resource_id: &str,
        request: UpdateRequest,
    ) -> ResourceResult<ResourceResponse>;
}

/// A single resource that always exists: no create, delete or query.
#[async_trait]
pub trait SingletonResourceProvider: Send + Sync {
    async fn action_instance(
        &self,
        context: &Context,
        request: ActionRequest,
    ) -> ResourceResult<ActionResponse>;

    async fn patch_instance(
        &self,
        context: &Context,
        request: PatchRequest,
    ) -> ResourceResult<ResourceResponse>;

    async fn read_instance(
        &self,
        context: &Context,
        request: ReadRequest,
    ) -> ResourceResult<ResourceResponse>;

    async fn update_instance(
        &self,
        context: &Context,
        request: UpdateRequest,
    ) -> ResourceResult<ResourceResponse>;
}

#[async_trait]
impl<P: CollectionResourceProvider + ?Sized> CollectionResourceProvider for Arc<P> {
    async fn action_collection(
        &self,
        context: &Context,
        request: ActionRequest,
    ) -> ResourceResult<ActionResponse> {
        (**self).action_collection(context, request).await
    }

    async fn action_instance(
        &self,
        context: &Context,
        resource_id: &str,
        request: ActionRequest,
    ) -> ResourceResult<ActionResponse> {
        (**self).action_instance(context, resource_id, request).await
    }

    async fn create_instance(
        &self,
        context: &Context,
        request: CreateRequest,
    ) -> ResourceResult<ResourceResponse> {
        (**self).create_instance(context, request).await
    }

    async fn delete_instance(
        &self,
        context: &Context,
        resource_id: &str,
        request: DeleteRequest,
    ) -> ResourceResult<ResourceResponse> {
        (**self).delete_instance(context, resource_id, request).await
    }

    async fn patch_instance(
        &self,
        context: &Context,
        resource_id: &str,
        request: PatchRequest,
    ) -> ResourceResult<ResourceResponse> {
        (**self).patch_instance(context, resource_id, request).await
    }

    async fn query_collection(
        &self,
        context: &Context,
        request: QueryRequest,
        handler: &mut dyn QueryResourceHandler,
    ) -> ResourceResult<QueryResponse> {
        (**self).query_collection(context, request, handler).await
    }

    async fn read_instance(
        &self,
        context: &Context,
        resource_id: &str,
        request: ReadRequest,
    ) -> ResourceResult<ResourceResponse> {
        (**self).read_instance(context, resource_id, request).await
    }

    async fn update_instance(
        &self,
        context: &Context,
        resource_id: &str,
        request: UpdateRequest,
    ) -> ResourceResult<ResourceResponse> {
        (**self).update_instance(context, resource_id, request).await
    }
}

#[async_trait]
impl<P: SingletonResourceProvider + ?Sized> SingletonResourceProvider for Arc<P> {
    async fn action_instance(
        &self,
        context: &Context,
        request: ActionRequest,
    ) -> ResourceResult<ActionResponse> {
        (**self).action_instance(context, request).await
    }

    async fn patch_instance(
        &self,
        context: &Context,
        request: PatchRequest,
    ) -> ResourceResult<ResourceResponse> {
        (**self).patch_instance(context, request).await
    }

    async fn read_instance(
        &self,
        context: &Context,
        request: ReadRequest,
    ) -> ResourceResult<ResourceResponse> {
        (**self).read_instance(context, request).await
    }

    async fn update_instance(
        &self,
        context: &Context,
        request: UpdateRequest,
    ) -> ResourceResult<ResourceResponse> {
        (**self).update_instance(context, request).await
    }
}
