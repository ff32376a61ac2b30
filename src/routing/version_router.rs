//! Routing on requested resource API version.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::config::VersioningConfig;
use crate::context::{AcceptApiVersionContext, Context};
use crate::error::{ResourceError, ResourceResult};
use crate::handler::{QueryResourceHandler, RequestHandler};
use crate::request::{
    ActionRequest, CreateRequest, DeleteRequest, PatchRequest, QueryRequest, ReadRequest,
    ResourceRequest, UpdateRequest,
};
use crate::response::{ActionResponse, QueryResponse, ResourceResponse};
use crate::routing::router::{Router, Selected, VersionTagging};
use crate::routing::{RouteMatcher, Version};

/// What a version route does when the request names no version.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultVersionBehaviour {
    /// Serve from the highest registered version.
    #[default]
    Latest = 0,
    /// Serve from the lowest registered version.
    Oldest = 1,
    /// Reject the request.
    None = 2,
}

impl From<u8> for DefaultVersionBehaviour {
    fn from(val: u8) -> Self {
        match val {
            1 => DefaultVersionBehaviour::Oldest,
            2 => DefaultVersionBehaviour::None,
            _ => DefaultVersionBehaviour::Latest,
        }
    }
}

/// Shared, atomically updated default behaviour. Every matcher created
/// by one router holds a clone, so a change applies to all of them at once.
#[derive(Debug, Clone, Default)]
pub struct VersionBehaviour(Arc<AtomicU8>);

impl VersionBehaviour {
    pub fn new(behaviour: DefaultVersionBehaviour) -> Self {
        Self(Arc::new(AtomicU8::new(behaviour as u8)))
    }

    pub fn get(&self) -> DefaultVersionBehaviour {
        self.0.load(Ordering::Relaxed).into()
    }

    pub fn set(&self, behaviour: DefaultVersionBehaviour) {
        self.0.store(behaviour as u8, Ordering::Relaxed);
    }
}

/// A router whose routes are resource API versions of one resource.
///
/// Differs from adding version routes to a plain [`Router`] in its
/// NotFound message, which names the requested version, and in an
/// optional warning when clients omit the version.
pub struct VersionRouter {
    router: Router,
    versions: DashMap<Version, Arc<dyn RouteMatcher>>,
    warning_enabled: AtomicBool,
}

impl VersionRouter {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            versions: DashMap::new(),
            warning_enabled: AtomicBool::new(true),
        }
    }

    pub fn from_config(config: &VersioningConfig) -> Self {
        let router = Self::new();
        router.set_default_behaviour(config.default_behaviour);
        router.set_warning_enabled(config.warning_enabled);
        router
    }

    /// Serve `version` with `handler`, replacing any handler already
    /// registered for that exact version.
    pub fn add_version<H>(&self, version: Version, handler: H) -> Arc<dyn RouteMatcher>
    where
        H: RequestHandler + 'static,
    {
        match self.versions.entry(version) {
            Entry::Occupied(mut entry) => {
                let matcher = self.router.replace_version_route(entry.get(), version, handler);
                entry.insert(matcher.clone());
                matcher
            }
            Entry::Vacant(entry) => {
                let matcher = self.router.add_version_route(version, handler);
                entry.insert(matcher.clone());
                matcher
            }
        }
    }

    pub fn remove_version(&self, version: &Version) -> bool {
        match self.versions.remove(version) {
            Some((_, matcher)) => self.router.remove_route(&matcher),
            None => false,
        }
    }

    pub fn versions(&self) -> Vec<Version> {
        let mut versions: Vec<Version> = self.versions.iter().map(|e| *e.key()).collect();
        versions.sort();
        versions
    }

    pub fn set_default_behaviour(&self, behaviour: DefaultVersionBehaviour) {
        self.router.set_default_version_behaviour(behaviour);
    }

    pub fn default_behaviour(&self) -> DefaultVersionBehaviour {
        self.router.default_version_behaviour()
    }

    /// Log a warning for requests that name no resource version.
    pub fn set_warning_enabled(&self, enabled: bool) {
        self.warning_enabled.store(enabled, Ordering::Relaxed);
    }

    fn select(&self, context: &Context, request: &dyn ResourceRequest) -> ResourceResult<Selected> {
        let requested = request.resource_version().or_else(|| {
            context
                .get::<AcceptApiVersionContext>()
                .and_then(|accept| accept.resource_version)
        });
        if requested.is_none() && self.warning_enabled.load(Ordering::Relaxed) {
            tracing::warn!(
                resource_path = %request.resource_path(),
                behaviour = ?self.default_behaviour(),
                "Request did not specify a resource API version"
            );
        }

        self.router.select(context, request).map_err(|e| match e {
            ResourceError::NotFound(_) => ResourceError::NotFound(format!(
                "Version '{}' of resource '{}' not found",
                requested.map_or_else(|| "unspecified".to_string(), |v| v.to_string()),
                request.resource_path()
            )),
            other => other,
        })
    }
}

impl Default for VersionRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RequestHandler for VersionRouter {
    async fn handle_action(
        &self,
        context: &Context,
        request: ActionRequest,
    ) -> ResourceResult<ActionResponse> {
        let selected = self.select(context, &request)?;
        selected.handler.handle_action(&selected.context, request).await
    }

    async fn handle_create(
        &self,
        context: &Context,
        request: CreateRequest,
    ) -> ResourceResult<ResourceResponse> {
        let selected = self.select(context, &request)?;
        selected.handler.handle_create(&selected.context, request).await
    }

    async fn handle_read(
        &self,
        context: &Context,
        request: ReadRequest,
    ) -> ResourceResult<ResourceResponse> {
        let selected = self.select(context, &request)?;
        selected.handler.handle_read(&selected.context, request).await
    }

    async fn handle_update(
        &self,
        context: &Context,
        request: UpdateRequest,
    ) -> ResourceResult<ResourceResponse> {
        let selected = self.select(context, &request)?;
        selected.handler.handle_update(&selected.context, request).await
    }

    async fn handle_delete(
        &self,
        context: &Context,
        request: DeleteRequest,
    ) -> ResourceResult<ResourceResponse> {
        let selected = self.select(context, &request)?;
        selected.handler.handle_delete(&selected.context, request).await
    }

    async fn handle_patch(
        &self,
        context: &Context,
        request: PatchRequest,
    ) -> ResourceResult<ResourceResponse> {
        let selected = self.select(context, &request)?;
        selected.handler.handle_patch(&selected.context, request).await
    }

    async fn handle_query(
        &self,
        context: &Context,
        request: QueryRequest,
        handler: &mut dyn QueryResourceHandler,
    ) -> ResourceResult<QueryResponse> {
        let selected = self.select(context, &request)?;
        let mut tagging = VersionTagging::new(&selected.context, handler);
        selected
            .handler
            .handle_query(&selected.context, request, &mut tagging)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ApiVersionRouterContext;
    use crate::path::ResourcePath;
    use serde_json::json;

    /// Reports the version it was registered for and the selected context.
    struct Versioned(&'static str);

    #[async_trait]
    impl RequestHandler for Versioned {
        async fn handle_action(&self, _: &Context, _: ActionRequest) -> ResourceResult<ActionResponse> {
            Ok(ActionResponse::new(json!(self.0)))
        }
        async fn handle_create(&self, _: &Context, _: CreateRequest) -> ResourceResult<ResourceResponse> {
            Err(ResourceError::NotSupported("create".into()))
        }
        async fn handle_read(&self, ctx: &Context, _: ReadRequest) -> ResourceResult<ResourceResponse> {
            let selected = ctx.get::<ApiVersionRouterContext>().map(|c| c.defaulted);
            Ok(ResourceResponse::new(
                Some(self.0.into()),
                None,
                json!({ "defaulted": selected }),
            ))
        }
        async fn handle_update(&self, _: &Context, _: UpdateRequest) -> ResourceResult<ResourceResponse> {
            Err(ResourceError::NotSupported("update".into()))
        }
        async fn handle_delete(&self, _: &Context, _: DeleteRequest) -> ResourceResult<ResourceResponse> {
            Err(ResourceError::NotSupported("delete".into()))
        }
        async fn handle_patch(&self, _: &Context, _: PatchRequest) -> ResourceResult<ResourceResponse> {
            Err(ResourceError::NotSupported("patch".into()))
        }
        async fn handle_query(
            &self,
            _: &Context,
            _: QueryRequest,
            _: &mut dyn QueryResourceHandler,
        ) -> ResourceResult<QueryResponse> {
            Ok(QueryResponse::default())
        }
    }

    fn versions() -> VersionRouter {
        let router = VersionRouter::new();
        router.set_warning_enabled(false);
        router.add_version(Version::new(1, 0), Versioned("1.0"));
        router.add_version(Version::new(1, 5), Versioned("1.5"));
        router.add_version(Version::new(2, 0), Versioned("2.0"));
        router
    }

    fn read(version: Option<&str>) -> ReadRequest {
        let request = ReadRequest::new(ResourcePath::parse("users/1").unwrap());
        match version {
            Some(v) => request.with_resource_version(Version::parse(v).unwrap()),
            None => request,
        }
    }

    async fn served_by(router: &VersionRouter, version: Option<&str>) -> ResourceResult<String> {
        let response = router.handle_read(&Context::root(), read(version)).await?;
        Ok(response.id.unwrap_or_default())
    }

    #[test]
    fn test_behaviour_round_trips_through_u8() {
        for behaviour in [
            DefaultVersionBehaviour::Latest,
            DefaultVersionBehaviour::Oldest,
            DefaultVersionBehaviour::None,
        ] {
            assert_eq!(DefaultVersionBehaviour::from(behaviour as u8), behaviour);
        }
        assert_eq!(DefaultVersionBehaviour::from(99), DefaultVersionBehaviour::Latest);
    }

    #[tokio::test]
    async fn test_exact_and_compatible_selection() {
        let router = versions();
        assert_eq!(served_by(&router, Some("1.0")).await.unwrap(), "1.0");
        assert_eq!(served_by(&router, Some("1.2")).await.unwrap(), "1.5");
        assert_eq!(served_by(&router, Some("2")).await.unwrap(), "2.0");
    }

    #[tokio::test]
    async fn test_unknown_version_not_found() {
        let router = versions();
        let err = served_by(&router, Some("3.0")).await.unwrap_err();
        assert_eq!(
            err,
            ResourceError::NotFound("Version '3.0' of resource 'users/1' not found".into())
        );
        assert_eq!(served_by(&router, Some("1.6")).await.unwrap_err().code(), 404);
    }

    #[tokio::test]
    async fn test_default_behaviour_applies_to_unversioned_requests() {
        let router = versions();
        assert_eq!(served_by(&router, None).await.unwrap(), "2.0");

        router.set_default_behaviour(DefaultVersionBehaviour::Oldest);
        assert_eq!(served_by(&router, None).await.unwrap(), "1.0");

        router.set_default_behaviour(DefaultVersionBehaviour::None);
        let err = served_by(&router, None).await.unwrap_err();
        assert_eq!(
            err,
            ResourceError::NotFound("Version 'unspecified' of resource 'users/1' not found".into())
        );
    }

    #[tokio::test]
    async fn test_context_marks_defaulted_selection() {
        let router = versions();
        let defaulted = router.handle_read(&Context::root(), read(None)).await.unwrap();
        assert_eq!(defaulted.content["defaulted"], true);
        let explicit = router.handle_read(&Context::root(), read(Some("2.0"))).await.unwrap();
        assert_eq!(explicit.content["defaulted"], false);
    }

    #[tokio::test]
    async fn test_version_from_accept_context() {
        let router = versions();
        let ctx = Context::root().push(AcceptApiVersionContext::new(None, Some(Version::new(1, 1))));
        let response = router.handle_read(&ctx, read(None)).await.unwrap();
        assert_eq!(response.id.as_deref(), Some("1.5"));
    }

    #[tokio::test]
    async fn test_replace_and_remove_versions() {
        let router = versions();
        router.add_version(Version::new(2, 0), Versioned("2.0-new"));
        assert_eq!(router.versions().len(), 3);
        assert_eq!(served_by(&router, Some("2.0")).await.unwrap(), "2.0-new");

        assert!(router.remove_version(&Version::new(2, 0)));
        assert!(!router.remove_version(&Version::new(2, 0)));
        assert_eq!(served_by(&router, None).await.unwrap(), "1.5");
    }
}
