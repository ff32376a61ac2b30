//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store routes (matcher → handler), mutable while requests are in flight
//! - Find the single most specific route for a request
//! - Rewrite the request's path to the unmatched remainder and forward
//!
//! # Design Decisions
//! - The route table is an immutable snapshot behind `ArcSwap`; lookups
//!   never lock, mutations copy the table (RCU)
//! - Ambiguity fails closed: incomparable or equally good matches from
//!   different routes yield InternalServerError
//! - Explicit NotFound rather than silent fallthrough, unless a default
//!   route was configured

use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;

use crate::context::{ApiVersionRouterContext, Context, UriRouterContext};
use crate::error::{ResourceError, ResourceResult};
use crate::handler::{QueryResourceHandler, RequestHandler};
use crate::observability::metrics;
use crate::path::ResourcePath;
use crate::request::{
    ActionRequest, CreateRequest, DeleteRequest, PatchRequest, QueryRequest, ReadRequest,
    ResourceRequest, UpdateRequest,
};
use crate::resources::{new_collection, new_singleton, CollectionResourceProvider, SingletonResourceProvider};
use crate::response::{ActionResponse, QueryResponse, ResourceResponse};
use crate::routing::matcher::{ApiVersionRouteMatcher, RouteMatcher, RoutingMode, UriRouteMatcher};
use crate::routing::version_router::{DefaultVersionBehaviour, VersionBehaviour};
use crate::routing::Version;

/// One entry of the route table.
#[derive(Clone)]
struct Route {
    matcher: Arc<dyn RouteMatcher>,
    handler: Arc<dyn RequestHandler>,
}

#[derive(Clone, Default)]
struct RouteTable {
    routes: Vec<Route>,
    default_route: Option<Arc<dyn RequestHandler>>,
}

/// The handler chosen for a request and the context to call it with.
pub(crate) struct Selected {
    pub handler: Arc<dyn RequestHandler>,
    pub context: Context,
}

/// A request handler that forwards to the best matching route.
pub struct Router {
    table: ArcSwap<RouteTable>,
    version_behaviour: VersionBehaviour,
}

impl Router {
    pub fn new() -> Self {
        Self {
            table: ArcSwap::from_pointee(RouteTable::default()),
            version_behaviour: VersionBehaviour::default(),
        }
    }

    /// Register `handler` behind `matcher`. The returned matcher is the
    /// key for [`remove_route`](Self::remove_route).
    pub fn add_route<M, H>(&self, matcher: M, handler: H) -> Arc<dyn RouteMatcher>
    where
        M: RouteMatcher + 'static,
        H: RequestHandler + 'static,
    {
        let matcher: Arc<dyn RouteMatcher> = Arc::new(matcher);
        let route = Route {
            matcher: matcher.clone(),
            handler: Arc::new(handler),
        };
        let table = self.table.rcu(|table| {
            let mut next = RouteTable::clone(table);
            next.routes.push(route.clone());
            next
        });
        let count = table.routes.len() + 1;
        tracing::info!(matcher = ?matcher, routes = count, "Route added");
        metrics::record_route_count(count);
        matcher
    }

    /// Route requests whose path matches `template` under `mode`.
    pub fn add_uri_route<H>(
        &self,
        mode: RoutingMode,
        template: &str,
        handler: H,
    ) -> ResourceResult<Arc<dyn RouteMatcher>>
    where
        H: RequestHandler + 'static,
    {
        let matcher = UriRouteMatcher::new(mode, template)?;
        Ok(self.add_route(matcher, handler))
    }

    /// Mount a collection: `template` and everything below it.
    pub fn add_collection<P>(&self, template: &str, provider: P) -> ResourceResult<Arc<dyn RouteMatcher>>
    where
        P: CollectionResourceProvider + 'static,
    {
        self.add_uri_route(RoutingMode::StartsWith, template, new_collection(provider)?)
    }

    /// Mount a singleton at exactly `template`.
    pub fn add_singleton<P>(&self, template: &str, provider: P) -> ResourceResult<Arc<dyn RouteMatcher>>
    where
        P: SingletonResourceProvider + 'static,
    {
        self.add_uri_route(RoutingMode::Equals, template, new_singleton(provider))
    }

    /// Route requests for resource API `version` to `handler`. Requests
    /// without a version follow this router's default version behaviour.
    pub fn add_version_route<H>(&self, version: Version, handler: H) -> Arc<dyn RouteMatcher>
    where
        H: RequestHandler + 'static,
    {
        let matcher = ApiVersionRouteMatcher::new(version, self.version_behaviour.clone());
        self.add_route(matcher, handler)
    }

    /// Remove the route registered under `matcher`. Returns false if no
    /// such route exists.
    pub fn remove_route(&self, matcher: &Arc<dyn RouteMatcher>) -> bool {
        let mut removed = false;
        let table = self.table.rcu(|table| {
            let mut next = RouteTable::clone(table);
            next.routes.retain(|route| !same_matcher(&route.matcher, matcher));
            removed = next.routes.len() != table.routes.len();
            next
        });
        if removed {
            let count = table.routes.len().saturating_sub(1);
            tracing::info!(matcher = ?matcher, routes = count, "Route removed");
            metrics::record_route_count(count);
        }
        removed
    }

    /// Swap the route under `previous` for `handler` behind `matcher` in
    /// one table update. Concurrent requests see either the old route or
    /// the new one, never both. Adds the route if `previous` is gone.
    pub fn replace_route<M, H>(
        &self,
        previous: &Arc<dyn RouteMatcher>,
        matcher: M,
        handler: H,
    ) -> Arc<dyn RouteMatcher>
    where
        M: RouteMatcher + 'static,
        H: RequestHandler + 'static,
    {
        let matcher: Arc<dyn RouteMatcher> = Arc::new(matcher);
        let route = Route {
            matcher: matcher.clone(),
            handler: Arc::new(handler),
        };
        let table = self.table.rcu(|table| {
            let mut next = RouteTable::clone(table);
            next.routes.retain(|route| !same_matcher(&route.matcher, previous));
            next.routes.push(route.clone());
            next
        });
        let count = table
            .routes
            .iter()
            .filter(|route| !same_matcher(&route.matcher, previous))
            .count()
            + 1;
        tracing::info!(previous = ?previous, matcher = ?matcher, routes = count, "Route replaced");
        metrics::record_route_count(count);
        matcher
    }

    /// Like [`replace_route`](Self::replace_route) for a version route.
    pub fn replace_version_route<H>(
        &self,
        previous: &Arc<dyn RouteMatcher>,
        version: Version,
        handler: H,
    ) -> Arc<dyn RouteMatcher>
    where
        H: RequestHandler + 'static,
    {
        let matcher = ApiVersionRouteMatcher::new(version, self.version_behaviour.clone());
        self.replace_route(previous, matcher, handler)
    }

    pub fn remove_all_routes(&self) {
        self.table.rcu(|table| RouteTable {
            routes: Vec::new(),
            default_route: table.default_route.clone(),
        });
        tracing::info!("All routes removed");
        metrics::record_route_count(0);
    }

    /// Handler used when no route matches. `None` restores NotFound.
    pub fn set_default_route(&self, handler: Option<Arc<dyn RequestHandler>>) {
        self.table.rcu(|table| RouteTable {
            routes: table.routes.clone(),
            default_route: handler.clone(),
        });
    }

    pub fn route_count(&self) -> usize {
        self.table.load().routes.len()
    }

    /// Behaviour of version routes when a request names no version.
    pub fn set_default_version_behaviour(&self, behaviour: DefaultVersionBehaviour) {
        self.version_behaviour.set(behaviour);
    }

    pub fn default_version_behaviour(&self) -> DefaultVersionBehaviour {
        self.version_behaviour.get()
    }

    /// Pick the best route for `request`.
    pub(crate) fn select(&self, context: &Context, request: &dyn ResourceRequest) -> ResourceResult<Selected> {
        let table = self.table.load();
        let mut best: Option<(Box<dyn crate::routing::RouteMatch>, &Route)> = None;
        let mut ambiguous = false;

        for route in table.routes.iter() {
            let Some(candidate) = route.matcher.evaluate(context, request) else {
                continue;
            };
            let replace = match &best {
                None => true,
                Some((current, _)) => {
                    let better = candidate
                        .is_better_than(current.as_ref())
                        .map_err(|e| incomparable(request, e))?;
                    let worse = current
                        .is_better_than(candidate.as_ref())
                        .map_err(|e| incomparable(request, e))?;
                    if !better && !worse {
                        ambiguous = true;
                    }
                    better
                }
            };
            if replace {
                ambiguous = false;
                best = Some((candidate, route));
            }
        }

        if ambiguous {
            tracing::warn!(
                resource_path = %request.resource_path(),
                "Ambiguous routes for request"
            );
            return Err(ResourceError::InternalServerError(format!(
                "Multiple routes match resource '{}' equally well",
                request.resource_path()
            )));
        }

        match best {
            Some((route_match, route)) => {
                tracing::debug!(
                    resource_path = %request.resource_path(),
                    matcher = ?route.matcher,
                    "Route resolved"
                );
                Ok(Selected {
                    handler: route.handler.clone(),
                    context: route_match.decorate_context(context),
                })
            }
            None => match &table.default_route {
                Some(handler) => {
                    tracing::debug!(resource_path = %request.resource_path(), "Default route used");
                    Ok(Selected {
                        handler: handler.clone(),
                        context: context.clone(),
                    })
                }
                None => {
                    tracing::warn!(resource_path = %request.resource_path(), "No route found");
                    Err(ResourceError::NotFound(format!(
                        "Resource '{}' not found",
                        request.resource_path()
                    )))
                }
            },
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

fn same_matcher(a: &Arc<dyn RouteMatcher>, b: &Arc<dyn RouteMatcher>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

fn incomparable(request: &dyn ResourceRequest, e: crate::routing::IncomparableRouteMatch) -> ResourceError {
    tracing::error!(resource_path = %request.resource_path(), error = %e, "Incomparable route matches");
    ResourceError::InternalServerError(e.to_string())
}

/// The request with its path replaced by the remainder recorded by the
/// nearest URI router, when that differs from the current path.
pub(crate) fn routed<R: ResourceRequest>(context: &Context, mut request: R) -> ResourceResult<R> {
    if let Some(router) = context.get::<UriRouterContext>() {
        if router.remaining_uri != request.resource_path().as_str() {
            let remaining = ResourcePath::parse(&router.remaining_uri).map_err(|e| {
                ResourceError::InternalServerError(format!(
                    "Remaining path '{}' is invalid: {}",
                    router.remaining_uri,
                    e.message()
                ))
            })?;
            request.set_resource_path(remaining);
        }
    }
    Ok(request)
}

/// Tags every streamed resource with the selected resource API version.
pub(crate) struct VersionTagging<'a> {
    version: Option<Version>,
    inner: &'a mut dyn QueryResourceHandler,
}

impl<'a> VersionTagging<'a> {
    pub(crate) fn new(context: &Context, inner: &'a mut dyn QueryResourceHandler) -> Self {
        Self {
            version: context
                .get::<ApiVersionRouterContext>()
                .map(|selected| selected.resource_version),
            inner,
        }
    }
}

impl QueryResourceHandler for VersionTagging<'_> {
    fn handle_resource(&mut self, mut resource: ResourceResponse) -> bool {
        if let Some(version) = self.version {
            resource.resource_api_version = Some(version);
        }
        self.inner.handle_resource(resource)
    }
}

#[async_trait]
impl RequestHandler for Router {
    async fn handle_action(
        &self,
        context: &Context,
        request: ActionRequest,
    ) -> ResourceResult<ActionResponse> {
        let selected = self.select(context, &request)?;
        let request = routed(&selected.context, request)?;
        selected.handler.handle_action(&selected.context, request).await
    }

    async fn handle_create(
        &self,
        context: &Context,
        request: CreateRequest,
    ) -> ResourceResult<ResourceResponse> {
        let selected = self.select(context, &request)?;
        let request = routed(&selected.context, request)?;
        selected.handler.handle_create(&selected.context, request).await
    }

    async fn handle_read(
        &self,
        context: &Context,
        request: ReadRequest,
    ) -> ResourceResult<ResourceResponse> {
        let selected = self.select(context, &request)?;
        let request = routed(&selected.context, request)?;
        selected.handler.handle_read(&selected.context, request).await
    }

    async fn handle_update(
        &self,
        context: &Context,
        request: UpdateRequest,
    ) -> ResourceResult<ResourceResponse> {
        let selected = self.select(context, &request)?;
        let request = routed(&selected.context, request)?;
        selected.handler.handle_update(&selected.context, request).await
    }

    async fn handle_delete(
        &self,
        context: &Context,
        request: DeleteRequest,
    ) -> ResourceResult<ResourceResponse> {
        let selected = self.select(context, &request)?;
        let request = routed(&selected.context, request)?;
        selected.handler.handle_delete(&selected.context, request).await
    }

    async fn handle_patch(
        &self,
        context: &Context,
        request: PatchRequest,
    ) -> ResourceResult<ResourceResponse> {
        let selected = self.select(context, &request)?;
        let request = routed(&selected.context, request)?;
        selected.handler.handle_patch(&selected.context, request).await
    }

    async fn handle_query(
        &self,
        context: &Context,
        request: QueryRequest,
        handler: &mut dyn QueryResourceHandler,
    ) -> ResourceResult<QueryResponse> {
        let selected = self.select(context, &request)?;
        let request = routed(&selected.context, request)?;
        let mut tagging = VersionTagging::new(&selected.context, handler);
        selected
            .handler
            .handle_query(&selected.context, request, &mut tagging)
            .await
    }
}
