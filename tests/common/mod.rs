//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use crest_router::connection::QueryResultHandler;
use crest_router::handler::QueryResourceHandler;
use crest_router::request::{
    ActionRequest, CreateRequest, DeleteRequest, PatchRequest, QueryRequest, ReadRequest,
    UpdateRequest,
};
use crest_router::response::{ActionResponse, QueryResponse, ResourceResponse};
use crest_router::{
    Context, MemoryBackend, RequestHandler, ResourceError, ResourcePath, ResourceResult, Router,
};

pub fn path(s: &str) -> ResourcePath {
    ResourcePath::parse(s).unwrap()
}

/// A router with an empty in-memory collection mounted at `users`.
pub fn users_router() -> Router {
    let router = Router::new();
    router.add_collection("users", MemoryBackend::new()).unwrap();
    router
}

/// What a [`RecordingResults`] observed, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Resource(String),
    Result(QueryResponse),
    Error(ResourceError),
}

/// Query result handler recording every callback.
#[derive(Clone, Default)]
pub struct RecordingResults {
    pub events: Arc<Mutex<Vec<Event>>>,
}

impl RecordingResults {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn terminal_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| !matches!(e, Event::Resource(_)))
            .count()
    }
}

impl QueryResultHandler for RecordingResults {
    fn handle_resource(&mut self, resource: ResourceResponse) -> bool {
        self.events
            .lock()
            .unwrap()
            .push(Event::Resource(resource.id.unwrap_or_default()));
        true
    }

    fn handle_result(&mut self, result: QueryResponse) {
        self.events.lock().unwrap().push(Event::Result(result));
    }

    fn handle_error(&mut self, error: ResourceError) {
        self.events.lock().unwrap().push(Event::Error(error));
    }
}

/// Streams `r1`, `r2`, then fails. Every other operation fails at once.
pub struct FailsMidQuery;

fn broken() -> ResourceError {
    ResourceError::InternalServerError("backend went away".into())
}

#[async_trait]
impl RequestHandler for FailsMidQuery {
    async fn handle_action(&self, _: &Context, _: ActionRequest) -> ResourceResult<ActionResponse> {
        Err(broken())
    }
    async fn handle_create(&self, _: &Context, _: CreateRequest) -> ResourceResult<ResourceResponse> {
        Err(broken())
    }
    async fn handle_read(&self, _: &Context, _: ReadRequest) -> ResourceResult<ResourceResponse> {
        Err(broken())
    }
    async fn handle_update(&self, _: &Context, _: UpdateRequest) -> ResourceResult<ResourceResponse> {
        Err(broken())
    }
    async fn handle_delete(&self, _: &Context, _: DeleteRequest) -> ResourceResult<ResourceResponse> {
        Err(broken())
    }
    async fn handle_patch(&self, _: &Context, _: PatchRequest) -> ResourceResult<ResourceResponse> {
        Err(broken())
    }
    async fn handle_query(
        &self,
        _: &Context,
        _: QueryRequest,
        handler: &mut dyn QueryResourceHandler,
    ) -> ResourceResult<QueryResponse> {
        for id in ["r1", "r2"] {
            if !handler.handle_resource(ResourceResponse::new(Some(id.into()), None, json!({}))) {
                return Ok(QueryResponse::default());
            }
        }
        Err(broken())
    }
}
