//! Spawned requests, cancellation and blocking waits.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crest_router::config::ConnectionConfig;
use crest_router::connection::{HandleState, QueryResultHandler};
use crest_router::filter::{Filter, FilterChain, Next};
use crest_router::handler::QueryResourceHandler;
use crest_router::request::{CreateRequest, QueryRequest, ReadRequest};
use crest_router::resources::RegisteredHandler;
use crest_router::response::{QueryResponse, ResourceResponse};
use crest_router::{new_internal_connection, Context, ResourceError, ResourceResult};

mod common;
use common::{path, users_router, Event, RecordingResults};

/// Reads that never complete.
fn stuck() -> RegisteredHandler {
    RegisteredHandler::builder()
        .read(|_, _| async {
            std::future::pending::<()>().await;
            Ok::<_, ResourceError>(ResourceResponse::new(None, None, json!({})))
        })
        .build()
}

/// Streams one resource, then panics.
struct PanicsMidQuery;

#[async_trait]
impl Filter for PanicsMidQuery {
    async fn filter_query(
        &self,
        _: &Context,
        _: QueryRequest,
        handler: &mut dyn QueryResourceHandler,
        _: Next<'_>,
    ) -> ResourceResult<QueryResponse> {
        handler.handle_resource(ResourceResponse::new(Some("r1".into()), None, json!({})));
        panic!("provider crashed");
    }
}

/// Takes the first resource and stops.
#[derive(Default)]
struct FirstOnly {
    taken: Vec<String>,
    terminal: usize,
}

impl QueryResultHandler for FirstOnly {
    fn handle_resource(&mut self, resource: ResourceResponse) -> bool {
        self.taken.push(resource.id.unwrap_or_default());
        false
    }

    fn handle_result(&mut self, _: QueryResponse) {
        self.terminal += 1;
    }

    fn handle_error(&mut self, _: ResourceError) {
        self.terminal += 1;
    }
}

#[tokio::test]
async fn test_spawned_request_completes() {
    let conn = new_internal_connection(users_router());
    let handle = conn.create_async(
        &Context::root(),
        CreateRequest::new(path("users"), json!({"name": "x"})).with_new_resource_id("x"),
    );
    let created = handle.get().await.unwrap();
    assert_eq!(created.id.as_deref(), Some("x"));
}

#[tokio::test]
async fn test_cancel_pending_request() {
    let conn = new_internal_connection(stuck());
    let handle = conn.read_async(&Context::root(), ReadRequest::new(path("anything")));
    assert!(!handle.is_done());
    assert!(handle.cancel());
    assert_eq!(handle.state(), HandleState::Cancelled);
    assert!(!handle.cancel());

    let err = handle.get().await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(err.code(), 503);
}

#[tokio::test]
async fn test_cancelled_query_still_gets_terminal_call() {
    let conn = new_internal_connection(users_router());
    let results = RecordingResults::default();
    let handle = conn.query_async(&Context::root(), QueryRequest::new(path("users")), results.clone());
    let won = handle.cancel();
    let outcome = handle.get().await;

    assert_eq!(results.terminal_count(), 1);
    if won {
        assert_eq!(outcome.unwrap_err().code(), 503);
    } else {
        assert!(outcome.is_ok());
    }
}

#[tokio::test]
async fn test_panicking_query_gets_one_terminal_error() {
    let chain = FilterChain::new(users_router(), vec![Arc::new(PanicsMidQuery) as Arc<dyn Filter>]);
    let conn = new_internal_connection(chain);
    let results = RecordingResults::default();
    let outcome = conn
        .query_async(&Context::root(), QueryRequest::new(path("users")), results.clone())
        .get()
        .await;

    let err = outcome.unwrap_err();
    assert_eq!(err.code(), 500);
    let events = results.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0], Event::Resource("r1".into()));
    assert_eq!(events[1], Event::Error(err));
    assert_eq!(results.terminal_count(), 1);
}

#[tokio::test]
async fn test_query_consumer_stops_early() {
    let conn = new_internal_connection(users_router());
    let ctx = Context::root();
    for id in ["a", "b", "c"] {
        conn.create(&ctx, CreateRequest::new(path("users"), json!({})).with_new_resource_id(id))
            .await
            .unwrap();
    }

    let mut first = FirstOnly::default();
    let mut forward = |r: ResourceResponse| first.handle_resource(r);
    let response = conn
        .query(&ctx, QueryRequest::new(path("users")), &mut forward)
        .await
        .unwrap();
    first.handle_result(response);
    assert_eq!(first.taken.len(), 1);
    assert_eq!(first.terminal, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocking_wait_from_sync_code() {
    let conn = new_internal_connection(users_router());
    let handle = conn.create_async(&Context::root(), CreateRequest::new(path("users"), json!({})));
    let created = tokio::task::spawn_blocking(move || handle.wait())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(created.revision.as_deref(), Some("0"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_configured_wait_timeout() {
    let config = ConnectionConfig { wait_timeout_ms: 25 };
    let conn = new_internal_connection(stuck()).with_config(&config);
    let handle = conn.read_async(&Context::root(), ReadRequest::new(path("x")));
    let err = tokio::task::spawn_blocking(move || handle.wait())
        .await
        .unwrap()
        .unwrap_err();
    assert_eq!(err.code(), 503);

    let handle = conn
        .clone()
        .with_wait_timeout(Some(Duration::from_millis(10)))
        .read_async(&Context::root(), ReadRequest::new(path("x")));
    let err = tokio::task::spawn_blocking(move || handle.wait_timeout(Duration::from_millis(5)))
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, ResourceError::ServiceUnavailable(_)));
}
