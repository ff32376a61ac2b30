//! The in-memory collection mounted behind a router.

use serde_json::json;

use crest_router::json::{PatchOperation, QueryFilter, SortKey};
use crest_router::request::{
    ActionRequest, CreateRequest, DeleteRequest, PatchRequest, QueryRequest, ReadRequest,
    UpdateRequest,
};
use crest_router::response::{CountPolicy, ResourceResponse};
use crest_router::{new_internal_connection, Context, ResourceError};

mod common;
use common::{path, users_router};

#[tokio::test]
async fn test_create_read_update_lifecycle() {
    let conn = new_internal_connection(users_router());
    let ctx = Context::root();

    let created = conn
        .create(&ctx, CreateRequest::new(path("users"), json!({"name": "Alice"})))
        .await
        .unwrap();
    let id = created.id.clone().unwrap();
    assert_eq!(created.revision.as_deref(), Some("0"));

    let read = conn
        .read(&ctx, ReadRequest::new(path(&format!("users/{id}"))))
        .await
        .unwrap();
    assert_eq!(read.content, json!({"name": "Alice", "_id": id, "_rev": "0"}));

    let updated = conn
        .update(
            &ctx,
            UpdateRequest::new(path(&format!("users/{id}")), json!({"name": "Alice B"})).with_revision("0"),
        )
        .await
        .unwrap();
    assert_eq!(updated.revision.as_deref(), Some("1"));

    let stale = conn
        .update(
            &ctx,
            UpdateRequest::new(path(&format!("users/{id}")), json!({"name": "Alice C"})).with_revision("0"),
        )
        .await
        .unwrap_err();
    assert!(matches!(stale, ResourceError::PreconditionFailed(_)));

    let deleted = conn
        .delete(&ctx, DeleteRequest::new(path(&format!("users/{id}"))).with_revision("1"))
        .await
        .unwrap();
    assert_eq!(deleted.content["name"], "Alice B");
    let gone = conn
        .read(&ctx, ReadRequest::new(path(&format!("users/{id}"))))
        .await
        .unwrap_err();
    assert_eq!(gone.code(), 404);
}

#[tokio::test]
async fn test_paging_through_three_items() {
    let conn = new_internal_connection(users_router());
    let ctx = Context::root();
    for name in ["a", "b", "c"] {
        conn.create(
            &ctx,
            CreateRequest::new(path("users"), json!({ "name": name })).with_new_resource_id(name),
        )
        .await
        .unwrap();
    }

    let page = |cookie: Option<String>| {
        let mut request = QueryRequest::new(path("users"))
            .with_sort_key(SortKey::ascending("/name"))
            .with_page_size(1);
        request.paged_results_cookie = cookie;
        request
    };

    let mut seen = Vec::new();
    let mut cookie = None;
    for _ in 0..3 {
        let (resources, response) = conn.query_collect(&ctx, page(cookie.take())).await.unwrap();
        assert_eq!(resources.len(), 1);
        seen.push(resources[0].id.clone().unwrap());
        cookie = response.paged_results_cookie;
        if seen.len() < 3 {
            assert!(cookie.is_some());
        }
    }
    assert_eq!(seen, vec!["a", "b", "c"]);
    assert!(cookie.is_none());
}

#[tokio::test]
async fn test_offset_paging_with_exact_count() {
    let conn = new_internal_connection(users_router());
    let ctx = Context::root();
    for age in [40, 20, 30, 50] {
        conn.create(&ctx, CreateRequest::new(path("users"), json!({ "age": age })))
            .await
            .unwrap();
    }

    let request = QueryRequest::new(path("users"))
        .with_query_filter(QueryFilter::parse("/age ge 30").unwrap())
        .with_sort_key(SortKey::descending("/age"))
        .with_page_size(2)
        .with_paged_results_offset(1)
        .with_total_paged_results_policy(CountPolicy::Exact);
    let (resources, response) = conn.query_collect(&ctx, request).await.unwrap();
    let ages: Vec<_> = resources.iter().map(|r| r.content["age"].clone()).collect();
    assert_eq!(ages, vec![json!(40), json!(30)]);
    assert_eq!(response.total_paged_results, Some(3));
    assert_eq!(response.paged_results_cookie, None);
}

#[tokio::test]
async fn test_level_restrictions_name_the_path() {
    let router = users_router();
    let conn = new_internal_connection(router);
    let ctx = Context::root();
    conn.create(
        &ctx,
        CreateRequest::new(path("users"), json!({})).with_new_resource_id("1"),
    )
    .await
    .unwrap();

    let collection_errors = [
        conn.read(&ctx, ReadRequest::new(path("users"))).await.unwrap_err(),
        conn.update(&ctx, UpdateRequest::new(path("users"), json!({}))).await.unwrap_err(),
        conn.delete(&ctx, DeleteRequest::new(path("users"))).await.unwrap_err(),
        conn.patch(&ctx, PatchRequest::new(path("users"), Vec::new())).await.unwrap_err(),
    ];
    for (err, verb) in collection_errors.iter().zip(["read", "updated", "deleted", "patched"]) {
        assert_eq!(
            err,
            &ResourceError::BadRequest(format!("The resource collection users cannot be {verb}"))
        );
    }

    let created = conn
        .create(&ctx, CreateRequest::new(path("users/1"), json!({})))
        .await
        .unwrap_err();
    assert_eq!(
        created,
        ResourceError::BadRequest("The resource instance users/1 cannot be created".into())
    );
    let mut ignore = |_: ResourceResponse| true;
    let queried = conn
        .query(&ctx, QueryRequest::new(path("users/1")), &mut ignore)
        .await
        .unwrap_err();
    assert_eq!(
        queried,
        ResourceError::BadRequest("The resource instance users/1 cannot be queried".into())
    );
}

#[tokio::test]
async fn test_patch_and_actions() {
    let conn = new_internal_connection(users_router());
    let ctx = Context::root();
    conn.create(
        &ctx,
        CreateRequest::new(path("users"), json!({"logins": 1})).with_new_resource_id("u"),
    )
    .await
    .unwrap();

    let patched = conn
        .patch(
            &ctx,
            PatchRequest::new(
                path("users/u"),
                vec![
                    PatchOperation::increment("/logins", 1),
                    PatchOperation::add("/tags", json!(["admin"])),
                ],
            )
            .with_revision("0"),
        )
        .await
        .unwrap();
    assert_eq!(patched.content["logins"], 2);
    assert_eq!(patched.content["tags"], json!(["admin"]));

    let err = conn
        .action(&ctx, ActionRequest::new(path("users/u"), "reset"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), 501);

    let cleared = conn
        .action(&ctx, ActionRequest::new(path("users"), "clear"))
        .await
        .unwrap();
    assert_eq!(cleared.content, json!({"cleared": 1}));
}
