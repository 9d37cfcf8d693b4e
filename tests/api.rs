//! HTTP round trips through the router on the in-process engine.

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use crud_template::{api_router, AppState, MemoryDatabase, Settings};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> (Router, MemoryDatabase) {
    let db = MemoryDatabase::new();
    let settings = Settings {
        use_memory_engine: true,
        ..Settings::default()
    };
    (api_router(AppState::new(Arc::new(db.clone()), settings)), db)
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn health_and_ready_under_prefix() {
    let (app, _) = app();
    let (status, body) = call(&app, Method::GET, "/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
    let (status, _) = call(&app, Method::GET, "/v1/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_read_soft_delete_and_list_deleted() {
    let (app, db) = app();
    let (status, created) = call(
        &app,
        Method::POST,
        "/v1/user",
        Some(json!({"id": "u1", "username": "alice", "password": "pw"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["code"], json!(200));
    assert_eq!(created["message"], json!("success"));
    assert_eq!(created["data"]["is_deleted"], json!(0));

    let (status, body) = call(&app, Method::GET, "/v1/user/u1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], json!("alice"));

    let (status, body) = call(&app, Method::DELETE, "/v1/user/u1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deleted"], json!(1));

    let (status, body) = call(&app, Method::GET, "/v1/user/u1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], json!("not_found"));

    let (_, body) = call(&app, Method::GET, "/v1/user/list", None).await;
    assert_eq!(body["data"], json!([]));
    let (_, body) = call(&app, Method::GET, "/v1/user/list?is_deleted=1", None).await;
    assert_eq!(body["data"][0]["id"], json!("u1"));

    assert_eq!(db.rows("user").len(), 1);
}

#[tokio::test]
async fn hard_delete_and_missing_user() {
    let (app, db) = app();
    call(
        &app,
        Method::POST,
        "/v1/user",
        Some(json!({"id": "u1", "username": "alice", "password": "pw"})),
    )
    .await;
    let (status, _) = call(&app, Method::DELETE, "/v1/user/u1?hard=true", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(db.rows("user").is_empty());

    let (status, _) = call(&app, Method::DELETE, "/v1/user/u1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn hard_delete_purges_a_soft_deleted_user() {
    let (app, db) = app();
    call(
        &app,
        Method::POST,
        "/v1/user",
        Some(json!({"id": "u1", "username": "alice", "password": "pw"})),
    )
    .await;
    let (status, _) = call(&app, Method::DELETE, "/v1/user/u1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(db.rows("user").len(), 1);

    let (status, body) = call(&app, Method::DELETE, "/v1/user/u1?hard=true", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deleted"], json!(1));
    assert!(db.rows("user").is_empty());

    let (status, body) = call(&app, Method::DELETE, "/v1/user/u1?hard=true", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let message = body["error"]["message"].as_str().unwrap_or_default();
    assert!(message.ends_with("user u1"), "{}", message);
}

#[tokio::test]
async fn batch_page_and_count() {
    let (app, _) = app();
    let items: Vec<Value> = (0..7)
        .map(|i| json!({"id": format!("u{}", i), "username": format!("name{}", i % 2), "password": "pw"}))
        .collect();
    let (status, body) = call(&app, Method::POST, "/v1/user/batch", Some(Value::Array(items))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["inserted"], json!(7));

    let (status, body) = call(
        &app,
        Method::DELETE,
        "/v1/user",
        Some(json!({"ids": ["u0", "u1"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deleted"], json!(2));

    let (_, body) = call(&app, Method::GET, "/v1/user/page?page_size=2&orderby=id&sort=asc", None).await;
    let page = &body["data"];
    assert_eq!(page["count"], json!(5));
    assert_eq!(page["page_count"], json!(3));
    assert_eq!(page["page_number"], json!(1));
    assert_eq!(page["data"].as_array().map(Vec::len), Some(2));
    assert_eq!(page["data"][0]["id"], json!("u2"));

    // u0 is deleted, leaving u2, u4 and u6
    let (_, body) = call(&app, Method::GET, "/v1/user/count?username=name0", None).await;
    assert_eq!(body["data"], json!(3));
    let (status, _) = call(&app, Method::GET, "/v1/user/count", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = call(&app, Method::GET, "/v1/user/ids?sort=asc&orderby=id", None).await;
    assert_eq!(body["data"], json!(["u2", "u3", "u4", "u5", "u6"]));
}

#[tokio::test]
async fn update_checks_existence() {
    let (app, _) = app();
    call(
        &app,
        Method::POST,
        "/v1/user",
        Some(json!({"id": "u1", "username": "alice", "password": "pw"})),
    )
    .await;
    let (status, body) = call(&app, Method::PUT, "/v1/user", Some(json!({"id": "u1", "username": "bob"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], json!("bob"));

    let (status, _) = call(&app, Method::PUT, "/v1/user", Some(json!({"id": "nope", "username": "x"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call(&app, Method::PUT, "/v1/user", Some(json!({"username": "x"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn bad_sort_is_rejected() {
    let (app, _) = app();
    let (status, body) = call(&app, Method::GET, "/v1/user/page?orderby=secret", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], json!("validation_error"));
}
