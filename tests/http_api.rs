//! HTTP API tests driven through the axum router in-process.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::*;
use http_body_util::BodyExt;
use repo_help::server::router;
use repo_help::service::{RepoHelp, Settings};
use repo_help_core::store::memory::InMemoryStore;
use serde_json::{json, Value};
use tower::ServiceExt;

fn app_with(source: MapSource, max_files: usize) -> (Router, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    let service = RepoHelp::new(
        Arc::new(source),
        Arc::new(WholeFile),
        None,
        fast_retry(Arc::new(KeywordEmbedder::default())),
        store.clone(),
        Settings {
            concurrency: 4,
            max_files,
            top_k: 3,
        },
    );
    (router(Arc::new(service)), store)
}

fn app() -> (Router, Arc<InMemoryStore>) {
    app_with(
        MapSource::new()
            .with_file("acme/widgets", "src/login.js", "login form and password reset")
            .with_file("acme/widgets", "src/cart.js", "cart and checkout")
            .with_file("acme/widgets", "README.md", "widget shop"),
        10,
    )
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health() {
    let (app, _) = app();
    let (status, body) = send(app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_analyze_ingests_and_returns_matches() {
    let (app, store) = app();
    let (status, body) = send(
        app,
        post_json(
            "/analyze",
            json!({
                "repo": "acme/widgets",
                "issueTitle": "Cannot login",
                "issueBody": "password reset link is broken"
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["ingest"]["stored"], 3);
    assert_eq!(body["ingest"]["skipped"], 0);
    assert_eq!(body["results"][0]["file"], "src/login.js");
    assert_eq!(body["results"][0]["docId"], "acme/widgets::src/login.js");
    assert_eq!(body["results"][0]["match"], "login form and password reset");
    assert!(body["results"][0]["distance"].is_number());
    assert_eq!(store.len(), 3);
}

#[tokio::test]
async fn test_analyze_twice_skips_indexed_files() {
    let (app, store) = app();
    let request = || {
        post_json(
            "/analyze",
            json!({ "repo": "acme/widgets", "issueTitle": "checkout", "issueBody": "" }),
        )
    };

    let (status, _) = send(app.clone(), request()).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(app, request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ingest"]["stored"], 0);
    assert_eq!(body["ingest"]["skipped"], 3);
    assert_eq!(body["results"][0]["file"], "src/cart.js");
    assert_eq!(store.len(), 3);
}

#[tokio::test]
async fn test_analyze_caps_files_per_request() {
    let (app, store) = app_with(
        MapSource::new()
            .with_file("acme/widgets", "a.js", "widget a")
            .with_file("acme/widgets", "b.js", "widget b")
            .with_file("acme/widgets", "c.js", "widget c"),
        2,
    );
    let (status, body) = send(
        app,
        post_json(
            "/analyze",
            json!({ "repo": "acme/widgets", "issueTitle": "widget", "issueBody": "" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ingest"]["stored"], 2);
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn test_analyze_rejects_bad_repo() {
    let (app, _) = app();
    let (status, body) = send(
        app,
        post_json("/analyze", json!({ "repo": "widgets", "issueTitle": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_analyze_rejects_blank_issue() {
    let (app, store) = app();
    let (status, body) = send(
        app,
        post_json(
            "/analyze",
            json!({ "repo": "acme/widgets", "issueTitle": " ", "issueBody": "" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_analyze_unknown_repo_is_no_match() {
    let (app, _) = app();
    let (status, body) = send(
        app,
        post_json(
            "/analyze",
            json!({ "repo": "acme/unknown", "issueTitle": "login", "issueBody": "" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "no_match");
}

#[tokio::test]
async fn test_list_docs_paginates() {
    let (app, _) = app();
    let (status, _) = send(
        app.clone(),
        post_json(
            "/analyze",
            json!({ "repo": "acme/widgets", "issueTitle": "login", "issueBody": "" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(app.clone(), get("/list-docs?page=2&limit=2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["page"], 2);
    assert_eq!(body["limit"], 2);
    assert_eq!(body["documents"].as_array().unwrap().len(), 1);
    assert_eq!(body["documents"][0]["repo"], "acme/widgets");

    let (status, body) = send(app, get("/list-docs")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["page"], 1);
    assert_eq!(body["limit"], 20);
    assert_eq!(body["documents"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_list_docs_rejects_page_zero() {
    let (app, _) = app();
    let (status, body) = send(app, get("/list-docs?page=0")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
}
