//! HTTP API tests driven through the router without a socket

use ai_store::config::{AppConfig, StoreRegistry};
use ai_store::postgres::Connection;
use ai_store::server::{routes::create_router, AppState};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::collections::HashMap;
use tower::ServiceExt;

fn app() -> Router {
    let connections: HashMap<String, std::sync::Arc<dyn Connection>> = HashMap::new();
    let registry = StoreRegistry::from_config(&AppConfig::default(), &connections).unwrap();
    create_router(AppState::new(registry))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn documents() -> Value {
    json!([
        {"id": "a", "vector": [0.1, 0.1, 0.5], "metadata": {"_text": "Rust is fast", "lang": "en"}},
        {"id": "b", "vector": [0.7, -0.3, 0.0], "metadata": {"_text": "Postgres rows", "lang": "fr"}},
        {"id": "c", "vector": [0.4, 0.5, 0.1], "metadata": {"_text": "rust vectors", "lang": "en"}}
    ])
}

#[tokio::test]
async fn test_add_and_query() {
    let app = app();

    let (status, body) = send(&app, Method::POST, "/stores/default/documents", Some(documents())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["added"], 3);

    let (status, body) = send(
        &app,
        Method::POST,
        "/stores/default/query",
        Some(json!({"vector": [0.1, 0.1, 0.4], "max_items": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body.as_array().unwrap().iter().map(|d| d["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["a", "c"]);

    let (status, body) = send(
        &app,
        Method::POST,
        "/stores/default/query",
        Some(json!({"texts": ["rust"], "filter": {"lang": "en"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (_, metrics) = send(&app, Method::GET, "/metrics", None).await;
    assert_eq!(metrics["total_queries"], 2);
    assert_eq!(metrics["vector_queries"], 1);
    assert_eq!(metrics["text_queries"], 1);
    assert_eq!(metrics["documents_added"], 3);
}

#[tokio::test]
async fn test_remove_document() {
    let app = app();
    send(&app, Method::POST, "/stores/default/documents", Some(documents())).await;

    let (status, body) = send(&app, Method::DELETE, "/stores/default/documents/a", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 1);

    let (status, body) = send(&app, Method::DELETE, "/stores/default/documents/nope", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 0);

    let (_, metrics) = send(&app, Method::GET, "/metrics", None).await;
    assert_eq!(metrics["documents_removed"], 1);

    let (_, body) = send(
        &app,
        Method::POST,
        "/stores/default/query",
        Some(json!({"vector": [0.1, 0.1, 0.4]})),
    )
    .await;
    let ids: Vec<&str> = body.as_array().unwrap().iter().map(|d| d["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["c", "b"]);
}

#[tokio::test]
async fn test_error_statuses() {
    let app = app();

    let (status, body) = send(&app, Method::POST, "/stores/missing/query", Some(json!({"texts": ["x"]}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("missing"));

    let (status, _) = send(&app, Method::POST, "/stores/default/query", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        "/stores/default/query",
        Some(json!({"vector": [1.0], "texts": ["x"], "semantic_ratio": 2.0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    send(&app, Method::POST, "/stores/default/documents", Some(documents())).await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/stores/default/query",
        Some(json!({"vector": [1.0, 2.0]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Dimension mismatch"));
}

#[tokio::test]
async fn test_health() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["stores"], json!(["default"]));
    assert_eq!(body["default_store"], "default");
}
