//! HTTP surface integration tests using the `Router::oneshot` pattern.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use ludo_server::{api, registry::Registry};
use tower::ServiceExt;

fn test_router() -> axum::Router {
    api::router(Arc::new(Registry::new()))
}

#[tokio::test]
async fn liveness_returns_ok() {
    let app = test_router();

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let app = test_router();

    let response = app
        .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
