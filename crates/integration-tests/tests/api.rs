//! Router tests that never reach the database.

#![allow(clippy::unwrap_used)]

use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use fydo_integration_tests::offline_state;
use fydo_server::middleware::USER_HEADER;

async fn send(request: Request<Body>) -> (StatusCode, Value) {
    let app = fydo_server::app(offline_state());
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_does_not_touch_database() {
    let app = fydo_server::app(offline_state());
    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn test_readiness_reports_unreachable_database() {
    let (status, _) = send(get("/health/ready")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_profile_requires_identity() {
    let (status, body) = send(get("/api/me")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].as_str().unwrap().contains(USER_HEADER));
}

#[tokio::test]
async fn test_blank_identity_rejected() {
    let request = Request::builder()
        .uri("/api/me/reviews")
        .header(USER_HEADER, "   ")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_oversized_identity_rejected() {
    let request = Request::builder()
        .uri("/api/me")
        .header(USER_HEADER, "x".repeat(129))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_review_submission_requires_identity_before_body() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/reviews")
        .header("content-type", "application/json")
        .body(Body::from("not json"))
        .unwrap();
    let (status, _) = send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_routes_require_identity() {
    for (method, uri) in [
        (Method::GET, "/api/admin/reviews/pending"),
        (Method::POST, "/api/admin/products/1/ai-review"),
        (Method::DELETE, "/api/admin/challenges/3"),
    ] {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
    }
}

#[tokio::test]
async fn test_database_failure_hides_details() {
    let request = Request::builder()
        .uri("/api/me")
        .header(USER_HEADER, "auth0|42")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Internal server error");
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let (status, _) = send(get("/api/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
