mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{body_json, TestApp};

#[tokio::test]
async fn health_check_reports_dependencies() {
    let app = TestApp::spawn().await;

    let response = app.get("/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "library-api");
    assert_eq!(body["checks"]["database"], "ok");
    assert_eq!(body["checks"]["storage"], "ok");
    assert_eq!(body["checks"]["auth"], "ok");
}

#[tokio::test]
async fn health_check_fails_when_auth_provider_is_down() {
    let app = TestApp::spawn().await;
    app.auth.set_unavailable(true);

    let response = app.get("/health").await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["checks"]["database"], "ok");
    assert_eq!(body["checks"]["storage"], "ok");
    assert_ne!(body["checks"]["auth"], "ok");

    app.auth.set_unavailable(false);
    assert_eq!(app.get("/health").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_check_fails_when_storage_is_gone() {
    let app = TestApp::spawn().await;
    std::fs::remove_dir_all(app.storage_dir.path()).unwrap();

    let response = app.get("/health").await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["checks"]["database"], "ok");
    assert_ne!(body["checks"]["storage"], "ok");
}

#[tokio::test]
async fn readiness_and_metrics_respond() {
    let app = TestApp::spawn().await;

    assert_eq!(app.get("/ready").await.status(), StatusCode::OK);

    let response = app.get("/metrics").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
}

#[tokio::test]
async fn responses_carry_request_id_and_security_headers() {
    let app = TestApp::spawn().await;

    let response = app
        .request(
            Request::get("/api/documents")
                .header("x-request-id", "req-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "req-123");
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(response.headers()["x-frame-options"], "DENY");
}

#[tokio::test]
async fn cors_allow_list_is_enforced() {
    let app = TestApp::spawn().await;

    let preflight = |origin: &str| {
        Request::builder()
            .method("OPTIONS")
            .uri("/api/documents")
            .header("origin", origin)
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap()
    };

    let allowed = app.request(preflight("http://localhost:3000")).await;
    assert_eq!(allowed.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        allowed.headers()["access-control-allow-origin"],
        "http://localhost:3000"
    );

    let rejected = app.request(preflight("https://evil.example.com")).await;
    assert_eq!(rejected.status(), StatusCode::FORBIDDEN);

    let simple = app
        .request(
            Request::get("/api/documents")
                .header("origin", "https://evil.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(simple.status(), StatusCode::OK);
    assert!(!simple
        .headers()
        .contains_key("access-control-allow-origin"));
}
