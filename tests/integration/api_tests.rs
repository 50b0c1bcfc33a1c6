//! API integration tests.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;

/// Test health endpoint.
#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_router().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

/// Test security headers are applied to every response.
#[tokio::test]
async fn test_security_headers() {
    let app = create_test_router().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let headers = response.headers();
    assert!(headers.contains_key("X-Content-Type-Options"));
    assert!(headers.contains_key("X-Frame-Options"));
    assert!(headers.contains_key("X-Request-ID"));
}

/// Test that an empty submission is rejected before anything is enqueued.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_download_rejects_empty_form() {
    let app = create_test_router().await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/download")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// Test that internal hosts are blocked at submission time.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_download_blocks_internal_urls() {
    let app = create_test_router().await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/download")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("url=http%3A%2F%2F127.0.0.1%2Fsecret.mp3"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// Test that a playlist submission with broken selection JSON is rejected.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_download_rejects_malformed_selection() {
    let app = create_test_router().await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/download")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("is_playlist_mode=true&selected_urls=not-json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// Test that an unknown artifact id yields 404.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_artifact_not_found() {
    let app = create_test_router().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/artifact/00000000-0000-0000-0000-000000000000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// Test an accepted submission: request id returned, progress seeded.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_download_accepts_and_seeds_progress() {
    use haul_models::RequestId;
    use haul_queue::ProgressStore;

    let app = create_test_router().await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/download")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(
                    "url=https%3A%2F%2Fwww.youtube.com%2Fwatch%3Fv%3Dabc123def45",
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    let payload: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    let request_id = payload["request_id"].as_str().expect("request_id missing");

    let progress = ProgressStore::from_env().expect("Failed to create progress store");
    let id = RequestId::from_string(request_id.to_string());
    let snapshot = progress
        .read(&id)
        .await
        .expect("Failed to read progress")
        .expect("Progress not seeded");
    assert_eq!(snapshot.percent, 0);
    assert!(!snapshot.complete);

    progress.remove(&id).await.ok();
}

/// Helper to create a test router.
/// Falls back to the probe surface with the same middleware when Redis is
/// unreachable, so the header tests stay meaningful everywhere.
async fn create_test_router() -> axum::Router {
    use haul_api::{create_router, ApiConfig, AppState};

    dotenvy::dotenv().ok();
    let config = ApiConfig::from_env();

    match AppState::new(config).await {
        Ok(state) => create_router(state, None),
        Err(_) => {
            use axum::routing::get;
            use axum::Json;
            use serde_json::json;

            axum::Router::new()
                .route(
                    "/health",
                    get(|| async {
                        Json(json!({
                            "status": "healthy",
                            "version": env!("CARGO_PKG_VERSION")
                        }))
                    }),
                )
                .layer(axum::middleware::from_fn(
                    haul_api::middleware::security_headers,
                ))
                .layer(axum::middleware::from_fn(haul_api::middleware::request_id))
        }
    }
}
