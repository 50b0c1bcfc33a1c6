//! API routes.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::artifact::fetch_artifact;
use crate::handlers::download::download;
use crate::handlers::health::{health, ready};
use crate::handlers::lookup::{
    media_info_handler, playlist_info_handler, search_handler, sponsorblock_info_handler,
};
use crate::handlers::progress::progress_stream;
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_id, request_logging, security_headers,
    RateLimiterCache,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    // Create rate limiter for API routes
    let rate_limiter = std::sync::Arc::new(RateLimiterCache::new(state.config.rate_limit_rps));

    let limited_routes = Router::new()
        // Submission
        .route("/download", post(download))
        // Single-serve artifact delivery
        .route("/artifact/:request_id", get(fetch_artifact))
        // Form lookups
        .route("/media_info", post(media_info_handler))
        .route("/playlist_info", post(playlist_info_handler))
        .route("/search", post(search_handler))
        .route("/sponsorblock_info", post(sponsorblock_info_handler))
        .layer(middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ));

    // The progress stream stays outside the limiter: reconnect storms after
    // a network blip would otherwise lock clients out of their own jobs.
    let stream_routes = Router::new().route("/progress/:request_id", get(progress_stream));

    let api_routes = Router::new().merge(limited_routes).merge(stream_routes);

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(ready));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        // Submissions are form fields only; anything bigger is abuse
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
