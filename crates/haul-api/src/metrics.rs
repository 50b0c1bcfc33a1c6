//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "haul_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "haul_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "haul_http_requests_in_flight";

    // Progress stream metrics
    pub const SSE_STREAMS_TOTAL: &str = "haul_sse_streams_total";
    pub const SSE_STREAMS_ACTIVE: &str = "haul_sse_streams_active";

    // Queue metrics
    pub const QUEUE_LENGTH: &str = "haul_queue_length";
    pub const JOBS_ENQUEUED_TOTAL: &str = "haul_jobs_enqueued_total";

    // Delivery metrics
    pub const ARTIFACTS_SERVED_TOTAL: &str = "haul_artifacts_served_total";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "haul_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a progress stream being opened.
pub fn record_sse_stream_opened() {
    counter!(names::SSE_STREAMS_TOTAL).increment(1);
}

/// Update active progress streams gauge.
pub fn set_sse_active_streams(count: i64) {
    gauge!(names::SSE_STREAMS_ACTIVE).set(count as f64);
}

/// Update queue length gauge.
pub fn set_queue_length(length: u64) {
    gauge!(names::QUEUE_LENGTH).set(length as f64);
}

/// Record job enqueued.
pub fn record_job_enqueued(mode: &str) {
    let labels = [("mode", mode.to_string())];
    counter!(names::JOBS_ENQUEUED_TOTAL, &labels).increment(1);
}

/// Record artifact served.
pub fn record_artifact_served() {
    counter!(names::ARTIFACTS_SERVED_TOTAL).increment(1);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", endpoint.to_string())];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Sanitize path for metrics labels (remove IDs, etc.).
fn sanitize_path(path: &str) -> String {
    // Replace UUIDs and numeric IDs with placeholders
    let path = regex_lite::Regex::new(r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}")
        .unwrap()
        .replace_all(path, ":id");
    let path = regex_lite::Regex::new(r"/[0-9]+(/|$)")
        .unwrap()
        .replace_all(&path, "/:id$1");
    path.to_string()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    // Increment in-flight counter
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    // Decrement in-flight counter
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(
            sanitize_path("/api/progress/550e8400-e29b-41d4-a716-446655440000"),
            "/api/progress/:id"
        );
        assert_eq!(
            sanitize_path("/api/artifact/550e8400-e29b-41d4-a716-446655440000"),
            "/api/artifact/:id"
        );
        assert_eq!(sanitize_path("/api/download"), "/api/download");
        assert_eq!(sanitize_path("/api/items/42/"), "/api/items/:id/");
    }
}
