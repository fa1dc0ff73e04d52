//! Prometheus scrape endpoint.

use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use prometheus::{Encoder, TextEncoder};

const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, [(header::CONTENT_TYPE, CONTENT_TYPE)], String::new());
    }
    let body = String::from_utf8_lossy(&buffer).into_owned();
    (StatusCode::OK, [(header::CONTENT_TYPE, CONTENT_TYPE)], body)
}
