//! Health and metrics endpoints.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use havoc_metrics::ChaosMetrics;

pub fn build_router(metrics: Arc<ChaosMetrics>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(prometheus_metrics))
        .with_state(metrics)
}

/// GET /healthz
async fn healthz() -> &'static str {
    "OK"
}

/// GET /metrics
async fn prometheus_metrics(State(metrics): State<Arc<ChaosMetrics>>) -> impl IntoResponse {
    let body = havoc_metrics::render_prometheus(&metrics.snapshot().await);
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}
