//! Liveness/readiness probes and the Prometheus scrape endpoint.

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use workqueue_core::Admin;

/// Shared state for the health/metrics HTTP surface.
#[derive(Clone)]
pub struct HealthState {
    pub admin: Arc<Admin>,
    pub readiness_timeout: Duration,
}

/// Always 200 once the process has started serving requests.
async fn liveness_handler() -> impl IntoResponse {
    Json(json!({ "status": "alive" }))
}

/// 200 iff a short-deadline Redis PING succeeds, else 503.
async fn readiness_handler(State(state): State<HealthState>) -> impl IntoResponse {
    if state.admin.readiness(state.readiness_timeout).await {
        (StatusCode::OK, Json(json!({ "status": "ready" })))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "status": "not_ready" })))
    }
}

/// Renders the process's Prometheus metrics in text exposition format.
async fn metrics_handler() -> impl IntoResponse {
    match workqueue_core::metrics::get_metrics_handle() {
        Some(handle) => (StatusCode::OK, handle.render()).into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics not initialized").into_response(),
    }
}

/// Builds the router serving `/healthz` and `/readyz`, bound to
/// `observability.health_port`.
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .with_state(state)
}

/// Builds the router serving `/metrics`, bound to
/// `observability.metrics_port`. A separate port from health so a scraper
/// outage or misconfiguration can't also take down liveness/readiness.
pub fn metrics_router() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn liveness_always_reports_alive() {
        let response = liveness_handler().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
