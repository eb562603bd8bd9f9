//! Prometheus scrape endpoint.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::metrics::{self, QueueMetrics};
use crate::server::AppState;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<AppState>) -> Response {
    refresh_queue_depth(&state).await;

    match metrics::encode_metrics() {
        Ok(body) => ([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Metrics encoding failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("metrics unavailable: {e}")).into_response()
        }
    }
}

/// Queue gauges are sampled at scrape time rather than on every transition.
async fn refresh_queue_depth(state: &AppState) {
    let queue = state.pipeline.queue();
    match queue.stats().await {
        Ok(stats) => QueueMetrics::update_depth(stats.pending, stats.running, stats.dead_lettered),
        Err(e) => tracing::warn!(
            backend = queue.backend_name(),
            error = %e,
            "Queue stats unavailable, depth gauges left stale"
        ),
    }
}
