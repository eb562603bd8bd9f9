use axum::{
    routing::{get, post},
    Router,
};

use crate::server::AppState;

use super::health::{health, stats};
use super::metrics::prometheus_metrics;
use super::operations::{dead_letters, redispatch_document, redispatch_pending};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health & Stats
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(prometheus_metrics))
        // Operator tools
        .nest(
            "/api/v1",
            Router::new()
                .route("/documents/{id}/redispatch", post(redispatch_document))
                .route("/documents/redispatch-pending", post(redispatch_pending))
                .route("/dead-letters", get(dead_letters)),
        )
}
