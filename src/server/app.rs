use axum::Router;
use tower_http::trace::TraceLayer;

use crate::api::api_routes;

use super::AppState;

/// Router for the operations listener: health, stats, metrics and operator tools.
pub fn create_app(state: AppState) -> Router {
    api_routes()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
