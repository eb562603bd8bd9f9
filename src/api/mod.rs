//! API layer - operations endpoints.

mod health;
mod metrics;
mod operations;
mod routes;

pub use health::{health, stats};
pub use metrics::prometheus_metrics;
pub use operations::{dead_letters, redispatch_document, redispatch_pending};
pub use routes::api_routes;
