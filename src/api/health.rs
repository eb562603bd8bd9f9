//! Health check and statistics endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::queue::QueueStats;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub store: String,
    pub queue: QueueHealthResponse,
    pub mail_transport: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postgres: Option<PostgresHealthResponse>,
}

#[derive(Debug, Serialize)]
pub struct QueueHealthResponse {
    pub backend: String,
    pub reachable: bool,
}

#[derive(Debug, Serialize)]
pub struct PostgresHealthResponse {
    pub connected: bool,
    pub pool_size: u32,
    pub idle_connections: usize,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub queue: QueueStats,
    pub workers: WorkerStats,
    pub failed_documents: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct WorkerStats {
    pub concurrency: usize,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let pipeline = &state.pipeline;
    let queue_reachable = pipeline.queue().stats().await.is_ok();

    let postgres = match pipeline.postgres() {
        Some(pool) => Some(PostgresHealthResponse {
            connected: pool.ping().await,
            pool_size: pool.size(),
            idle_connections: pool.idle_connections(),
        }),
        None => None,
    };

    let postgres_ok = postgres.as_ref().map(|p| p.connected).unwrap_or(true);
    let status = if queue_reachable && postgres_ok {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime().as_secs(),
        store: pipeline.store().backend_name().to_string(),
        queue: QueueHealthResponse {
            backend: pipeline.queue().backend_name().to_string(),
            reachable: queue_reachable,
        },
        mail_transport: pipeline.gateway().transport_name().to_string(),
        postgres,
    })
}

pub async fn stats(State(state): State<AppState>) -> crate::error::Result<Json<StatsResponse>> {
    let pipeline = &state.pipeline;
    let queue = pipeline
        .queue()
        .stats()
        .await
        .map_err(crate::error::PipelineError::from)?;

    Ok(Json(StatsResponse {
        queue,
        workers: WorkerStats {
            concurrency: pipeline.workers().concurrency(),
        },
        failed_documents: pipeline.tracker().failed(),
    }))
}
