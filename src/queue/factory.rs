//! Task queue factory

use std::sync::Arc;
use std::time::Duration;

use crate::config::Settings;
use crate::postgres::PostgresPool;

use super::backend::TaskQueue;
use super::memory_backend::MemoryTaskQueue;
use super::postgres_backend::PostgresTaskQueue;

/// Lower bound for the time a reserved task may stay `running`
const MIN_VISIBILITY_TIMEOUT_SECS: u64 = 300;

/// Create a task queue based on configuration.
///
/// Returns the appropriate backend implementation based on `queue.backend`:
/// - `"postgres"`: Returns a `PostgresTaskQueue` if a PostgreSQL pool is provided
/// - `"memory"` (default): Returns a `MemoryTaskQueue`
pub fn create_task_queue(
    settings: &Settings,
    postgres_pool: Option<&PostgresPool>,
) -> Arc<dyn TaskQueue> {
    match settings.queue.backend.as_str() {
        "postgres" => {
            if let Some(pool) = postgres_pool {
                let poll_interval = Duration::from_millis(settings.worker.poll_interval_ms);
                let visibility_timeout = Duration::from_secs(
                    settings
                        .task
                        .soft_timeout_seconds
                        .saturating_mul(10)
                        .max(MIN_VISIBILITY_TIMEOUT_SECS),
                );

                tracing::info!(
                    backend = "postgres",
                    poll_interval_ms = settings.worker.poll_interval_ms,
                    visibility_timeout_secs = visibility_timeout.as_secs(),
                    "Creating PostgreSQL task queue"
                );
                Arc::new(PostgresTaskQueue::new(
                    pool.pool().clone(),
                    poll_interval,
                    visibility_timeout,
                ))
            } else {
                tracing::warn!(
                    "PostgreSQL queue requested but no pool provided, falling back to memory"
                );
                Arc::new(MemoryTaskQueue::new())
            }
        }
        _ => {
            tracing::info!(backend = "memory", "Creating memory task queue");
            Arc::new(MemoryTaskQueue::new())
        }
    }
}
