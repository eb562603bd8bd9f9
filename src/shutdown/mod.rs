//! Graceful shutdown of the worker pool.
//!
//! The shutdown sequence:
//! 1. Signals the worker loops to stop reserving tasks
//! 2. Waits for in-flight attempts to finish, bounded by a drain timeout
//! 3. Reports tasks left in the queue (lost for the memory backend)

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::queue::TaskQueue;

#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Time to wait for in-flight attempts (default: 35 seconds)
    pub drain_timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout: Duration::from_secs(35),
        }
    }
}

impl ShutdownConfig {
    /// Drain long enough for an attempt that hits its soft timeout.
    pub fn for_soft_timeout(soft_timeout: Duration) -> Self {
        Self {
            drain_timeout: soft_timeout + Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ShutdownResult {
    /// Worker loops stopped within the drain timeout
    pub workers_stopped: bool,
    /// Tasks still pending (including scheduled retries) after the drain
    pub pending_tasks: usize,
    pub duration: Duration,
}

pub struct GracefulShutdown {
    queue: Arc<dyn TaskQueue>,
    shutdown_tx: broadcast::Sender<()>,
    config: ShutdownConfig,
}

impl GracefulShutdown {
    pub fn new(queue: Arc<dyn TaskQueue>, shutdown_tx: broadcast::Sender<()>) -> Self {
        Self::with_config(queue, shutdown_tx, ShutdownConfig::default())
    }

    pub fn with_config(
        queue: Arc<dyn TaskQueue>,
        shutdown_tx: broadcast::Sender<()>,
        config: ShutdownConfig,
    ) -> Self {
        Self {
            queue,
            shutdown_tx,
            config,
        }
    }

    /// Stop the workers and wait for them, then report what is left queued.
    pub async fn execute(&self, reason: &str, workers: JoinHandle<()>) -> ShutdownResult {
        let start = std::time::Instant::now();
        let mut result = ShutdownResult::default();

        tracing::info!(reason = %reason, "Starting graceful shutdown - Phase 1: Stopping workers");
        let _ = self.shutdown_tx.send(());

        tracing::info!(
            drain_timeout_secs = self.config.drain_timeout.as_secs(),
            "Phase 2: Waiting for in-flight tasks"
        );
        result.workers_stopped = match timeout(self.config.drain_timeout, workers).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Worker pool task failed during shutdown");
                false
            }
            Err(_) => {
                tracing::warn!("Drain timeout reached, in-flight tasks abandoned");
                false
            }
        };

        tracing::info!("Phase 3: Inspecting remaining tasks");
        match self.queue.stats().await {
            Ok(stats) => {
                result.pending_tasks = stats.pending + stats.running;
                if result.pending_tasks > 0 && self.queue.backend_name() == "memory" {
                    tracing::warn!(
                        pending = result.pending_tasks,
                        "Memory queue not empty at shutdown, remaining tasks are lost"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not read queue stats during shutdown");
            }
        }

        result.duration = start.elapsed();
        tracing::info!(
            workers_stopped = result.workers_stopped,
            pending_tasks = result.pending_tasks,
            duration_ms = result.duration.as_millis(),
            "Graceful shutdown completed"
        );

        result
    }
}

/// Resolve on Ctrl+C or SIGTERM.
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::MemoryTaskQueue;
    use serde_json::json;

    #[tokio::test]
    async fn test_shutdown_stops_listener() {
        let queue: Arc<dyn TaskQueue> = Arc::new(MemoryTaskQueue::new());
        let (tx, _) = broadcast::channel(1);

        let mut rx = tx.subscribe();
        let worker = tokio::spawn(async move {
            let _ = rx.recv().await;
        });

        let result = GracefulShutdown::new(queue, tx).execute("test", worker).await;
        assert!(result.workers_stopped);
        assert_eq!(result.pending_tasks, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_timeout_and_pending_report() {
        let queue: Arc<dyn TaskQueue> = Arc::new(MemoryTaskQueue::new());
        queue.enqueue("send_simple_email", json!({})).await.unwrap();
        let (tx, _) = broadcast::channel(1);

        let stuck = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });

        let config = ShutdownConfig::for_soft_timeout(Duration::from_secs(1));
        let result = GracefulShutdown::with_config(queue, tx, config)
            .execute("test", stuck)
            .await;

        assert!(!result.workers_stopped);
        assert_eq!(result.pending_tasks, 1);
    }

    #[test]
    fn test_config_defaults() {
        assert_eq!(ShutdownConfig::default().drain_timeout, Duration::from_secs(35));
        assert_eq!(
            ShutdownConfig::for_soft_timeout(Duration::from_secs(30)).drain_timeout,
            Duration::from_secs(35)
        );
    }
}
