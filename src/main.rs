use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use document_notification_service::config::Settings;
use document_notification_service::pipeline::Pipeline;
use document_notification_service::server::{create_app, AppState};
use document_notification_service::shutdown::{wait_for_signal, GracefulShutdown, ShutdownConfig};
use document_notification_service::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    // Initialize tracing (kept alive until exit)
    let _telemetry = init_telemetry(&settings.otel)?;
    tracing::info!("Configuration loaded");

    let pipeline = Arc::new(Pipeline::from_settings(&settings).await?);
    tracing::info!(
        store = pipeline.store().backend_name(),
        queue = pipeline.queue().backend_name(),
        mail_transport = pipeline.gateway().transport_name(),
        "Pipeline initialized"
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Start worker pool in background
    let workers = {
        let pipeline = pipeline.clone();
        let shutdown_tx = shutdown_tx.clone();
        tokio::spawn(async move { pipeline.run_workers(shutdown_tx).await })
    };

    // Operations server
    let server = if settings.ops.enabled {
        let app = create_app(AppState::new(settings.clone(), pipeline.clone()));
        let addr = settings.ops_addr();
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!("Operations server listening on {}", addr);

        let mut shutdown_rx = shutdown_tx.subscribe();
        Some(tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "Operations server failed");
            }
        }))
    } else {
        None
    };

    wait_for_signal().await;

    let config = ShutdownConfig::for_soft_timeout(std::time::Duration::from_secs(
        settings.task.soft_timeout_seconds,
    ));
    GracefulShutdown::with_config(pipeline.queue().clone(), shutdown_tx, config)
        .execute("signal", workers)
        .await;

    if let Some(server) = server {
        let _ = server.await;
    }

    if let Some(pool) = pipeline.postgres() {
        pool.close().await;
    }

    tracing::info!("Service shutdown complete");
    Ok(())
}
