use anyhow::Result;

use outbox_service::app::AppState;
use outbox_service::config::Settings;
use outbox_service::metrics::encode_metrics;
use outbox_service::shutdown::{wait_for_signal, GracefulShutdown};
use outbox_service::telemetry::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    // Initialize tracing
    init_tracing(&settings.logging)?;
    tracing::info!(
        transport = %settings.transport.kind,
        queue_folder = %settings.messaging.queue_path().display(),
        template_folder = %settings.messaging.template_path().display(),
        "Configuration loaded"
    );

    // Create application state
    let state = AppState::new(settings)?;
    tracing::info!(
        default_sender = ?state.factory.default_sender().map(ToString::to_string),
        "Application state initialized"
    );

    // Start the background worker
    state.start().await?;

    let reason = wait_for_signal().await;

    let result = GracefulShutdown::new(state.worker.clone()).execute(reason).await;
    if let Some(stored) = &result.stored {
        tracing::info!(
            stored = stored.stored,
            already_present = stored.already_present,
            dropped = stored.dropped,
            failed = stored.failed,
            "Queue persisted"
        );
    }

    match encode_metrics() {
        Ok(metrics) => tracing::debug!(metrics = %metrics, "Final metrics snapshot"),
        Err(e) => tracing::warn!(error = %e, "Failed to encode metrics"),
    }

    tracing::info!("Service shutdown complete");
    Ok(())
}
