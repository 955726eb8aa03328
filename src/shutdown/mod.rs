//! Graceful shutdown handling.
//!
//! This module provides:
//! 1. Waiting for an OS termination signal (Ctrl+C / SIGTERM)
//! 2. Stopping the messaging worker so remaining messages are persisted
//! 3. Bounding the whole sequence with a flush timeout

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::signal;
use tokio::time::timeout;

use crate::service::StoreSummary;
use crate::tasks::MessagingWorker;

/// Configuration for graceful shutdown behavior
#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Time allowed for the queue flush to complete (default: 15 seconds)
    pub queue_flush_timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            queue_flush_timeout: Duration::from_secs(15),
        }
    }
}

/// Result of a shutdown sequence
#[derive(Debug, Clone, Default)]
pub struct ShutdownResult {
    /// Whether the queue flush finished within the timeout
    pub success: bool,
    /// Store counters, if the worker was running and finished in time
    pub stored: Option<StoreSummary>,
    pub duration: Duration,
}

/// Stops the messaging worker within a bounded time
pub struct GracefulShutdown {
    worker: Arc<MessagingWorker>,
    config: ShutdownConfig,
}

impl GracefulShutdown {
    pub fn new(worker: Arc<MessagingWorker>) -> Self {
        Self::with_config(worker, ShutdownConfig::default())
    }

    pub fn with_config(worker: Arc<MessagingWorker>, config: ShutdownConfig) -> Self {
        Self { worker, config }
    }

    /// Execute the shutdown sequence
    #[tracing::instrument(name = "graceful_shutdown", skip(self))]
    pub async fn execute(&self, reason: &str) -> ShutdownResult {
        let start = Instant::now();
        let mut result = ShutdownResult::default();

        tracing::info!(reason = %reason, "Starting graceful shutdown");

        match timeout(self.config.queue_flush_timeout, self.worker.stop()).await {
            Ok(stored) => {
                result.success = true;
                result.stored = stored;
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.config.queue_flush_timeout.as_secs(),
                    "Queue flush timed out, undelivered messages may be lost"
                );
            }
        }

        result.duration = start.elapsed();

        tracing::info!(
            success = result.success,
            duration_ms = result.duration.as_millis() as u64,
            "Graceful shutdown completed"
        );

        result
    }
}

/// Wait for Ctrl+C or SIGTERM and return a description of the signal.
pub async fn wait_for_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
            "ctrl_c"
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
            "terminate"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MessagingConfig;
    use crate::message::{EmailMessage, MailAddress};
    use crate::processor::EmailProcessor;
    use crate::queue::MessageQueue;
    use crate::service::MessagingService;
    use crate::tasks::WorkerState;
    use crate::transport::{MemoryTransport, Transport, TransportError};
    use async_trait::async_trait;
    use tokio::sync::Notify;
    use tokio_util::sync::CancellationToken;

    /// Never completes a delivery
    #[derive(Default)]
    struct StuckTransport {
        started: Notify,
    }

    #[async_trait]
    impl Transport for StuckTransport {
        fn name(&self) -> &str {
            "stuck"
        }

        async fn send(&self, _message: &EmailMessage, _cancel: &CancellationToken) -> Result<(), TransportError> {
            self.started.notify_one();
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_shutdown_persists_pending_messages() {
        let dir = tempfile::tempdir().unwrap();
        let config = MessagingConfig {
            queue_folder: dir.path().to_path_buf(),
            interval_seconds: 3600,
            ..Default::default()
        };
        let processor = Arc::new(EmailProcessor::new(Arc::new(MemoryTransport::new()), 3));
        let service = Arc::new(MessagingService::new(
            &config,
            Arc::new(MessageQueue::new()),
            processor,
        ));
        let worker = Arc::new(MessagingWorker::new(service.clone()));
        worker.start().await.unwrap();

        // Let the immediate first tick run on an empty queue
        tokio::time::sleep(Duration::from_millis(50)).await;
        service.queue().add(
            EmailMessage::new(
                MailAddress::new("from@example.com"),
                vec![MailAddress::new("to@example.com")],
                "Pending",
            )
            .into(),
        );

        let result = GracefulShutdown::new(worker).execute("test").await;

        assert!(result.success);
        assert_eq!(result.stored.unwrap().stored, 1);
        assert!(service.queue().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_of_stopped_worker() {
        let dir = tempfile::tempdir().unwrap();
        let config = MessagingConfig {
            queue_folder: dir.path().to_path_buf(),
            ..Default::default()
        };
        let processor = Arc::new(EmailProcessor::new(Arc::new(MemoryTransport::new()), 3));
        let service = Arc::new(MessagingService::new(
            &config,
            Arc::new(MessageQueue::new()),
            processor,
        ));
        let worker = Arc::new(MessagingWorker::new(service));

        let result = GracefulShutdown::new(worker).execute("test").await;
        assert!(result.success);
        assert!(result.stored.is_none());
    }

    #[tokio::test]
    async fn test_flush_timeout_stops_timer_task() {
        let dir = tempfile::tempdir().unwrap();
        let config = MessagingConfig {
            queue_folder: dir.path().to_path_buf(),
            interval_seconds: 3600,
            ..Default::default()
        };
        let transport = Arc::new(StuckTransport::default());
        let processor = Arc::new(EmailProcessor::new(transport.clone(), 3));
        let service = Arc::new(MessagingService::new(
            &config,
            Arc::new(MessageQueue::new()),
            processor,
        ));
        service.queue().add(
            EmailMessage::new(
                MailAddress::new("from@example.com"),
                vec![MailAddress::new("to@example.com")],
                "Stuck",
            )
            .into(),
        );

        let worker = Arc::new(MessagingWorker::new(service.clone()));
        worker.start().await.unwrap();
        transport.started.notified().await;

        let shutdown = GracefulShutdown::with_config(
            worker.clone(),
            ShutdownConfig {
                queue_flush_timeout: Duration::from_millis(50),
            },
        );
        let result = shutdown.execute("test").await;

        assert!(!result.success);
        assert_eq!(worker.state(), WorkerState::Stopped);

        // The aborted pass releases its lock, so a new pass can run
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(service.process(&CancellationToken::new()).await.is_some());
    }
}
