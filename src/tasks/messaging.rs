use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::service::{MessagingService, StoreSummary};

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Messaging worker is already running")]
    AlreadyRunning,
}

/// Observable lifecycle state of the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Stopped,
    Running,
}

/// Cancels and aborts the timer task when dropped, including when a `stop`
/// future is abandoned halfway.
struct RunningTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Drop for RunningTask {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

/// Background task that drives processing passes on a fixed interval.
///
/// Restores persisted messages before the first tick and stores whatever
/// is left when stopped.
pub struct MessagingWorker {
    service: Arc<MessagingService>,
    interval: Duration,
    executions: Arc<AtomicU64>,
    task: Mutex<Option<RunningTask>>,
}

impl MessagingWorker {
    pub fn new(service: Arc<MessagingService>) -> Self {
        let interval = service.processing_interval();
        Self::with_interval(service, interval)
    }

    pub fn with_interval(service: Arc<MessagingService>, interval: Duration) -> Self {
        Self {
            service,
            interval,
            executions: Arc::new(AtomicU64::new(0)),
            task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> WorkerState {
        if self.task.lock().unwrap_or_else(PoisonError::into_inner).is_some() {
            WorkerState::Running
        } else {
            WorkerState::Stopped
        }
    }

    /// Number of timer ticks executed so far
    pub fn executions(&self) -> u64 {
        self.executions.load(Ordering::Relaxed)
    }

    /// Restore the persisted queue, then start ticking.
    ///
    /// The first tick fires immediately after the restore completes.
    pub async fn start(&self) -> Result<(), WorkerError> {
        if self.state() == WorkerState::Running {
            return Err(WorkerError::AlreadyRunning);
        }

        tracing::info!(
            interval_secs = self.interval.as_secs(),
            folder = %self.service.queue_folder().display(),
            "Messaging worker starting"
        );

        self.service.resume();
        self.service.restore_queue().await;

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(
            self.service.clone(),
            self.interval,
            self.executions.clone(),
            cancel.clone(),
        ));

        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.is_some() {
            // Lost a race against a concurrent start
            cancel.cancel();
            handle.abort();
            return Err(WorkerError::AlreadyRunning);
        }
        *task = Some(RunningTask { cancel, handle });

        Ok(())
    }

    /// Persist the remaining queue, then stop the timer.
    ///
    /// Stopping a stopped worker does nothing and returns `None`.
    pub async fn stop(&self) -> Option<StoreSummary> {
        let mut running = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;

        tracing::info!("Messaging worker stopping");

        let summary = self.service.store_queue().await;

        running.cancel.cancel();
        if let Err(e) = (&mut running.handle).await {
            if !e.is_cancelled() {
                tracing::error!(error = %e, "Messaging worker task panicked");
            }
        }

        tracing::info!(executions = self.executions(), "Messaging worker stopped");
        Some(summary)
    }
}

async fn run(
    service: Arc<MessagingService>,
    interval: Duration,
    executions: Arc<AtomicU64>,
    cancel: CancellationToken,
) {
    let mut timer = tokio::time::interval(interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("Messaging worker received shutdown signal");
                break;
            }
            _ = timer.tick() => {
                executions.fetch_add(1, Ordering::Relaxed);
                service.process(&cancel).await;
            }
        }
    }
}
