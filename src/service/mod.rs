//! Queue processing and disk persistence.
//!
//! [`MessagingService`] runs processing passes over the shared
//! [`MessageQueue`] and moves undelivered items to and from the queue
//! folder across restarts.

pub mod persistence;

pub use persistence::{PersistenceError, QUEUE_FILE_EXTENSION};

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::MessagingConfig;
use crate::message::OutboundMessage;
use crate::metrics::MessagingMetrics;
use crate::processor::{DeliveryOutcome, MessageProcessor};
use crate::queue::{MessageQueue, QueueItem, QueueItemState};

/// Counters for one processing pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    /// Peek rounds executed
    pub rounds: usize,
    pub delivered: usize,
    pub retried: usize,
    /// Items that exhausted their retries during this pass
    pub failed: usize,
    /// Items of the wrong kind routed to dead-letter
    pub rejected: usize,
    /// Attempts skipped because of cancellation
    pub skipped: usize,
}

/// Counters for one store (shutdown) run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreSummary {
    pub stored: usize,
    /// Items whose file already existed; not rewritten
    pub already_present: usize,
    /// Items of a kind that cannot be persisted
    pub dropped: usize,
    /// Write failures; these items stay in memory
    pub failed: usize,
}

/// Counters for one restore (startup) run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RestoreSummary {
    pub restored: usize,
    /// Files whose id was already resident in memory
    pub duplicates: usize,
    /// Unreadable files, left on disk
    pub invalid: usize,
}

/// Coordinates processing passes and the persistence lifecycle.
pub struct MessagingService {
    queue: Arc<MessageQueue<OutboundMessage>>,
    processor: Arc<dyn MessageProcessor>,
    queue_folder: PathBuf,
    interval: Duration,
    /// Cleared by `store_queue` to stop running passes
    processing: AtomicBool,
    /// Serializes passes and lets `store_queue` wait for an in-flight one
    pass_lock: Mutex<()>,
}

impl MessagingService {
    pub fn new(
        config: &MessagingConfig,
        queue: Arc<MessageQueue<OutboundMessage>>,
        processor: Arc<dyn MessageProcessor>,
    ) -> Self {
        Self {
            queue,
            processor,
            queue_folder: config.queue_path(),
            interval: Duration::from_secs(config.interval_seconds.max(1)),
            processing: AtomicBool::new(true),
            pass_lock: Mutex::new(()),
        }
    }

    pub fn queue(&self) -> &Arc<MessageQueue<OutboundMessage>> {
        &self.queue
    }

    pub fn queue_folder(&self) -> &Path {
        &self.queue_folder
    }

    /// Time between processing passes
    pub fn processing_interval(&self) -> Duration {
        self.interval
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    /// Allow passes to run again after a `store_queue`.
    pub fn resume(&self) {
        self.processing.store(true, Ordering::SeqCst);
    }

    fn should_continue(&self, cancel: &CancellationToken) -> bool {
        self.is_processing() && !cancel.is_cancelled()
    }

    /// Run one processing pass.
    ///
    /// Keeps peeking until nothing eligible is left or processing is halted.
    /// Returns `None` without doing anything if another pass is in flight.
    #[tracing::instrument(name = "processing_pass", skip_all, fields(processor = %self.processor.kind()))]
    pub async fn process(&self, cancel: &CancellationToken) -> Option<PassSummary> {
        let _guard = match self.pass_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::debug!("Processing pass already in flight, skipping");
                return None;
            }
        };

        let start = Instant::now();
        let mut summary = PassSummary::default();
        let mut items = self.queue.peek(0);

        while self.should_continue(cancel) && !items.is_empty() {
            summary.rounds += 1;

            for mut item in items {
                if !self.should_continue(cancel) {
                    break;
                }
                self.process_item(&mut item, cancel, &mut summary).await;
            }

            // Pick up anything added while this round ran
            items = self.queue.peek(0);
        }

        MessagingMetrics::record_pass_duration(start.elapsed().as_secs_f64());
        MessagingMetrics::set_queue_depth(self.queue.len());

        if summary.rounds > 0 {
            tracing::info!(
                rounds = summary.rounds,
                delivered = summary.delivered,
                retried = summary.retried,
                failed = summary.failed,
                rejected = summary.rejected,
                skipped = summary.skipped,
                "Processing pass completed"
            );
        }

        Some(summary)
    }

    async fn process_item(
        &self,
        item: &mut OutboundMessage,
        cancel: &CancellationToken,
        summary: &mut PassSummary,
    ) {
        let id = item.id();

        if item.kind() != self.processor.kind() {
            tracing::error!(
                message_id = %id,
                expected = %self.processor.kind(),
                actual = %item.kind(),
                "Unsupported message kind, routing to dead-letter"
            );
            self.queue.set_state(id, QueueItemState::Failed);
            MessagingMetrics::record_rejected();
            summary.rejected += 1;
            return;
        }

        let previous = item.state();
        self.queue.set_state(id, QueueItemState::Processing);
        item.header_mut().state = QueueItemState::Processing;

        match self.processor.process(item, cancel).await {
            Ok(DeliveryOutcome::Delivered) => {
                self.queue.remove(id);
                MessagingMetrics::record_delivered();
                summary.delivered += 1;
            }
            Ok(DeliveryOutcome::Skipped) => {
                self.queue.set_state(id, previous);
                summary.skipped += 1;
            }
            Ok(DeliveryOutcome::Retry { .. }) => {
                self.queue.update(item);
                MessagingMetrics::record_retry();
                summary.retried += 1;
            }
            Ok(DeliveryOutcome::Failed { retry_count, .. }) => {
                self.queue.update(item);
                MessagingMetrics::record_failed();
                summary.failed += 1;
                tracing::warn!(
                    message_id = %id,
                    retry_count = retry_count,
                    "Retries exhausted, message moved to dead-letter"
                );
            }
            Err(e) => {
                tracing::error!(message_id = %id, error = %e, "Processor rejected message");
                self.queue.set_state(id, QueueItemState::Failed);
                MessagingMetrics::record_rejected();
                summary.rejected += 1;
            }
        }
    }

    /// Make sure the queue folder exists, creating it if needed.
    pub async fn check_queue_path(&self) -> bool {
        if self.queue_folder.as_os_str().is_empty() {
            return false;
        }

        if let Err(e) = tokio::fs::create_dir_all(&self.queue_folder).await {
            tracing::warn!(
                folder = %self.queue_folder.display(),
                error = %e,
                "Failed to create queue folder"
            );
        }

        tokio::fs::metadata(&self.queue_folder)
            .await
            .map(|metadata| metadata.is_dir())
            .unwrap_or(false)
    }

    /// Load persisted items from the queue folder into memory.
    ///
    /// Each file is deleted only after its item is back in the queue.
    /// Unreadable files are logged and left in place.
    pub async fn restore_queue(&self) -> RestoreSummary {
        let mut summary = RestoreSummary::default();

        tracing::debug!(folder = %self.queue_folder.display(), "Restoring message queue");

        if !self.check_queue_path().await {
            tracing::warn!(
                folder = %self.queue_folder.display(),
                "Queue folder unavailable, skipping restore"
            );
            return summary;
        }

        let files = match persistence::list_items(&self.queue_folder).await {
            Ok(files) => files,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list queue folder");
                MessagingMetrics::record_storage_error("restore");
                return summary;
            }
        };

        for path in files {
            let item = match persistence::read_item(&path).await {
                Ok(item) => item,
                Err(e) => {
                    tracing::error!(
                        path = %path.display(),
                        error = %e,
                        "Failed to restore queued message, leaving file in place"
                    );
                    MessagingMetrics::record_storage_error("restore");
                    summary.invalid += 1;
                    continue;
                }
            };

            let id = item.id();
            if self.queue.restore(item) {
                summary.restored += 1;
            } else {
                summary.duplicates += 1;
            }

            if let Err(e) = tokio::fs::remove_file(&path).await {
                tracing::warn!(
                    message_id = %id,
                    path = %path.display(),
                    error = %e,
                    "Restored message file could not be deleted"
                );
            }
        }

        MessagingMetrics::record_restored(summary.restored as u64);
        MessagingMetrics::set_queue_depth(self.queue.len());

        tracing::info!(
            restored = summary.restored,
            duplicates = summary.duplicates,
            invalid = summary.invalid,
            "Message queue restored"
        );

        summary
    }

    /// Halt processing and persist every resident item to the queue folder.
    ///
    /// Items are removed from memory only once their file is on disk (or a
    /// file for the same id already exists). Items of a kind the processor
    /// does not handle cannot be persisted and are dropped. Items added while
    /// the store runs are picked up too; only failed writes stay in memory.
    pub async fn store_queue(&self) -> StoreSummary {
        let mut summary = StoreSummary::default();

        tracing::debug!(folder = %self.queue_folder.display(), "Storing message queue");

        self.processing.store(false, Ordering::SeqCst);
        let _guard = self.pass_lock.lock().await;

        if !self.check_queue_path().await {
            tracing::error!(
                folder = %self.queue_folder.display(),
                pending = self.queue.len(),
                "Queue folder unavailable, messages not persisted"
            );
            return summary;
        }

        // Producers may keep adding while files are written; drain until only
        // items whose write already failed in this run remain.
        let mut failed_ids = HashSet::new();
        loop {
            let pending: Vec<_> = self
                .queue
                .snapshot()
                .into_iter()
                .filter(|item| !failed_ids.contains(&item.id()))
                .collect();
            if pending.is_empty() {
                break;
            }

            for item in pending {
                self.store_item(item, &mut failed_ids, &mut summary).await;
            }
        }

        let remaining = self.queue.len();
        MessagingMetrics::record_stored(summary.stored as u64);
        MessagingMetrics::set_queue_depth(remaining);

        if remaining > 0 {
            tracing::error!(
                remaining = remaining,
                folder = %self.queue_folder.display(),
                "Messages left in memory after store"
            );
        }

        tracing::info!(
            stored = summary.stored,
            already_present = summary.already_present,
            dropped = summary.dropped,
            failed = summary.failed,
            "Message queue stored"
        );

        summary
    }

    async fn store_item(
        &self,
        mut item: OutboundMessage,
        failed_ids: &mut HashSet<Uuid>,
        summary: &mut StoreSummary,
    ) {
        let id = item.id();

        if item.kind() != self.processor.kind() {
            tracing::error!(
                message_id = %id,
                expected = %self.processor.kind(),
                actual = %item.kind(),
                "Cannot persist message of unsupported kind, dropping"
            );
            self.queue.remove(id);
            summary.dropped += 1;
            return;
        }

        item.header_mut().queued_at = Utc::now();

        match persistence::write_item(&self.queue_folder, &item).await {
            Ok(path) => {
                self.queue.remove(id);
                summary.stored += 1;
                tracing::debug!(message_id = %id, path = %path.display(), "Message persisted");
            }
            Err(PersistenceError::AlreadyExists(path)) => {
                self.queue.remove(id);
                summary.already_present += 1;
                tracing::warn!(
                    message_id = %id,
                    path = %path.display(),
                    "Queue file already exists, not overwriting"
                );
            }
            Err(e) => {
                MessagingMetrics::record_storage_error("store");
                failed_ids.insert(id);
                summary.failed += 1;
                tracing::error!(message_id = %id, error = %e, "Failed to persist message");
            }
        }
    }

    /// Terminal items retained for inspection
    pub fn dead_letters(&self) -> Vec<OutboundMessage> {
        self.queue.terminal()
    }

    /// Remove and return all terminal items
    pub fn purge_dead_letters(&self) -> Vec<OutboundMessage> {
        let purged = self.queue.take_terminal();
        if !purged.is_empty() {
            tracing::info!(count = purged.len(), "Purged dead-letter messages");
            MessagingMetrics::set_queue_depth(self.queue.len());
        }
        purged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{EmailMessage, GenericMessage, MailAddress};
    use crate::processor::EmailProcessor;
    use crate::transport::{MemoryTransport, Transport, TransportError};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    /// Holds every delivery until released
    #[derive(Default)]
    struct GatedTransport {
        started: Notify,
        release: Notify,
        delivered: AtomicUsize,
    }

    #[async_trait]
    impl Transport for GatedTransport {
        fn name(&self) -> &str {
            "gated"
        }

        async fn send(&self, _message: &EmailMessage, _cancel: &CancellationToken) -> Result<(), TransportError> {
            self.started.notify_one();
            self.release.notified().await;
            self.delivered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn email(subject: &str) -> OutboundMessage {
        EmailMessage::new(
            MailAddress::new("from@example.com"),
            vec![MailAddress::new("to@example.com")],
            subject,
        )
        .text("body")
        .into()
    }

    fn service(folder: &Path) -> (MessagingService, Arc<MemoryTransport>) {
        let config = MessagingConfig {
            queue_folder: folder.to_path_buf(),
            max_retries: 2,
            ..Default::default()
        };
        let transport = Arc::new(MemoryTransport::new());
        let processor = Arc::new(EmailProcessor::new(transport.clone(), config.max_retries));
        let service = MessagingService::new(&config, Arc::new(MessageQueue::new()), processor);
        (service, transport)
    }

    #[tokio::test]
    async fn test_process_delivers_and_removes() {
        let dir = tempfile::tempdir().unwrap();
        let (service, transport) = service(dir.path());
        service.queue().add(email("a"));
        service.queue().add(email("b"));

        let summary = service.process(&CancellationToken::new()).await.unwrap();

        assert_eq!(summary.delivered, 2);
        assert_eq!(summary.rounds, 1);
        assert!(service.queue().is_empty());
        assert_eq!(transport.delivered_count(), 2);
    }

    #[tokio::test]
    async fn test_process_routes_wrong_kind_to_dead_letter() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _) = service(dir.path());
        let generic: OutboundMessage = GenericMessage::new("sms", json!({"to": "+15550100"})).into();
        let id = generic.id();
        service.queue().add(generic);

        let summary = service.process(&CancellationToken::new()).await.unwrap();

        assert_eq!(summary.rejected, 1);
        assert_eq!(service.queue().len(), 1);
        assert!(service.queue().peek(0).is_empty());

        let dead = service.dead_letters();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].id(), id);
        assert_eq!(dead[0].state(), QueueItemState::Failed);

        assert_eq!(service.purge_dead_letters().len(), 1);
        assert!(service.queue().is_empty());
    }

    #[tokio::test]
    async fn test_process_cancelled_does_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (service, transport) = service(dir.path());
        service.queue().add(email("a"));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = service.process(&cancel).await.unwrap();

        assert_eq!(summary, PassSummary::default());
        assert_eq!(service.queue().peek(0).len(), 1);
        assert_eq!(transport.delivered_count(), 0);
    }

    #[tokio::test]
    async fn test_overlapping_pass_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _) = service(dir.path());

        let _held = service.pass_lock.lock().await;
        assert!(service.process(&CancellationToken::new()).await.is_none());
    }

    #[tokio::test]
    async fn test_store_halts_processing() {
        let dir = tempfile::tempdir().unwrap();
        let (service, transport) = service(dir.path());

        service.store_queue().await;
        assert!(!service.is_processing());

        service.queue().add(email("a"));
        let summary = service.process(&CancellationToken::new()).await.unwrap();
        assert_eq!(summary.rounds, 0);
        assert_eq!(transport.delivered_count(), 0);

        service.resume();
        let summary = service.process(&CancellationToken::new()).await.unwrap();
        assert_eq!(summary.delivered, 1);
    }

    #[tokio::test]
    async fn test_check_queue_path_creates_folder() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("nested").join("queue");
        let (service, _) = service(&folder);

        assert!(service.check_queue_path().await);
        assert!(folder.is_dir());
        assert!(service.check_queue_path().await);
    }

    #[tokio::test]
    async fn test_check_queue_path_fails_on_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("queue");
        tokio::fs::write(&blocker, b"not a folder").await.unwrap();
        let (service, _) = service(&blocker);
        service.queue().add(email("a"));

        assert!(!service.check_queue_path().await);
        assert_eq!(service.store_queue().await, StoreSummary::default());
        assert_eq!(service.restore_queue().await, RestoreSummary::default());
        assert_eq!(service.queue().len(), 1);
    }

    #[tokio::test]
    async fn test_store_persists_items_added_while_storing() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _) = service(dir.path());
        let service = Arc::new(service);
        for i in 0..50 {
            service.queue().add(email(&format!("initial {}", i)));
        }

        let producer = {
            let service = service.clone();
            tokio::spawn(async move {
                for i in 0..100 {
                    service.queue().add(email(&format!("late {}", i)));
                    tokio::task::yield_now().await;
                }
            })
        };

        let summary = service.store_queue().await;
        producer.await.unwrap();

        assert_eq!(summary.stored, 150);
        assert_eq!(summary.failed, 0);
        assert!(service.queue().is_empty());
        assert_eq!(persistence::list_items(dir.path()).await.unwrap().len(), 150);
    }

    #[tokio::test]
    async fn test_store_waits_for_in_flight_pass() {
        let dir = tempfile::tempdir().unwrap();
        let config = MessagingConfig {
            queue_folder: dir.path().to_path_buf(),
            ..Default::default()
        };
        let transport = Arc::new(GatedTransport::default());
        let processor = Arc::new(EmailProcessor::new(transport.clone(), 2));
        let service = Arc::new(MessagingService::new(
            &config,
            Arc::new(MessageQueue::new()),
            processor,
        ));
        let message = email("gated");
        let id = message.id();
        service.queue().add(message);

        let pass = {
            let service = service.clone();
            tokio::spawn(async move { service.process(&CancellationToken::new()).await })
        };
        transport.started.notified().await;

        let store = {
            let service = service.clone();
            tokio::spawn(async move { service.store_queue().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!store.is_finished());
        assert!(!service.is_processing());

        transport.release.notify_one();
        let pass = pass.await.unwrap().unwrap();
        let stored = store.await.unwrap();

        // Exactly one of delivered or persisted
        let delivered = transport.delivered.load(Ordering::SeqCst);
        assert_eq!(delivered + stored.stored, 1);
        assert_eq!(pass.delivered, delivered);
        assert_eq!(
            persistence::item_path(dir.path(), id).exists(),
            stored.stored == 1
        );
        assert!(service.queue().is_empty());
    }
}
