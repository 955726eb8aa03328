//! Queue item capability set: identity, enqueue time, lifecycle state and
//! retry bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a queued item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub enum QueueItemState {
    /// Freshly enqueued, never attempted
    #[default]
    New,
    /// A delivery attempt is in flight
    Processing,
    /// Delivered, awaiting removal
    Complete,
    /// Last attempt failed, another attempt is allowed
    CanRetry,
    /// Retries exhausted or item unprocessable
    Failed,
}

impl QueueItemState {
    /// Terminal items are never handed out by a peek.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// Bookkeeping fields shared by every queue item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemHeader {
    /// Unique identifier, used as the dedup and removal key
    pub id: Uuid,
    /// When the item was (re)queued
    pub queued_at: DateTime<Utc>,
    /// Current lifecycle state
    #[serde(default)]
    pub state: QueueItemState,
    /// Number of failed delivery attempts
    #[serde(default)]
    pub retry_count: u32,
}

impl ItemHeader {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            queued_at: Utc::now(),
            state: QueueItemState::New,
            retry_count: 0,
        }
    }

    /// Reset everything except the identity, as done on enqueue.
    pub(crate) fn reset(&mut self) {
        self.queued_at = Utc::now();
        self.state = QueueItemState::New;
        self.retry_count = 0;
    }

    /// Record one failed attempt and move to `CanRetry` or `Failed`.
    ///
    /// The bound is checked after the increment: with `max_retries = N` the
    /// `N+1`-th failure is terminal.
    pub fn record_failure(&mut self, max_retries: u32) -> QueueItemState {
        self.retry_count = self.retry_count.saturating_add(1);
        self.state = if self.retry_count <= max_retries {
            QueueItemState::CanRetry
        } else {
            QueueItemState::Failed
        };
        self.state
    }
}

impl Default for ItemHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// Anything that can sit in a [`MessageQueue`](super::MessageQueue).
pub trait QueueItem: Clone + Send + Sync + 'static {
    fn header(&self) -> &ItemHeader;

    fn header_mut(&mut self) -> &mut ItemHeader;

    fn id(&self) -> Uuid {
        self.header().id
    }

    fn state(&self) -> QueueItemState {
        self.header().state
    }

    fn retry_count(&self) -> u32 {
        self.header().retry_count
    }

    fn queued_at(&self) -> DateTime<Utc> {
        self.header().queued_at
    }
}
