//! Producer-facing API.
//!
//! Application code hands messages to a [`MessageSender`] and never touches
//! the queue directly. Enqueueing is synchronous and never fails once the
//! message is in memory; delivery happens later on the worker.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::message::OutboundMessage;
use crate::metrics::MessagingMetrics;
use crate::queue::{MessageQueue, QueueItem};

#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Enqueue a message for deferred delivery, returning its id.
    fn send_message(&self, message: OutboundMessage) -> Uuid;

    /// Async variant; completes as soon as the message is enqueued.
    async fn send_message_async(&self, message: OutboundMessage) -> Uuid {
        self.send_message(message)
    }
}

/// [`MessageSender`] backed by the shared in-memory queue
#[derive(Clone)]
pub struct QueuedMessageSender {
    queue: Arc<MessageQueue<OutboundMessage>>,
}

impl QueuedMessageSender {
    pub fn new(queue: Arc<MessageQueue<OutboundMessage>>) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl MessageSender for QueuedMessageSender {
    fn send_message(&self, message: OutboundMessage) -> Uuid {
        let id = message.id();
        let kind = message.kind();

        if self.queue.add(message) {
            MessagingMetrics::record_enqueued();
            MessagingMetrics::set_queue_depth(self.queue.len());
            tracing::debug!(message_id = %id, kind = %kind, "Message queued for delivery");
        }

        id
    }
}
