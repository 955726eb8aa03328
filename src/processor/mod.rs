//! Delivery strategies.
//!
//! A [`MessageProcessor`] makes exactly one delivery attempt for exactly one
//! queue item and reports a typed [`DeliveryOutcome`]. Retry bookkeeping is
//! applied to the item before returning; transport errors never propagate
//! past that step.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::message::{MessageKind, OutboundMessage};
use crate::queue::{QueueItem, QueueItemState};
use crate::transport::{Transport, TransportError};

/// Raised for items a processor cannot handle at all.
///
/// This is a wiring mistake, not a transient failure, so no retry is
/// consumed.
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor handles {expected} messages, got {actual}")]
    UnsupportedKind {
        expected: MessageKind,
        actual: MessageKind,
    },
}

/// Result of a single delivery attempt
#[derive(Debug, Clone)]
pub enum DeliveryOutcome {
    /// Transport accepted the message; the caller removes it
    Delivered,
    /// Cancellation was already requested; nothing was attempted
    Skipped,
    /// Attempt failed, another one is allowed
    Retry {
        retry_count: u32,
        error: TransportError,
    },
    /// Attempt failed and the retry bound is exhausted
    Failed {
        retry_count: u32,
        error: TransportError,
    },
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }

    /// State the item should be left in, if the attempt changed it
    pub fn state(&self) -> Option<QueueItemState> {
        match self {
            Self::Retry { .. } => Some(QueueItemState::CanRetry),
            Self::Failed { .. } => Some(QueueItemState::Failed),
            Self::Delivered | Self::Skipped => None,
        }
    }

    pub fn error(&self) -> Option<&TransportError> {
        match self {
            Self::Retry { error, .. } | Self::Failed { error, .. } => Some(error),
            Self::Delivered | Self::Skipped => None,
        }
    }
}

/// One delivery attempt for one item
#[async_trait]
pub trait MessageProcessor: Send + Sync {
    /// The message kind this processor delivers
    fn kind(&self) -> MessageKind;

    /// Attempt delivery of `item`, updating its retry bookkeeping on failure.
    async fn process(
        &self,
        item: &mut OutboundMessage,
        cancel: &CancellationToken,
    ) -> Result<DeliveryOutcome, ProcessorError>;
}

/// Delivers [`MessageKind::Email`] items through a [`Transport`].
pub struct EmailProcessor {
    transport: Arc<dyn Transport>,
    max_retries: u32,
}

impl EmailProcessor {
    pub fn new(transport: Arc<dyn Transport>, max_retries: u32) -> Self {
        Self {
            transport,
            max_retries,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

#[async_trait]
impl MessageProcessor for EmailProcessor {
    fn kind(&self) -> MessageKind {
        MessageKind::Email
    }

    async fn process(
        &self,
        item: &mut OutboundMessage,
        cancel: &CancellationToken,
    ) -> Result<DeliveryOutcome, ProcessorError> {
        let email = match item {
            OutboundMessage::Email(email) => email,
            other => {
                return Err(ProcessorError::UnsupportedKind {
                    expected: MessageKind::Email,
                    actual: other.kind(),
                })
            }
        };

        if cancel.is_cancelled() {
            return Ok(DeliveryOutcome::Skipped);
        }

        match self.transport.send(email, cancel).await {
            Ok(()) => {
                tracing::debug!(
                    message_id = %email.id(),
                    transport = %self.transport.name(),
                    "Message delivered"
                );
                Ok(DeliveryOutcome::Delivered)
            }
            Err(error) => {
                let state = email.header.record_failure(self.max_retries);
                let retry_count = email.header.retry_count;

                tracing::error!(
                    message_id = %email.id(),
                    transport = %self.transport.name(),
                    retry_count = retry_count,
                    max_retries = self.max_retries,
                    state = ?state,
                    error = %error,
                    "Message delivery failed"
                );

                if state == QueueItemState::Failed {
                    Ok(DeliveryOutcome::Failed { retry_count, error })
                } else {
                    Ok(DeliveryOutcome::Retry { retry_count, error })
                }
            }
        }
    }
}
