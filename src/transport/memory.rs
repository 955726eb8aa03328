use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::message::EmailMessage;

use super::{Transport, TransportError};

/// Transport that keeps delivered messages in memory.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    delivered: Mutex<Vec<EmailMessage>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages delivered so far, oldest first
    pub fn delivered(&self) -> Vec<EmailMessage> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn delivered_count(&self) -> usize {
        self.delivered.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn name(&self) -> &str {
        "memory"
    }

    async fn send(&self, message: &EmailMessage, cancel: &CancellationToken) -> Result<(), TransportError> {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }

        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());
        Ok(())
    }
}

/// Transport that only logs what it would have sent.
#[derive(Debug, Default)]
pub struct LogTransport;

impl LogTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for LogTransport {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, message: &EmailMessage, _cancel: &CancellationToken) -> Result<(), TransportError> {
        tracing::info!(
            message_id = %message.header.id,
            from = %message.from,
            recipients = message.recipients.len(),
            subject = %message.subject,
            "Message delivered to log transport"
        );
        Ok(())
    }
}
