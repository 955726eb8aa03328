//! Wiring of the delivery stack from settings.

use std::sync::Arc;

use crate::config::Settings;
use crate::error::Result;
use crate::message::{MessageFactory, OutboundMessage};
use crate::processor::EmailProcessor;
use crate::queue::MessageQueue;
use crate::sender::QueuedMessageSender;
use crate::service::MessagingService;
use crate::tasks::MessagingWorker;
use crate::transport::{create_transport, Transport};

/// Shared handles to every component of the outbound pipeline
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub factory: Arc<MessageFactory>,
    pub sender: Arc<QueuedMessageSender>,
    pub service: Arc<MessagingService>,
    pub worker: Arc<MessagingWorker>,
}

impl AppState {
    /// Build the stack with the transport named in the settings.
    pub fn new(settings: Settings) -> Result<Self> {
        let transport = create_transport(&settings.transport)?;
        Ok(Self::with_transport(settings, transport))
    }

    /// Build the stack around a host-supplied transport (e.g. SMTP).
    pub fn with_transport(settings: Settings, transport: Arc<dyn Transport>) -> Self {
        let queue = Arc::new(MessageQueue::<OutboundMessage>::new());
        let processor = Arc::new(EmailProcessor::new(
            transport,
            settings.messaging.max_retries,
        ));
        let service = Arc::new(MessagingService::new(
            &settings.messaging,
            queue.clone(),
            processor,
        ));

        Self {
            factory: Arc::new(MessageFactory::from_settings(&settings)),
            sender: Arc::new(QueuedMessageSender::new(queue)),
            worker: Arc::new(MessagingWorker::new(service.clone())),
            service,
            settings: Arc::new(settings),
        }
    }

    /// Restore persisted messages and start the background worker.
    pub async fn start(&self) -> Result<()> {
        self.worker.start().await?;
        Ok(())
    }
}
