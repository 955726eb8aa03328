//! Delivery transports.
//!
//! A [`Transport`] performs the actual hand-off of an email to the outside
//! world. The crate ships an in-memory transport (tests, local runs) and a
//! logging transport; wire protocols such as SMTP are provided by the host
//! through the same trait.

mod memory;

pub use memory::{LogTransport, MemoryTransport};

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::TransportConfig;
use crate::message::EmailMessage;

/// Errors returned by a delivery attempt
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Delivery timed out after {0} seconds")]
    Timeout(u64),

    #[error("Message rejected: {0}")]
    Rejected(String),

    #[error("Delivery cancelled")]
    Cancelled,

    #[error("Unsupported transport: {0}")]
    Unsupported(String),
}

/// Hands a single email to the delivery channel.
///
/// Implementations must be thread-safe and should enforce their own I/O
/// timeouts; the queue layer does not impose one.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Deliver one message. Any error counts as a failed attempt.
    async fn send(&self, message: &EmailMessage, cancel: &CancellationToken) -> Result<(), TransportError>;
}

/// Create a transport based on configuration.
///
/// - `"memory"`: records deliveries in memory
/// - `"log"` / `"none"`: logs and accepts every message
///
/// Any other kind (e.g. `"smtp"`) must be supplied by the host.
pub fn create_transport(config: &TransportConfig) -> Result<Arc<dyn Transport>, TransportError> {
    match config.kind.as_str() {
        "memory" => {
            tracing::info!(transport = "memory", "Creating in-memory transport");
            Ok(Arc::new(MemoryTransport::new()))
        }
        "log" | "none" => {
            tracing::info!(transport = %config.kind, "Creating logging transport");
            Ok(Arc::new(LogTransport::new()))
        }
        other => {
            tracing::warn!(
                transport = %other,
                host = %config.host,
                port = config.port,
                "No built-in transport for this kind"
            );
            Err(TransportError::Unsupported(other.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(kind: &str) -> TransportConfig {
        TransportConfig {
            kind: kind.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_builtin_transports() {
        assert_eq!(create_transport(&config("memory")).unwrap().name(), "memory");
        assert_eq!(create_transport(&config("log")).unwrap().name(), "log");
        assert_eq!(create_transport(&config("none")).unwrap().name(), "log");
    }

    #[test]
    fn test_create_unsupported_transport() {
        assert!(matches!(
            create_transport(&config("smtp")),
            Err(TransportError::Unsupported(kind)) if kind == "smtp"
        ));
    }
}
