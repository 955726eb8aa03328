mod settings;

pub use settings::{LoggingConfig, MessagingConfig, Settings, TransportConfig};
