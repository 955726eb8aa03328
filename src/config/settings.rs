use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::Deserialize;
use std::env;

use crate::error::Result;
use crate::message::MailAddress;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub messaging: MessagingConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagingConfig {
    /// Folder holding persisted queue items (relative to the executable)
    #[serde(default = "default_queue_folder")]
    pub queue_folder: PathBuf,
    /// Folder holding message templates (relative to the executable)
    #[serde(default = "default_template_folder")]
    pub template_folder: PathBuf,
    /// Seconds between processing passes
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
    /// Failed attempts allowed before an item becomes terminal
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    /// Transport implementation: "memory", "log", "none", or host-provided
    #[serde(default = "default_transport_kind")]
    pub kind: String,
    #[serde(default = "default_transport_host")]
    pub host: String,
    #[serde(default = "default_transport_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub use_ssl: bool,
    /// Sender used when a producer does not name one
    pub default_sender: Option<String>,
    pub default_sender_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_queue_folder() -> PathBuf {
    PathBuf::from("Queue")
}

fn default_template_folder() -> PathBuf {
    PathBuf::from("Templates")
}

fn default_interval_seconds() -> u64 {
    60 // 1 minute
}

fn default_max_retries() -> u32 {
    5
}

fn default_transport_kind() -> String {
    "log".to_string()
}

fn default_transport_host() -> String {
    "localhost".to_string()
}

fn default_transport_port() -> u16 {
    25
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Settings {
    pub fn new() -> Result<Self> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("messaging.queue_folder", "Queue")?
            .set_default("messaging.template_folder", "Templates")?
            .set_default("messaging.interval_seconds", 60)?
            .set_default("messaging.max_retries", 5)?
            .set_default("transport.kind", "log")?
            .set_default("logging.level", "info")?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables
            // OUTBOX__MESSAGING__MAX_RETRIES, OUTBOX__TRANSPORT__HOST, etc.
            .add_source(
                Environment::with_prefix("OUTBOX")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        Ok(builder.build()?.try_deserialize()?)
    }
}

impl MessagingConfig {
    /// Queue folder, resolved against the executable's directory if relative
    pub fn queue_path(&self) -> PathBuf {
        resolve_path(&self.queue_folder)
    }

    /// Template folder, resolved against the executable's directory if relative
    pub fn template_path(&self) -> PathBuf {
        resolve_path(&self.template_folder)
    }
}

impl TransportConfig {
    pub fn default_sender(&self) -> Option<MailAddress> {
        let address = self.default_sender.as_deref()?.trim();
        if address.is_empty() {
            return None;
        }

        Some(MailAddress::with_name(
            address,
            self.default_sender_name.clone().unwrap_or_default(),
        ))
    }
}

fn resolve_path(path: &Path) -> PathBuf {
    if path.is_absolute() || path.as_os_str().is_empty() {
        return path.to_path_buf();
    }

    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(path)))
        .unwrap_or_else(|| path.to_path_buf())
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            queue_folder: default_queue_folder(),
            template_folder: default_template_folder(),
            interval_seconds: default_interval_seconds(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: default_transport_kind(),
            host: default_transport_host(),
            port: default_transport_port(),
            username: None,
            password: None,
            use_ssl: false,
            default_sender: None,
            default_sender_name: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
