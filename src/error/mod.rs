use thiserror::Error;

use crate::tasks::WorkerError;
use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),
}

pub type Result<T> = std::result::Result<T, AppError>;
