//! Background tasks.

mod messaging;

pub use messaging::{MessagingWorker, WorkerError, WorkerState};
