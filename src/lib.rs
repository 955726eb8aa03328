// Core model
pub mod message;
pub mod queue;
pub mod template;

// Delivery
pub mod processor;
pub mod sender;
pub mod service;
pub mod transport;

// Infrastructure
pub mod config;
pub mod error;
pub mod metrics;
pub mod telemetry;

// Supporting modules
pub mod app;
pub mod shutdown;
pub mod tasks;
