//! Prometheus metrics for the outbound queue.
//!
//! - Queue metrics (enqueued, depth, dead letters)
//! - Delivery metrics (delivered, failed attempts, pass duration)
//! - Persistence metrics (stored, restored, storage errors)

mod helpers;

pub use helpers::{encode_metrics, MessagingMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "outbox";

lazy_static! {
    // ============================================================================
    // Queue Metrics
    // ============================================================================

    /// Total messages accepted from producers
    pub static ref QUEUE_ENQUEUED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_queue_enqueued_total", METRIC_PREFIX),
        "Total messages accepted into the outbound queue"
    ).unwrap();

    /// Messages currently resident in memory
    pub static ref QUEUE_DEPTH: IntGauge = register_int_gauge!(
        format!("{}_queue_depth", METRIC_PREFIX),
        "Number of messages resident in the outbound queue"
    ).unwrap();

    /// Messages that reached a terminal state without delivery
    pub static ref QUEUE_DEAD_LETTERED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_queue_dead_lettered_total", METRIC_PREFIX),
        "Total messages moved to the dead-letter state"
    ).unwrap();

    // ============================================================================
    // Delivery Metrics
    // ============================================================================

    /// Successfully delivered messages
    pub static ref MESSAGES_DELIVERED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_messages_delivered_total", METRIC_PREFIX),
        "Total messages handed to the transport successfully"
    ).unwrap();

    /// Failed delivery attempts by outcome (retry, failed)
    pub static ref DELIVERY_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_delivery_failures_total", METRIC_PREFIX),
        "Total failed delivery attempts",
        &["outcome"]
    ).unwrap();

    /// Duration of a full processing pass
    pub static ref PROCESSING_PASS_DURATION: Histogram = register_histogram!(
        format!("{}_processing_pass_duration_seconds", METRIC_PREFIX),
        "Duration of a processing pass in seconds",
        vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0]
    ).unwrap();

    // ============================================================================
    // Persistence Metrics
    // ============================================================================

    /// Messages written to the queue folder
    pub static ref MESSAGES_STORED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_messages_stored_total", METRIC_PREFIX),
        "Total messages persisted to disk on shutdown"
    ).unwrap();

    /// Messages rehydrated from the queue folder
    pub static ref MESSAGES_RESTORED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_messages_restored_total", METRIC_PREFIX),
        "Total messages restored from disk on startup"
    ).unwrap();

    /// Storage errors by operation (store, restore)
    pub static ref STORAGE_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_storage_errors_total", METRIC_PREFIX),
        "Total persistence errors",
        &["operation"]
    ).unwrap();
}
