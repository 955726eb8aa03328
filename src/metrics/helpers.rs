//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use super::{
    DELIVERY_FAILURES_TOTAL, MESSAGES_DELIVERED_TOTAL, MESSAGES_RESTORED_TOTAL,
    MESSAGES_STORED_TOTAL, PROCESSING_PASS_DURATION, QUEUE_DEAD_LETTERED_TOTAL, QUEUE_DEPTH,
    QUEUE_ENQUEUED_TOTAL, STORAGE_ERRORS_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording queue and delivery metrics
pub struct MessagingMetrics;

impl MessagingMetrics {
    pub fn record_enqueued() {
        QUEUE_ENQUEUED_TOTAL.inc();
    }

    pub fn set_queue_depth(depth: usize) {
        QUEUE_DEPTH.set(depth as i64);
    }

    pub fn record_delivered() {
        MESSAGES_DELIVERED_TOTAL.inc();
    }

    /// Record a failed attempt that may still be retried
    pub fn record_retry() {
        DELIVERY_FAILURES_TOTAL.with_label_values(&["retry"]).inc();
    }

    /// Record a failed attempt that exhausted the retry bound
    pub fn record_failed() {
        DELIVERY_FAILURES_TOTAL.with_label_values(&["failed"]).inc();
        QUEUE_DEAD_LETTERED_TOTAL.inc();
    }

    /// Record an item routed to dead-letter without a delivery attempt
    pub fn record_rejected() {
        QUEUE_DEAD_LETTERED_TOTAL.inc();
    }

    pub fn record_pass_duration(seconds: f64) {
        PROCESSING_PASS_DURATION.observe(seconds);
    }

    pub fn record_stored(count: u64) {
        MESSAGES_STORED_TOTAL.inc_by(count);
    }

    pub fn record_restored(count: u64) {
        MESSAGES_RESTORED_TOTAL.inc_by(count);
    }

    pub fn record_storage_error(operation: &str) {
        STORAGE_ERRORS_TOTAL.with_label_values(&[operation]).inc();
    }
}
