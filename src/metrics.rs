//! Metrics instrumentation for the monitor
//!
//! Provides Prometheus-compatible metrics for:
//! - Feed connection lifecycle and frame decoding
//! - Chunk reassembly pressure
//! - Finality pipeline throughput and queue depth

use metrics::{counter, gauge};

/// Metric names as constants for consistency
pub mod names {
    pub const FEED_EVENTS: &str = "feed_events_total";
    pub const FEED_RECONNECTS: &str = "feed_reconnects_total";
    pub const FEED_FRAMES_DROPPED: &str = "feed_frames_dropped_total";
    pub const CHUNKS_REJECTED: &str = "chunks_rejected_total";
    pub const CHUNK_BUFFERS: &str = "chunk_buffers_outstanding";
    pub const BUFFER_EVICTIONS: &str = "chunk_buffer_evictions_total";
    pub const MESSAGES_FINALIZED: &str = "messages_finalized_total";
    pub const QUEUE_EVICTIONS: &str = "queue_evictions_total";
    pub const QUEUE_DEPTH: &str = "queue_depth";
    pub const HANDLER_ERRORS: &str = "handler_errors_total";
    pub const PENDING_TRANSACTIONS: &str = "pending_transactions";
}

/// Record one decoded feed event
pub fn record_event(tag: &'static str) {
    counter!(names::FEED_EVENTS, "tag" => tag).increment(1);
}

/// Record a successful reconnection
pub fn record_reconnect() {
    counter!(names::FEED_RECONNECTS).increment(1);
}

/// Record an inbound frame dropped for failing to parse
pub fn record_dropped_frame() {
    counter!(names::FEED_FRAMES_DROPPED).increment(1);
}

/// Record a rejected chunk descriptor
pub fn record_chunk_rejected(reason: &'static str) {
    counter!(names::CHUNKS_REJECTED, "reason" => reason).increment(1);
}

/// Track the number of incomplete reassembly buffers
pub fn set_outstanding_buffers(count: usize) {
    gauge!(names::CHUNK_BUFFERS).set(count as f64);
}

/// Record an incomplete buffer dropped for capacity or staleness
pub fn record_buffer_eviction(reason: &'static str) {
    counter!(names::BUFFER_EVICTIONS, "reason" => reason).increment(1);
}

/// Record a message reaching finality
pub fn record_finalized(message_type: &'static str) {
    counter!(names::MESSAGES_FINALIZED, "type" => message_type).increment(1);
}

/// Record an eviction from the bounded message queue
pub fn record_queue_eviction() {
    counter!(names::QUEUE_EVICTIONS).increment(1);
}

/// Track the message queue depth
pub fn set_queue_depth(depth: usize) {
    gauge!(names::QUEUE_DEPTH).set(depth as f64);
}

/// Record a consumer handler failure
pub fn record_handler_error() {
    counter!(names::HANDLER_ERRORS).increment(1);
}

/// Track the number of transactions awaiting finality
pub fn set_pending(count: usize) {
    gauge!(names::PENDING_TRANSACTIONS).set(count as f64);
}

/// Initialize the Prometheus metrics exporter
/// Returns a handle to the metrics endpoint
pub fn init_metrics() -> metrics_exporter_prometheus::PrometheusHandle {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    builder
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
}
