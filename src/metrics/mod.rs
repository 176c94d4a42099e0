//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Dispatched transactions
//! - Nonce cache misses and recoveries
//! - Admission rejections
//! - Dispatch and registration failures

use lazy_static::lazy_static;
use prometheus::{register_counter_vec, CounterVec, Encoder, TextEncoder};

lazy_static! {
    pub static ref TX_DISPATCHED: CounterVec = register_counter_vec!(
        "tesseract_dispatcher_transactions_dispatched_total",
        "Total transactions dispatched",
        &["chain_id"]
    ).unwrap();

    pub static ref NONCE_CACHE_MISSES: CounterVec = register_counter_vec!(
        "tesseract_dispatcher_nonce_cache_misses_total",
        "Total nonce lookups that fell back to the network",
        &["chain_id"]
    ).unwrap();

    pub static ref NONCE_RECOVERIES: CounterVec = register_counter_vec!(
        "tesseract_dispatcher_nonce_recoveries_total",
        "Total nonce conflicts retried with a fresh nonce",
        &["chain_id"]
    ).unwrap();

    pub static ref ADMISSION_REJECTED: CounterVec = register_counter_vec!(
        "tesseract_dispatcher_admission_rejected_total",
        "Total submissions refused by the admission gate",
        &["chain_id", "reason"]
    ).unwrap();

    pub static ref DISPATCH_FAILED: CounterVec = register_counter_vec!(
        "tesseract_dispatcher_dispatch_failed_total",
        "Total dispatches that failed after admission",
        &["chain_id", "kind"]
    ).unwrap();

    pub static ref REGISTRATION_FAILED: CounterVec = register_counter_vec!(
        "tesseract_dispatcher_registration_failed_total",
        "Total sent transactions the escalator did not accept",
        &["chain_id"]
    ).unwrap();
}

/// Encode all registered metrics in the text exposition format
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

// Helper functions to record metrics

pub fn record_dispatched(chain_id: u64) {
    TX_DISPATCHED
        .with_label_values(&[&chain_id.to_string()])
        .inc();
}

pub fn record_cache_miss(chain_id: u64) {
    NONCE_CACHE_MISSES
        .with_label_values(&[&chain_id.to_string()])
        .inc();
}

pub fn record_nonce_recovery(chain_id: u64) {
    NONCE_RECOVERIES
        .with_label_values(&[&chain_id.to_string()])
        .inc();
}

pub fn record_admission_rejected(chain_id: u64, reason: &str) {
    ADMISSION_REJECTED
        .with_label_values(&[&chain_id.to_string(), reason])
        .inc();
}

pub fn record_dispatch_failed(chain_id: u64, kind: &str) {
    DISPATCH_FAILED
        .with_label_values(&[&chain_id.to_string(), kind])
        .inc();
}

pub fn record_registration_failed(chain_id: u64) {
    REGISTRATION_FAILED
        .with_label_values(&[&chain_id.to_string()])
        .inc();
}
