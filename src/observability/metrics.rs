//! Metrics collection and exposition.
//!
//! # Metrics
//! - `deadline_resolved_total` (counter): deadlines resolved, by `source`
//! - `deadline_malformed_header_total` (counter): unparsable deadline headers
//! - `deadline_expired_total` (counter): expiries, by `phase`
//! - `deadline_remaining_seconds` (histogram): budget left when enforcement starts
//! - `messages_processed_total` (counter): consumer outcomes, by `outcome`

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::deadline::{DeadlineSource, ExpiryPhase};

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_deadline_resolved(source: DeadlineSource) {
    ::metrics::counter!("deadline_resolved_total", "source" => source.as_str()).increment(1);
}

pub fn record_malformed_header() {
    ::metrics::counter!("deadline_malformed_header_total").increment(1);
}

pub fn record_deadline_expired(phase: ExpiryPhase) {
    ::metrics::counter!("deadline_expired_total", "phase" => phase.as_str()).increment(1);
}

pub fn record_remaining(secs: f64) {
    ::metrics::histogram!("deadline_remaining_seconds").record(secs);
}

pub fn record_message_processed(outcome: &'static str) {
    ::metrics::counter!("messages_processed_total", "outcome" => outcome).increment(1);
}
