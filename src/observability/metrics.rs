//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gate_admissions_total` (counter): admission decisions by outcome
//! - `gate_alerts_total` (counter): alert deliveries by outcome
//! - `gate_tracked_clients` (gauge): client records currently held
//! - `gate_requests_total` (counter): handled requests by endpoint and status

use std::net::SocketAddr;
use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus exporter on `addr`. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// `outcome` is one of `allowed`, `rate_limit`, `spam`.
pub fn record_admission(outcome: &'static str) {
    counter!("gate_admissions_total", "outcome" => outcome).increment(1);
}

/// `outcome` is one of `sent`, `failed`, `dropped`, `disabled`.
pub fn record_alert(outcome: &'static str) {
    counter!("gate_alerts_total", "outcome" => outcome).increment(1);
}

pub fn record_tracked_clients(count: usize) {
    gauge!("gate_tracked_clients").set(count as f64);
}

pub fn record_request(endpoint: &'static str, status: u16) {
    counter!("gate_requests_total", "endpoint" => endpoint, "status" => status.to_string())
        .increment(1);
}
