//! Client metrics.
//!
//! # Metrics
//! - `client_requests_total` (counter): calls by client, method key, outcome
//! - `client_request_duration_seconds` (histogram): latency per client
//! - `client_retries_total` (counter): retries by client, method key
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; the embedding application picks the exporter
//! - Outcome is the status code or the fault kind

use std::time::Instant;

pub fn record_request(client: &str, config_key: &str, outcome: &str, start: Instant) {
    metrics::counter!(
        "client_requests_total",
        "client" => client.to_string(),
        "method" => config_key.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
    metrics::histogram!("client_request_duration_seconds", "client" => client.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_retry(client: &str, config_key: &str) {
    metrics::counter!(
        "client_retries_total",
        "client" => client.to_string(),
        "method" => config_key.to_string()
    )
    .increment(1);
}
