//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dataset_config_checks_total` (counter): revalidations by outcome
//!   (`replaced`, `unchanged`, `unreachable`, `invalid`)
//! - `dataset_config_datasets` (gauge): datasets in the current snapshot
//! - `dataset_cache_lookups_total` (counter): lookups by result
//!   (`hit`, `miss`, `expired`, `changed`)
//! - `dataset_cache_entries` (gauge): cached payloads
//! - `dataset_loads_total` (counter): loader calls by loader and outcome
//! - `dataset_load_duration_seconds` (histogram): loader latency
//! - `query_params_discarded_total` (counter): parameters matching no namespace
//!
//! Recording is a no-op until a recorder is installed.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

pub fn record_config_check(outcome: &str) {
    ::metrics::counter!("dataset_config_checks_total", "outcome" => outcome.to_string()).increment(1);
}

pub fn record_snapshot_size(datasets: usize) {
    ::metrics::gauge!("dataset_config_datasets").set(datasets as f64);
}

pub fn record_cache_lookup(result: &str) {
    ::metrics::counter!("dataset_cache_lookups_total", "result" => result.to_string()).increment(1);
}

pub fn record_cache_size(entries: usize) {
    ::metrics::gauge!("dataset_cache_entries").set(entries as f64);
}

pub fn record_load(loader: &str, success: bool, elapsed: Duration) {
    let outcome = if success { "ok" } else { "error" };
    ::metrics::counter!(
        "dataset_loads_total",
        "loader" => loader.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    ::metrics::histogram!("dataset_load_duration_seconds", "loader" => loader.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_discarded_params(count: usize) {
    ::metrics::counter!("query_params_discarded_total").increment(count as u64);
}

/// Install the Prometheus recorder and serve `/metrics` on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Prometheus exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install Prometheus exporter"),
    }
}
