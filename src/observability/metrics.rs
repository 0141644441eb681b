//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status, backend
//! - `proxy_request_duration_seconds` (histogram): latency distribution
//! - `proxy_no_backend_total` (counter): requests rejected with an all-dead pool
//! - `proxy_backend_health` (gauge): 1=alive, 0=dead

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    describe_counter!("proxy_requests_total", "Total proxied requests");
    describe_histogram!("proxy_request_duration_seconds", "Request latency in seconds");
    describe_counter!("proxy_no_backend_total", "Requests rejected because no backend was alive");
    describe_gauge!("proxy_backend_health", "Backend liveness (1=alive, 0=dead)");

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, backend: &str, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("backend", backend.to_string()),
    ];
    counter!("proxy_requests_total", &labels[..]).increment(1);
    histogram!("proxy_request_duration_seconds", &labels[..]).record(start.elapsed().as_secs_f64());
}

pub fn record_no_backend() {
    counter!("proxy_no_backend_total").increment(1);
}

pub fn record_backend_health(backend: &str, alive: bool) {
    gauge!("proxy_backend_health", "backend" => backend.to_string()).set(if alive { 1.0 } else { 0.0 });
}
