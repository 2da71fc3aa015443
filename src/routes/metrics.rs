//! Prometheus metrics endpoint
//!
//! Exposes relay metrics in Prometheus format for monitoring.

use axum::response::IntoResponse;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;

/// Global Prometheus handle for metrics export
static PROMETHEUS_HANDLE: Lazy<PrometheusHandle> = Lazy::new(|| {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
});

/// Initialize metrics (call once at startup)
pub fn init_metrics() {
    // Force initialization of the lazy static
    let _ = &*PROMETHEUS_HANDLE;

    register_metrics();
}

fn register_metrics() {
    metrics::describe_counter!(
        "relay_requests_total",
        "Total number of relayed requests"
    );
    metrics::describe_histogram!(
        "relay_request_duration_seconds",
        "Time until the response head was produced, in seconds"
    );
    metrics::describe_counter!(
        "relay_streamed_bytes_total",
        "Bytes streamed from upstream to callers"
    );
    metrics::describe_counter!(
        "relay_errors_total",
        "Relay failures by kind"
    );
}

/// Prometheus metrics endpoint handler
pub async fn prometheus_metrics() -> impl IntoResponse {
    PROMETHEUS_HANDLE.render()
}

/// Record a relayed request
pub fn record_request(mode: &str, status: u16, duration_secs: f64) {
    metrics::counter!(
        "relay_requests_total",
        "mode" => mode.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("relay_request_duration_seconds", "mode" => mode.to_string())
        .record(duration_secs);
}

pub fn record_streamed_bytes(bytes: u64) {
    metrics::counter!("relay_streamed_bytes_total").increment(bytes);
}

pub fn record_relay_error(kind: &str) {
    metrics::counter!("relay_errors_total", "kind" => kind.to_string()).increment(1);
}
