//! Prometheus metrics for build observability.

use metrics::{counter, histogram};

/// Initialize metrics exporter (Prometheus).
pub fn init_metrics() {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    if let Err(e) = builder.install() {
        tracing::warn!("Failed to install Prometheus exporter: {}", e);
    }
}

/// Record a build state transition.
pub fn build_status_changed(status: &str) {
    counter!("forge_builds_total", "status" => status.to_string()).increment(1);
}

/// Record build duration.
pub fn build_duration(duration_ms: u64) {
    histogram!("forge_build_duration_ms").record(duration_ms as f64);
}

/// Record an emitted stream event.
pub fn event_emitted(kind: &'static str) {
    counter!("forge_events_emitted_total", "type" => kind).increment(1);
}

/// Record a ledger submission outcome.
pub fn ledger_submission(result: &'static str) {
    counter!("forge_ledger_submissions_total", "result" => result).increment(1);
}

/// Record a generation call that degraded to template output.
pub fn generator_fallback() {
    counter!("forge_generator_fallbacks_total").increment(1);
}
