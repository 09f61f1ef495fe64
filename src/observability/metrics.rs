//! Metrics collection and exposition.
//!
//! # Metrics
//! - `shutdown_phase_duration_seconds` (histogram): time spent per phase
//! - `shutdown_callbacks_total` (counter): callback outcomes
//! - `shutdown_rejected_requests_total` (counter): 503s sent while shutting down
//! - `shutdown_exit_total` (counter): how the process ended
//!
//! Recording is a no-op until a recorder is installed.

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::lifecycle::arbiter::ExitOutcome;
use crate::lifecycle::callbacks::CallbackReport;
use crate::lifecycle::shutdown::Phase;

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_phase(phase: Phase, elapsed: Duration) {
    metrics::histogram!("shutdown_phase_duration_seconds", "phase" => phase.as_str())
        .record(elapsed.as_secs_f64());
}

pub fn record_callbacks(report: &CallbackReport) {
    let outcomes = [
        ("completed", report.completed),
        ("cut_off", report.cut_off),
        ("panicked", report.panicked),
    ];
    for (outcome, count) in outcomes {
        if count > 0 {
            metrics::counter!("shutdown_callbacks_total", "outcome" => outcome)
                .increment(count as u64);
        }
    }
}

pub fn record_rejected(server: &str) {
    metrics::counter!("shutdown_rejected_requests_total", "server" => server.to_string())
        .increment(1);
}

pub fn record_exit(outcome: ExitOutcome) {
    metrics::counter!("shutdown_exit_total", "outcome" => outcome.as_str()).increment(1);
}
