//! Metrics collection and Prometheus export.
//!
//! Installs the global recorder and holds the handle the /metrics endpoint
//! renders from. Counters are recorded through the `metrics` facade, so they
//! are no-ops until [`init_metrics`] has run (which keeps tests quiet).

use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

use crate::permissions::AccessDecision;

/// Global handle to the Prometheus recorder.
pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Call once at startup.
pub fn init_metrics() -> anyhow::Result<()> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install Prometheus recorder: {}", e))?;

    METRICS_HANDLE
        .set(handle)
        .map_err(|_| anyhow::anyhow!("metrics recorder already initialized"))
}

/// Current metrics in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized".to_string())
}

pub fn record_access_decision(decision: &AccessDecision) {
    let (outcome, reason) = match decision {
        AccessDecision::Allowed(reason) => ("allowed", reason.as_str()),
        AccessDecision::Denied { page: Some(_), .. } => ("denied", "page"),
        AccessDecision::Denied { page: None, .. } => ("denied", "module"),
    };

    counter!(
        "portal_access_decisions_total",
        "outcome" => outcome,
        "reason" => reason
    )
    .increment(1);
}

/// `source` is one of `modules`, `pages` or `view_matrix`.
pub fn record_fetch_failure(source: &'static str) {
    counter!("portal_permission_fetch_failures_total", "source" => source).increment(1);
}
