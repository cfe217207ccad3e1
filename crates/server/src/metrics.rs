//! Prometheus metrics
//!
//! Installs the global recorder once at startup; handler metrics from
//! `site-inspector-agent` are exported through the same recorder.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::state::AppState;
use crate::ServerError;

pub const UPDATES_TOTAL: &str = "site_inspector_updates_total";
pub const POLL_ERRORS_TOTAL: &str = "site_inspector_poll_errors_total";
pub const SUPERSEDED_TOTAL: &str = "site_inspector_superseded_total";

/// Install the Prometheus recorder
pub fn init_metrics() -> Result<PrometheusHandle, ServerError> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ServerError::Metrics(e.to_string()))
}

/// `GET /metrics`
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics disabled".to_string()),
    }
}

/// Update received from the transport, by event kind
pub fn record_update(kind: &'static str) {
    metrics::counter!(UPDATES_TOTAL, "kind" => kind).increment(1);
}

pub fn record_poll_error() {
    metrics::counter!(POLL_ERRORS_TOTAL).increment(1);
}

pub fn record_superseded() {
    metrics::counter!(SUPERSEDED_TOTAL).increment(1);
}
