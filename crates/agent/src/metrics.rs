//! Handler metrics
//!
//! Recorded through the `metrics` facade; the server installs the
//! Prometheus recorder. Without a recorder these calls are no-ops.

use std::time::Duration;

use site_inspector_core::PipelineStage;

pub const EVENTS_TOTAL: &str = "site_inspector_events_total";
pub const STAGE_LATENCY_MS: &str = "site_inspector_stage_latency_ms";
pub const LOG_FAILURES_TOTAL: &str = "site_inspector_log_failures_total";
pub const RUN_LATENCY_MS: &str = "site_inspector_run_latency_ms";

/// One handled event by kind and outcome (`replied`, `failed_<stage>`)
pub fn record_event(kind: &'static str, outcome: String) {
    metrics::counter!(EVENTS_TOTAL, "kind" => kind, "outcome" => outcome).increment(1);
}

pub fn record_stage_latency(stage: PipelineStage, elapsed: Duration) {
    metrics::histogram!(STAGE_LATENCY_MS, "stage" => stage.as_str())
        .record(elapsed.as_secs_f64() * 1000.0);
}

pub fn record_run_latency(kind: &'static str, elapsed: Duration) {
    metrics::histogram!(RUN_LATENCY_MS, "kind" => kind).record(elapsed.as_secs_f64() * 1000.0);
}

pub fn record_log_failure(backend: String) {
    metrics::counter!(LOG_FAILURES_TOTAL, "backend" => backend).increment(1);
}
