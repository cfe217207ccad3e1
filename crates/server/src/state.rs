//! Application State
//!
//! Shared state of the health and metrics endpoints.

use std::sync::Arc;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusHandle;
use site_inspector_config::Settings;
use site_inspector_core::InteractionLog;

use crate::dispatcher::Dispatcher;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    /// `None` when `observability.metrics_enabled` is off
    pub metrics: Option<PrometheusHandle>,
    /// Probed by `/ready`
    pub log: Arc<dyn InteractionLog>,
    pub dispatcher: Dispatcher,
    started_at: Instant,
}

impl AppState {
    pub fn new(
        settings: Arc<Settings>,
        log: Arc<dyn InteractionLog>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            settings,
            metrics: None,
            log,
            dispatcher,
            started_at: Instant::now(),
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
