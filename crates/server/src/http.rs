//! HTTP Endpoints
//!
//! Liveness, readiness and Prometheus metrics. The bot itself talks to
//! Telegram over long polling, so nothing user-facing is served here.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::metrics::metrics_handler;
use crate::state::AppState;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness: the process is up
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": format!("{:?}", state.settings.environment).to_lowercase(),
        "uptime_secs": state.uptime_secs(),
        "in_flight": state.dispatcher.in_flight(),
    }))
}

/// Readiness: the interaction log answers
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.log.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "log_backend": state.log.name(),
            })),
        ),
        Err(e) => {
            tracing::warn!(backend = state.log.name(), error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "not_ready",
                    "log_backend": state.log.name(),
                    "error": e.to_string(),
                })),
            )
        },
    }
}
