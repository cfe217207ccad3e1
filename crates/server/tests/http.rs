//! Health, readiness and metrics endpoints

mod support;

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use metrics_exporter_prometheus::PrometheusBuilder;
use tower::ServiceExt;

use site_inspector_config::Settings;
use site_inspector_core::LogError;
use site_inspector_persistence::InMemoryLog;
use site_inspector_server::{create_router, AppState, Dispatcher};

use support::harness_with_log;

fn state(log: Arc<InMemoryLog>) -> AppState {
    let h = harness_with_log(log.clone());
    AppState::new(
        Arc::new(Settings::default()),
        log,
        Dispatcher::new(h.handler),
    )
}

async fn get(state: AppState, uri: &str) -> (StatusCode, String) {
    let response = create_router(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn health_reports_in_flight_runs() {
    let (status, body) = get(state(Arc::new(InMemoryLog::new())), "/health").await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["in_flight"], 0);
}

#[tokio::test]
async fn ready_when_log_answers() {
    let (status, body) = get(state(Arc::new(InMemoryLog::new())), "/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("memory"));
}

#[tokio::test]
async fn not_ready_when_log_is_down() {
    let log = Arc::new(InMemoryLog::failing(LogError::Unavailable("sheets down".into())));
    let (status, body) = get(state(log), "/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body.contains("sheets down"));
}

#[tokio::test]
async fn metrics_disabled_is_not_found() {
    let (status, _) = get(state(Arc::new(InMemoryLog::new())), "/metrics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn metrics_rendered_from_handle() {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    let state = state(Arc::new(InMemoryLog::new())).with_metrics(handle);

    let (status, _) = get(state, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
}
