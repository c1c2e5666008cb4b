//! Introspection API for health checks and Prometheus metrics
//!
//! Served on its own port so the task-facing route table stays exactly the
//! v1/v2/v3 endpoints.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::sync::Arc;
use task_endpoint::MemoryEngineState;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine_state: Arc<MemoryEngineState>,
    pub cluster: String,
}

impl AppState {
    pub fn new(engine_state: Arc<MemoryEngineState>, cluster: impl Into<String>) -> Self {
        Self {
            engine_state,
            cluster: cluster.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    cluster: String,
    tasks: usize,
}

async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = HealthResponse {
        status: "healthy",
        cluster: state.cluster.clone(),
        tasks: state.engine_state.len(),
    };
    (StatusCode::OK, Json(health))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the introspection router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the introspection server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("127.0.0.1:{}", port);
    info!(addr = %addr, "Starting introspection server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use task_endpoint::{EndpointMetrics, Task};
    use tower::ServiceExt;

    fn test_state() -> Arc<AppState> {
        let engine_state = Arc::new(MemoryEngineState::new());
        engine_state.add_task(Task {
            arn: "t1".to_string(),
            ..Default::default()
        });
        Arc::new(AppState::new(engine_state, "default"))
    }

    #[tokio::test]
    async fn test_healthz_reports_tracked_tasks() {
        let app = create_router(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["cluster"], "default");
        assert_eq!(health["tasks"], 1);
    }

    #[tokio::test]
    async fn test_metrics_exposes_endpoint_counters() {
        let metrics = EndpointMetrics::new();
        metrics.observe_request("v2", "task_metadata", 200, 0.001);

        let app = create_router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("task_endpoint_requests_total"));
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let app = create_router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v2/metadata")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
