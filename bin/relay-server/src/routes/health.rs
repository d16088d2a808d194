//! Health / heartbeat endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use utoipa::OpenApi;

use crate::schemas::health::HealthResponse;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_health, get_liveness))]
pub struct HealthApi;

/// Register health-check routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/health", get(get_health))
        .route("/health", get(get_liveness))
}

/// Service health.
///
/// Reports uptime and whether a provider credential is configured. Always
/// HTTP 200 while the process is up; a missing key is reported, not failed.
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses(
        (status = 200, description = "Server is up", body = HealthResponse)
    )
)]
pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let api_key = if state.gateway.is_configured() { "configured" } else { "missing" };
    Json(HealthResponse {
        status: "ok".into(),
        timestamp: Utc::now().to_rfc3339(),
        uptime: state.started_at.elapsed().as_secs(),
        api_key: api_key.into(),
        provider: state.gateway.provider_kind().to_string(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

/// Liveness probe for load balancers.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Process is alive", body = Value)
    )
)]
pub async fn get_liveness() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use relay_core::provider::stub::StubProvider;
    use tower::ServiceExt;

    use super::*;
    use crate::test_support::{body_json, state_with};

    #[tokio::test]
    async fn health_reports_configured_key() {
        let tmp = tempfile::tempdir().unwrap();
        let state = state_with(Arc::new(StubProvider::new("j")), tmp.path(), 1024, 512);

        let response = router()
            .with_state(state)
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["api_key"], "configured");
        assert_eq!(body["provider"], "cloudconvert");
        assert!(body["uptime"].is_u64());
        assert!(chrono::DateTime::parse_from_rfc3339(body["timestamp"].as_str().unwrap()).is_ok());
        assert!(!body["version"].as_str().unwrap_or("").is_empty());
    }

    #[tokio::test]
    async fn health_reports_missing_key() {
        let tmp = tempfile::tempdir().unwrap();
        let state = state_with(Arc::new(StubProvider::unconfigured()), tmp.path(), 1024, 512);

        let Json(body) = get_health(State(state)).await;
        assert_eq!(body.status, "ok");
        assert_eq!(body.api_key, "missing");
    }

    #[tokio::test]
    async fn liveness_is_healthy() {
        let Json(body) = get_liveness().await;
        assert_eq!(body["status"], "healthy");
    }
}
