//! Liveness and readiness endpoints
//!
//! - `GET /` - service banner
//! - `GET /health`, `GET /healthz` - status plus the enabled monitors
//! - `GET /ready`, `GET /readyz` - mail transport reachability

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use email::Notifier;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Shared state for health endpoints.
#[derive(Clone)]
pub struct HealthState {
    pub app_name: String,
    pub app_version: String,
    /// Names of the monitors this process schedules
    pub monitors: Vec<String>,
    notifier: Notifier,
}

impl HealthState {
    pub fn new(
        app_name: impl Into<String>,
        app_version: impl Into<String>,
        monitors: Vec<String>,
        notifier: Notifier,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            app_version: app_version.into(),
            monitors,
            notifier,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub name: String,
    pub version: String,
    pub monitors: Vec<String>,
}

async fn root_handler(State(state): State<HealthState>) -> Json<Value> {
    Json(json!({ "message": format!("{} is running", state.app_name) }))
}

/// Always OK while the process is serving requests.
async fn health_handler(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        name: state.app_name,
        version: state.app_version,
        monitors: state.monitors,
    })
}

/// 503 while the mail transport cannot be reached.
async fn ready_handler(
    State(state): State<HealthState>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let transport = state.notifier.provider_name();

    match state.notifier.health_check().await {
        Ok(()) => Ok((
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "checks": { transport: "ok" }
            })),
        )),
        Err(e) => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "not_ready",
                "checks": { transport: format!("error: {}", e) }
            })),
        )),
    }
}

pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/healthz", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/readyz", get(ready_handler))
        .with_state(state)
}
