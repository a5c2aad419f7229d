//! Read-only scrape surface (spec.md §6; CRUD routes excluded per the
//! Non-goals). Grounded in the teacher's `http_server.rs`: an `AppState`
//! carried through `axum::extract::State`, `Router`/`get` wiring, and a
//! `CorsLayer` for scrape tooling running off-host.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::error::CoreError;
use crate::metric::labels;
use crate::policy::PolicyManager;

const ALL_POLICIES: &str = "__all";

#[derive(Clone)]
struct AppState {
    policies: Arc<PolicyManager>,
    started_at: Instant,
    started_at_utc: DateTime<Utc>,
}

/// Wraps `CoreError` for `IntoResponse`, mapping it to the status codes
/// spec.md §6/§7 call for (425 on a too-early window, 404 on an unknown
/// policy, 422 on a validation failure, 500 otherwise).
struct ApiError(CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CoreError::WindowTooEarly { .. } => StatusCode::TOO_EARLY,
            CoreError::PolicyNotFound(_) | CoreError::HandlerNotFound(_) => StatusCode::NOT_FOUND,
            CoreError::DuplicatePolicy(_) => StatusCode::CONFLICT,
            CoreError::Validation(_) | CoreError::Config(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error!(error = %self.0, "request failed");
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub fn router(policies: Arc<PolicyManager>) -> Router {
    let state = AppState {
        policies,
        started_at: Instant::now(),
        started_at_utc: Utc::now(),
    };

    Router::new()
        .route("/api/v1/metrics/app", get(app_metrics))
        .route("/api/v1/policies", get(list_policies))
        .route("/api/v1/policies/{name}/metrics/window/{n}", get(window_metrics))
        .route("/api/v1/policies/{name}/metrics/bucket/{n}", get(bucket_metrics))
        .route("/api/v1/policies/{name}/metrics/prometheus", get(prometheus_metrics))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

pub async fn serve(policies: Arc<PolicyManager>, bind_addr: std::net::SocketAddr) -> Result<(), CoreError> {
    let app = router(policies);
    info!("starting HTTP server on {bind_addr}");
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn app_metrics(State(state): State<AppState>) -> impl IntoResponse {
    let up_time_min = state.started_at.elapsed().as_secs_f64() / 60.0;
    Json(json!({
        "app": {
            "version": env!("CARGO_PKG_VERSION"),
            "up_time_min": up_time_min,
            "started_at": state.started_at_utc,
        }
    }))
}

async fn list_policies(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "policies": state.policies.names() }))
}

async fn window_metrics(State(state): State<AppState>, Path((name, n)): Path<(String, usize)>) -> Result<Json<serde_json::Value>, ApiError> {
    if name == ALL_POLICIES {
        let mut out = serde_json::Map::new();
        for policy_name in state.policies.names() {
            let policy = state.policies.get(&policy_name)?;
            out.insert(policy_name, policy.render_window_json(n)?);
        }
        return Ok(Json(serde_json::Value::Object(out)));
    }

    let policy = state.policies.get(&name)?;
    Ok(Json(policy.render_window_json(n)?))
}

async fn bucket_metrics(State(state): State<AppState>, Path((name, n)): Path<(String, usize)>) -> Result<Json<serde_json::Value>, ApiError> {
    let policy = state.policies.get(&name)?;
    Ok(Json(policy.render_bucket_json(n)?))
}

async fn prometheus_metrics(State(state): State<AppState>, Path(name): Path<String>) -> Result<Response, ApiError> {
    let policy = state.policies.get(&name)?;
    let policy_labels = labels(&[("policy", &name)]);
    let body = policy.render_window_prometheus(1, &policy_labels)?;
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/plain; version=0.0.4; charset=utf-8")
        .body(body.into())
        .unwrap())
}
