use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use super::AppState;
use crate::ocpp::endpoint::Role;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    timestamp: chrono::DateTime<chrono::Utc>,
    role: Role,
    open_sessions: usize,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "healthy",
        timestamp: chrono::Utc::now(),
        role: state.endpoint.role(),
        open_sessions: state.endpoint.sessions().len(),
    };
    (StatusCode::OK, Json(response))
}

/// GET /health/live - Liveness probe
pub async fn liveness_check() -> impl IntoResponse {
    StatusCode::OK
}
