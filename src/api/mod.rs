//! HTTP surface: SOAP over `POST`, OCPP-J over a WebSocket upgrade.

pub mod health;
pub mod soap;
pub mod ws;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::{Config, WebSocketConfig};
use crate::ocpp::endpoint::OcppEndpoint;

#[derive(Clone)]
pub struct AppState {
    pub endpoint: Arc<OcppEndpoint>,
    pub websocket: WebSocketConfig,
}

impl AppState {
    pub fn new(endpoint: Arc<OcppEndpoint>, cfg: &Config) -> Self {
        Self {
            endpoint,
            websocket: cfg.websocket.clone(),
        }
    }
}

pub fn router(state: AppState, cfg: &Config) -> Router {
    let ws_route = format!("{}/:charge_box_id", cfg.server.ws_path.trim_end_matches('/'));
    Router::new()
        .route(&cfg.server.soap_path, post(soap::handle))
        .route(&ws_route, get(ws::upgrade))
        .route("/health", get(health::health_check))
        .route("/health/live", get(health::liveness_check))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(axum::extract::DefaultBodyLimit::max(1024 * 1024))
                .layer(TraceLayer::new_for_http()),
        )
}
