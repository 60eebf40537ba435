use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use tokio_util::sync::CancellationToken;

use super::AppState;

/// POST handler for SOAP envelopes. Dropping the request cancels its dispatch.
pub async fn handle(State(state): State<AppState>, body: String) -> Response {
    let cancellation = CancellationToken::new();
    let _guard = cancellation.clone().drop_guard();

    let reply = state.endpoint.handle_soap(&body, &cancellation).await;
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, [(header::CONTENT_TYPE, reply.content_type)], reply.body).into_response()
}
