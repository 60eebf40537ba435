use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::AppState;
use crate::ocpp::ids::ChargeBoxId;
use crate::ocpp::session::WsSession;

/// GET handler upgrading `{ws_path}/:charge_box_id` to an OCPP-J connection.
pub async fn upgrade(
    ws: WebSocketUpgrade,
    Path(charge_box_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    let Some(charge_box_id) = ChargeBoxId::try_parse(&charge_box_id) else {
        return (StatusCode::BAD_REQUEST, "invalid charge box identity").into_response();
    };
    ws.protocols([state.websocket.subprotocol.clone()])
        .on_upgrade(move |socket| connection_loop(socket, charge_box_id, state))
}

async fn connection_loop(socket: WebSocket, charge_box_id: ChargeBoxId, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<String>(state.websocket.outbound_queue);
    let session = state
        .endpoint
        .open_session(charge_box_id, tx, state.websocket.call_timeout());

    let writer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let cancellation = session.cancellation().clone();
    loop {
        let message = tokio::select! {
            _ = cancellation.cancelled() => break,
            message = stream.next() => message,
        };
        let Some(Ok(message)) = message else {
            break;
        };
        match message {
            Message::Text(text) => {
                // Frames are handled concurrently: a dispatch may be waiting on a reply to one
                // of our own calls.
                let endpoint = Arc::clone(&state.endpoint);
                let session = Arc::clone(&session);
                tokio::spawn(async move { reply(&endpoint, &session, &text).await });
            }
            Message::Binary(_) => {
                warn!(charge_box_id = %session.charge_box_id(), "binary frames are not OCPP-J, ignoring");
            }
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => break,
        }
    }

    state.endpoint.close_session(&session);
    writer.abort();
    debug!(charge_box_id = %session.charge_box_id(), "websocket connection finished");
}

async fn reply(endpoint: &crate::ocpp::endpoint::OcppEndpoint, session: &Arc<WsSession>, text: &str) {
    if let Some(reply) = endpoint.handle_ws_text(session, text).await {
        if let Err(err) = session.send_text(reply).await {
            warn!(charge_box_id = %session.charge_box_id(), error = %err, "could not queue reply");
        }
    }
}
