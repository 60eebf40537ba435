//! One OCPP-J connection: outbound text queue and correlation of outgoing calls.

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::bindings::websocket::{ErrorCode, Frame};
use super::codec::{DecodeError, OcppCodec};
use super::events;
use super::ids::{ChargeBoxId, MessageId};
use super::messages::Action;

#[derive(Debug, Error)]
pub enum CallError {
    #[error("session is closed")]
    Closed,
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("peer answered {code}: {description}")]
    Remote {
        code: ErrorCode,
        description: String,
        details: Value,
    },
    #[error("response payload is invalid: {0}")]
    Decode(#[from] DecodeError),
    #[error("request is invalid: {0}")]
    InvalidRequest(DecodeError),
}

enum Reply {
    Result(Value),
    Error {
        code: ErrorCode,
        description: String,
        details: Value,
    },
}

pub struct WsSession {
    charge_box_id: ChargeBoxId,
    outbound: mpsc::Sender<String>,
    pending: Mutex<HashMap<MessageId, oneshot::Sender<Reply>>>,
    cancellation: CancellationToken,
    call_timeout: Duration,
}

impl WsSession {
    pub fn new(charge_box_id: ChargeBoxId, outbound: mpsc::Sender<String>, call_timeout: Duration) -> Self {
        Self {
            charge_box_id,
            outbound,
            pending: Mutex::new(HashMap::new()),
            cancellation: CancellationToken::new(),
            call_timeout,
        }
    }

    pub fn charge_box_id(&self) -> &ChargeBoxId {
        &self.charge_box_id
    }

    /// Cancelled when the session closes; inbound dispatch derives its tokens from it.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_closed(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn pending_calls(&self) -> usize {
        self.pending.lock().len()
    }

    pub async fn send_text(&self, text: String) -> Result<(), CallError> {
        if self.is_closed() {
            return Err(CallError::Closed);
        }
        self.outbound.send(text).await.map_err(|_| CallError::Closed)
    }

    /// Sends a CALL for `A` and waits for the matching CALLRESULT or CALLERROR.
    ///
    /// A request the peer would refuse to decode is rejected before anything is sent.
    pub async fn call<A: Action>(&self, request: &A::Request) -> Result<A::Response, CallError> {
        if self.is_closed() {
            return Err(CallError::Closed);
        }

        let payload = request.encode_json();
        A::Request::decode_json(&payload).map_err(CallError::InvalidRequest)?;

        let message_id = MessageId::random();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(message_id.clone(), tx);

        let frame = Frame::call(message_id.clone(), A::NAME, payload);
        if let Err(err) = self.send_text(frame.to_text()).await {
            self.pending.lock().remove(&message_id);
            return Err(err);
        }
        debug!(
            event = events::CALL_SENT,
            action = A::NAME,
            charge_box_id = %self.charge_box_id,
            message_id = %message_id,
            "sent call"
        );

        let reply = match tokio::time::timeout(self.call_timeout, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => return Err(self.failed::<A>(&message_id, CallError::Closed)),
            Err(_) => {
                self.pending.lock().remove(&message_id);
                return Err(self.failed::<A>(&message_id, CallError::Timeout(self.call_timeout)));
            }
        };

        match reply {
            Reply::Result(payload) => {
                let response = A::Response::decode_json(&payload)
                    .map_err(|err| self.failed::<A>(&message_id, CallError::Decode(err)))?;
                debug!(
                    event = events::CALL_COMPLETED,
                    action = A::NAME,
                    charge_box_id = %self.charge_box_id,
                    message_id = %message_id,
                    "call completed"
                );
                Ok(response)
            }
            Reply::Error {
                code,
                description,
                details,
            } => Err(self.failed::<A>(
                &message_id,
                CallError::Remote {
                    code,
                    description,
                    details,
                },
            )),
        }
    }

    fn failed<A: Action>(&self, message_id: &MessageId, err: CallError) -> CallError {
        warn!(
            event = events::CALL_FAILED,
            action = A::NAME,
            charge_box_id = %self.charge_box_id,
            message_id = %message_id,
            error = %err,
            "call failed"
        );
        err
    }

    /// Hands a CALLRESULT or CALLERROR to the call waiting for it. Returns `false` when no
    /// call is waiting for that id; the frame is dropped.
    pub fn resolve(&self, frame: Frame) -> bool {
        let (message_id, reply) = match frame {
            Frame::CallResult { message_id, payload } => (message_id, Reply::Result(payload)),
            Frame::CallError {
                message_id,
                code,
                description,
                details,
            } => (
                message_id,
                Reply::Error {
                    code,
                    description,
                    details,
                },
            ),
            Frame::Call { .. } => return false,
        };

        let waiting = self.pending.lock().remove(&message_id);
        match waiting {
            Some(tx) => tx.send(reply).is_ok(),
            None => {
                warn!(
                    event = events::CALL_UNMATCHED_RESPONSE,
                    charge_box_id = %self.charge_box_id,
                    message_id = %message_id,
                    "response matches no pending call, dropping it"
                );
                false
            }
        }
    }

    /// Fails every pending call with [`CallError::Closed`] and rejects new ones.
    pub fn close(&self) {
        self.cancellation.cancel();
        let dropped = std::mem::take(&mut *self.pending.lock());
        info!(
            event = events::SESSION_CLOSED,
            charge_box_id = %self.charge_box_id,
            pending_calls = dropped.len(),
            "session closed"
        );
    }
}

impl std::fmt::Debug for WsSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsSession")
            .field("charge_box_id", &self.charge_box_id)
            .field("pending_calls", &self.pending_calls())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Open sessions by charge box identity.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<ChargeBoxId, Arc<WsSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `session`; a previous session for the same charge box is closed.
    pub fn insert(&self, session: Arc<WsSession>) {
        let previous = self
            .sessions
            .write()
            .insert(session.charge_box_id().clone(), Arc::clone(&session));
        if let Some(previous) = previous {
            previous.close();
        }
        info!(
            event = events::SESSION_OPENED,
            charge_box_id = %session.charge_box_id(),
            "session opened"
        );
    }

    /// Removes `session` unless it has already been replaced by a newer one.
    pub fn remove(&self, session: &Arc<WsSession>) -> bool {
        let mut sessions = self.sessions.write();
        match sessions.get(session.charge_box_id()) {
            Some(current) if Arc::ptr_eq(current, session) => {
                sessions.remove(session.charge_box_id());
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, charge_box_id: &ChargeBoxId) -> Option<Arc<WsSession>> {
        self.sessions.read().get(charge_box_id).cloned()
    }

    pub fn charge_box_ids(&self) -> Vec<ChargeBoxId> {
        self.sessions.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
