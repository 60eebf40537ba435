//! Inbound entry points: decode, dispatch, encode and mirror the header, per action.
//!
//! An [`OcppEndpoint`] owns one route per supported action. A route knows the action's
//! request and response types; the endpoint itself only deals in transport text. Decode and
//! framing failures are answered with transport faults and never reach the dispatcher.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use strum::Display;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::bindings::soap::{self, SoapFault, SoapRequest, SoapVersion};
use super::bindings::websocket::{ErrorCode, Frame};
use super::client::OcppClient;
use super::codec::{DecodeError, OcppCodec};
use super::dispatch::{
    DispatchTimeouts, Dispatcher, HandlerError, HandlerRegistry, HookRegistry, RawMessage, RequestContext,
    RequestEvent, ResponseEvent, SelectionPolicy, SubscriptionId, Transport,
};
use super::events;
use super::header::Header;
use super::ids::{ChargeBoxId, Identity, MessageId};
use super::messages::{self, Action};
use super::session::{SessionRegistry, WsSession};
use super::xml::XmlElement;

/// Which side of the protocol this endpoint plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    /// Serves requests sent by a central system.
    ChargePoint,
    /// Serves requests sent by charge points.
    CentralSystem,
}

#[async_trait]
trait ActionRoute: Send + Sync {
    /// Namespace and local name of the request body element.
    fn body_name(&self) -> (&'static str, &'static str);

    async fn handle_xml(
        &self,
        dispatcher: &Dispatcher,
        ctx: RequestContext,
        body: &XmlElement,
    ) -> Result<XmlElement, DecodeError>;

    async fn handle_json(&self, dispatcher: &Dispatcher, ctx: RequestContext, payload: &Value)
        -> Result<Value, DecodeError>;
}

struct Route<A>(PhantomData<fn() -> A>);

#[async_trait]
impl<A: Action> ActionRoute for Route<A> {
    fn body_name(&self) -> (&'static str, &'static str) {
        (
            <A::Request as OcppCodec>::NAMESPACE,
            <A::Request as OcppCodec>::XML_NAME,
        )
    }

    async fn handle_xml(
        &self,
        dispatcher: &Dispatcher,
        ctx: RequestContext,
        body: &XmlElement,
    ) -> Result<XmlElement, DecodeError> {
        let request = A::Request::decode_xml(body)?;
        let outcome = dispatcher.dispatch::<A>(ctx, request).await;
        Ok(outcome.response.encode_xml())
    }

    async fn handle_json(&self, dispatcher: &Dispatcher, ctx: RequestContext, payload: &Value)
        -> Result<Value, DecodeError> {
        let request = A::Request::decode_json(payload)?;
        let outcome = dispatcher.dispatch::<A>(ctx, request).await;
        Ok(outcome.response.encode_json())
    }
}

/// HTTP-level answer to one SOAP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapReply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl SoapReply {
    fn ok(version: SoapVersion, body: String) -> Self {
        Self {
            status: 200,
            content_type: version.content_type(),
            body,
        }
    }

    fn fault(version: SoapVersion, fault: &SoapFault, request: Option<&Header>) -> Self {
        let status = match fault.code {
            soap::FaultCode::Sender => 400,
            soap::FaultCode::Receiver => 500,
        };
        warn!(
            event = events::SOAP_FAULT,
            status,
            reason = %fault.reason,
            action = request.map(|h| h.action.as_str()).unwrap_or_default(),
            "answering with a SOAP fault"
        );
        Self {
            status,
            content_type: version.content_type(),
            body: fault.encode(version, request),
        }
    }
}

pub struct EndpointBuilder {
    role: Role,
    identity: Option<Identity>,
    timeouts: DispatchTimeouts,
    policy: SelectionPolicy,
    routes: HashMap<&'static str, Arc<dyn ActionRoute>>,
}

impl EndpointBuilder {
    pub fn identity(mut self, identity: Option<Identity>) -> Self {
        self.identity = identity;
        self
    }

    pub fn timeouts(mut self, timeouts: DispatchTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn policy(mut self, policy: SelectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Accepts inbound requests for `A`.
    pub fn route<A: Action>(mut self) -> Self {
        self.routes.insert(A::NAME, Arc::new(Route::<A>(PhantomData)));
        self
    }

    pub fn build(self) -> OcppEndpoint {
        let registry = Arc::new(HandlerRegistry::new());
        OcppEndpoint {
            role: self.role,
            identity: self.identity,
            dispatcher: Dispatcher::new(registry, self.timeouts).with_policy(self.policy),
            hooks: Arc::new(HookRegistry::new()),
            routes: self.routes,
            sessions: Arc::new(SessionRegistry::new()),
        }
    }
}

pub struct OcppEndpoint {
    role: Role,
    identity: Option<Identity>,
    dispatcher: Dispatcher,
    hooks: Arc<HookRegistry>,
    routes: HashMap<&'static str, Arc<dyn ActionRoute>>,
    sessions: Arc<SessionRegistry>,
}

impl OcppEndpoint {
    /// Builder with the standard routes for `role`.
    pub fn builder(role: Role) -> EndpointBuilder {
        let builder = EndpointBuilder {
            role,
            identity: None,
            timeouts: DispatchTimeouts::default(),
            policy: SelectionPolicy::default(),
            routes: HashMap::new(),
        };
        match role {
            Role::ChargePoint => builder
                .route::<messages::ReserveNow>()
                .route::<messages::CancelReservation>()
                .route::<messages::RemoteStartTransaction>()
                .route::<messages::RemoteStopTransaction>()
                .route::<messages::DataTransfer>()
                .route::<messages::GetLocalListVersion>()
                .route::<messages::Reset>()
                .route::<messages::ChangeConfiguration>(),
            Role::CentralSystem => builder
                .route::<messages::BootNotification>()
                .route::<messages::Heartbeat>(),
        }
    }

    pub fn charge_point() -> Self {
        Self::builder(Role::ChargePoint).build()
    }

    pub fn central_system() -> Self {
        Self::builder(Role::CentralSystem).build()
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn supports(&self, action: &str) -> bool {
        self.routes.contains_key(action)
    }

    pub fn handlers(&self) -> &Arc<HandlerRegistry> {
        self.dispatcher.registry()
    }

    pub fn hooks(&self) -> &Arc<HookRegistry> {
        &self.hooks
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// Registers an async closure as a handler for `A`.
    pub fn on<A, F, Fut>(&self, handler: F) -> SubscriptionId
    where
        A: Action,
        F: Fn(RequestContext, A::Request) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<A::Response, HandlerError>> + Send + 'static,
    {
        self.handlers().register_fn::<A, F, Fut>(handler)
    }

    /// Handles one SOAP request body. `cancellation` is tied to the HTTP connection.
    pub async fn handle_soap(&self, raw: &str, cancellation: &CancellationToken) -> SoapReply {
        let received = Utc::now();
        let request = match SoapRequest::decode(raw, received) {
            Ok(request) => request,
            Err(err) => return SoapReply::fault(SoapVersion::V12, &SoapFault::sender(err.to_string()), None),
        };
        let version = request.version;
        let header = &request.header;
        debug!(
            event = events::SOAP_REQUEST,
            action = %header.action,
            message_id = %header.message_id,
            charge_box_id = header.charge_box_id.as_ref().map(ChargeBoxId::as_str).unwrap_or_default(),
            "received SOAP request"
        );

        let Some(route) = self.routes.get(header.action.as_str()) else {
            let fault = SoapFault::receiver(format!("action `{}` is not supported", header.action));
            return SoapReply::fault(version, &fault, Some(header));
        };

        let raw_request = RawMessage::new(Transport::Soap, raw);
        self.hooks.notify_request(&RequestEvent {
            timestamp: received,
            endpoint: self.identity.as_ref(),
            action: &header.action,
            request: &raw_request,
        });

        let (namespace, local) = route.body_name();
        let body = match request.body_element(namespace, local) {
            Ok(body) => body,
            Err(err) => return SoapReply::fault(version, &SoapFault::sender(err.to_string()), Some(header)),
        };

        let ctx = RequestContext::new(header.clone(), cancellation.child_token()).with_endpoint(self.identity.clone());
        let response_body = match route.handle_xml(&self.dispatcher, ctx, body).await {
            Ok(body) => body,
            Err(err) => return SoapReply::fault(version, &SoapFault::sender(err.to_string()), Some(header)),
        };

        let response_header = header.derive_response(MessageId::random_urn(), Utc::now());
        let reply = SoapReply::ok(version, soap::encode_envelope(version, &response_header, response_body));

        let raw_response = RawMessage::new(Transport::Soap, reply.body.as_str());
        self.hooks.notify_response(&ResponseEvent {
            timestamp: response_header.timestamp,
            endpoint: self.identity.as_ref(),
            action: &header.action,
            request: &raw_request,
            response: &raw_response,
        });
        reply
    }

    /// Opens and registers a session for a connected peer. Frames to send are queued on
    /// `outbound`.
    pub fn open_session(
        &self,
        charge_box_id: ChargeBoxId,
        outbound: mpsc::Sender<String>,
        call_timeout: Duration,
    ) -> Arc<WsSession> {
        let session = Arc::new(WsSession::new(charge_box_id, outbound, call_timeout));
        self.sessions.insert(Arc::clone(&session));
        session
    }

    pub fn close_session(&self, session: &Arc<WsSession>) {
        self.sessions.remove(session);
        session.close();
    }

    /// Typed client for an open session.
    pub fn client_for(&self, charge_box_id: &ChargeBoxId) -> Option<OcppClient> {
        self.sessions.get(charge_box_id).map(OcppClient::new)
    }

    /// Handles one inbound OCPP-J text frame. Returns the frame to send back, if any.
    pub async fn handle_ws_text(&self, session: &Arc<WsSession>, text: &str) -> Option<String> {
        let frame = match Frame::parse(text) {
            Ok(frame) => frame,
            Err(err) => {
                return match err.message_id() {
                    Some(message_id) => {
                        warn!(
                            event = events::WS_FRAME_REJECTED,
                            charge_box_id = %session.charge_box_id(),
                            message_id = %message_id,
                            error = %err,
                            "rejecting malformed frame"
                        );
                        Some(Frame::error(message_id.clone(), err.error_code(), err.to_string()).to_text())
                    }
                    None => {
                        warn!(
                            event = events::WS_FRAME_DROPPED,
                            charge_box_id = %session.charge_box_id(),
                            error = %err,
                            "dropping frame without a usable message id"
                        );
                        None
                    }
                };
            }
        };

        let (message_id, action, payload) = match frame {
            Frame::Call {
                message_id,
                action,
                payload,
            } => (message_id, action, payload),
            response => {
                session.resolve(response);
                return None;
            }
        };
        debug!(
            event = events::WS_FRAME_RECEIVED,
            charge_box_id = %session.charge_box_id(),
            message_id = %message_id,
            action = %action,
            "received call"
        );

        let Some(route) = self.routes.get(action.as_str()) else {
            let reply = Frame::error(
                message_id,
                ErrorCode::NotImplemented,
                format!("action `{action}` is not supported"),
            );
            return Some(call_error(session, reply));
        };

        let received = Utc::now();
        let header = Header::request(action, message_id, received)
            .with_charge_box(session.charge_box_id().clone())
            .with_route(None, self.identity.clone());

        let raw_request = RawMessage::new(Transport::WebSocket, text);
        self.hooks.notify_request(&RequestEvent {
            timestamp: received,
            endpoint: self.identity.as_ref(),
            action: &header.action,
            request: &raw_request,
        });

        let ctx = RequestContext::new(header.clone(), session.cancellation().child_token())
            .with_endpoint(self.identity.clone());
        let reply = match route.handle_json(&self.dispatcher, ctx, &payload).await {
            Ok(response) => {
                let response_header = header.derive_response(header.message_id.clone(), Utc::now());
                Frame::answer(&response_header, response).to_text()
            }
            Err(err) => {
                let code = ErrorCode::for_decode_error(&err);
                call_error(session, Frame::error(header.message_id.clone(), code, err.to_string()))
            }
        };

        let raw_response = RawMessage::new(Transport::WebSocket, reply.as_str());
        self.hooks.notify_response(&ResponseEvent {
            timestamp: Utc::now(),
            endpoint: self.identity.as_ref(),
            action: &header.action,
            request: &raw_request,
            response: &raw_response,
        });
        Some(reply)
    }
}

fn call_error(session: &WsSession, frame: Frame) -> String {
    if let Frame::CallError {
        message_id,
        code,
        description,
        ..
    } = &frame
    {
        warn!(
            event = events::WS_CALL_ERROR_SENT,
            charge_box_id = %session.charge_box_id(),
            message_id = %message_id,
            code = %code,
            description = %description,
            "answering with CALLERROR"
        );
    }
    frame.to_text()
}

impl std::fmt::Debug for OcppEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut actions: Vec<_> = self.routes.keys().copied().collect();
        actions.sort_unstable();
        f.debug_struct("OcppEndpoint")
            .field("role", &self.role)
            .field("identity", &self.identity)
            .field("actions", &actions)
            .field("sessions", &self.sessions.len())
            .finish()
    }
}
