//! OCPP 1.6 message dispatch for charge points and central systems.
//!
//! # Architecture
//! - `messages`: typed request/response payloads per action, with XML and JSON codecs
//! - `dispatch`: handler registry, notification hooks and deadline-bounded fan-out
//! - `bindings`: SOAP/XML envelopes (OCPP-S) and JSON array frames (OCPP-J)
//! - `endpoint`: decodes inbound traffic, dispatches it and encodes the reply
//! - `session`/`client`: outgoing calls over an OCPP-J connection

pub mod bindings;
pub mod client;
pub mod codec;
pub mod dispatch;
pub mod endpoint;
pub mod enums;
pub mod events;
pub mod header;
pub mod ids;
pub mod messages;
pub mod session;
pub mod types;
pub mod xml;

pub use client::OcppClient;
pub use codec::{DecodeError, OcppCodec, WireFormat};
pub use dispatch::{
    DispatchOutcome, DispatchTimeouts, Dispatcher, HandlerError, HandlerRegistry, HookRegistry, RequestContext,
    RequestHandler, Resolution, SelectionPolicy, SubscriptionId,
};
pub use endpoint::{EndpointBuilder, OcppEndpoint, Role, SoapReply};
pub use header::Header;
pub use messages::{Action, OcppResponse};
pub use session::{CallError, SessionRegistry, WsSession};
