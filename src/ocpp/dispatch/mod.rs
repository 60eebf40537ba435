//! Handler registry, notification hooks and the fan-out dispatcher.

pub mod dispatcher;
pub mod hooks;
pub mod registry;

pub use dispatcher::{
    DispatchOutcome, DispatchTimeouts, Dispatcher, Resolution, SelectionPolicy, DEFAULT_TIMEOUT,
};
pub use hooks::{HookRegistry, RawMessage, RequestEvent, ResponseEvent, Transport};
pub use registry::{FnHandler, HandlerError, HandlerRegistry, RequestContext, RequestHandler, SubscriptionId};
