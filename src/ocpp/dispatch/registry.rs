//! Per-action subscriber registry.
//!
//! Handlers are stored type-erased under their action name and recovered as
//! `Arc<dyn RequestHandler<A>>` when dispatching. Readers take a snapshot under a short read
//! lock, so registration and removal may happen at any time, concurrently with dispatch.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use chrono::{DateTime, Utc};

use crate::ocpp::events;
use crate::ocpp::header::Header;
use crate::ocpp::ids::{ChargeBoxId, EventTrackingId, Identity, MessageId};
use crate::ocpp::messages::Action;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("handler produced no response")]
    NoResponse,
    #[error("handler failed: {0}")]
    Failed(String),
    #[error("handler panicked: {0}")]
    Panicked(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Everything a handler learns about an inbound request besides its body.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// When the request was received.
    pub timestamp: DateTime<Utc>,
    /// Identity of the endpoint that received the request.
    pub endpoint: Option<Identity>,
    /// Signalled when the dispatch deadline expires.
    pub cancellation: CancellationToken,
    pub event_tracking_id: EventTrackingId,
    pub header: Header,
    /// Deadline applied to this dispatch.
    pub timeout: Duration,
}

impl RequestContext {
    pub fn new(header: Header, cancellation: CancellationToken) -> Self {
        Self {
            timestamp: header.timestamp,
            endpoint: None,
            cancellation,
            event_tracking_id: EventTrackingId::random(),
            header,
            timeout: Duration::ZERO,
        }
    }

    pub fn with_endpoint(mut self, endpoint: Option<Identity>) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn charge_box_id(&self) -> Option<&ChargeBoxId> {
        self.header.charge_box_id.as_ref()
    }

    pub fn source(&self) -> Option<&Identity> {
        self.header.source.as_ref()
    }

    pub fn message_id(&self) -> &MessageId {
        &self.header.message_id
    }
}

#[async_trait]
pub trait RequestHandler<A: Action>: Send + Sync {
    async fn handle(&self, ctx: RequestContext, request: A::Request) -> Result<A::Response, HandlerError>;
}

/// Adapts an async closure into a [`RequestHandler`].
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<A, F, Fut> RequestHandler<A> for FnHandler<F>
where
    A: Action,
    F: Fn(RequestContext, A::Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<A::Response, HandlerError>> + Send + 'static,
{
    async fn handle(&self, ctx: RequestContext, request: A::Request) -> Result<A::Response, HandlerError> {
        (self.0)(ctx, request).await
    }
}

type ErasedHandler = Box<dyn Any + Send + Sync>;

#[derive(Default)]
pub struct HandlerRegistry {
    next_id: AtomicU64,
    handlers: RwLock<HashMap<&'static str, Vec<(SubscriptionId, ErasedHandler)>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<A: Action>(&self, handler: Arc<dyn RequestHandler<A>>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let erased: ErasedHandler = Box::new(handler);
        self.handlers.write().entry(A::NAME).or_default().push((id, erased));
        debug!(
            event = events::HANDLER_REGISTERED,
            action = A::NAME,
            subscription = %id,
            "registered request handler"
        );
        id
    }

    pub fn register_fn<A, F, Fut>(&self, handler: F) -> SubscriptionId
    where
        A: Action,
        F: Fn(RequestContext, A::Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<A::Response, HandlerError>> + Send + 'static,
    {
        self.register::<A>(Arc::new(FnHandler(handler)))
    }

    /// Returns `false` when the id is unknown or already removed.
    pub fn unregister(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write();
        for (action, list) in handlers.iter_mut() {
            if let Some(pos) = list.iter().position(|(sub, _)| *sub == id) {
                list.remove(pos);
                debug!(
                    event = events::HANDLER_UNREGISTERED,
                    action = *action,
                    subscription = %id,
                    "removed request handler"
                );
                return true;
            }
        }
        false
    }

    /// Handlers for `A` in registration order, detached from the registry.
    pub fn snapshot<A: Action>(&self) -> Vec<(SubscriptionId, Arc<dyn RequestHandler<A>>)> {
        let handlers = self.handlers.read();
        handlers
            .get(A::NAME)
            .map(|list| {
                list.iter()
                    .filter_map(|(id, erased)| {
                        erased
                            .downcast_ref::<Arc<dyn RequestHandler<A>>>()
                            .map(|handler| (*id, Arc::clone(handler)))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn count(&self, action: &str) -> usize {
        self.handlers.read().get(action).map_or(0, Vec::len)
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.read();
        let counts: HashMap<&str, usize> = handlers.iter().map(|(k, v)| (*k, v.len())).collect();
        f.debug_struct("HandlerRegistry").field("handlers", &counts).finish()
    }
}
