//! Diagnostic notification hooks around dispatch.
//!
//! Hooks see the raw inbound request before dispatch and the raw response after it. Every
//! invocation runs behind its own error boundary: returned errors and panics are logged and
//! never reach the dispatch pipeline.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use strum::Display;
use tracing::{error, warn};

use crate::ocpp::events;
use crate::ocpp::ids::Identity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Transport {
    #[strum(serialize = "soap")]
    Soap,
    #[strum(serialize = "websocket")]
    WebSocket,
}

/// Message text exactly as it crossed the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub transport: Transport,
    pub body: String,
}

impl RawMessage {
    pub fn new(transport: Transport, body: impl Into<String>) -> Self {
        Self {
            transport,
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RequestEvent<'a> {
    pub timestamp: DateTime<Utc>,
    pub endpoint: Option<&'a Identity>,
    pub action: &'a str,
    pub request: &'a RawMessage,
}

#[derive(Debug, Clone, Copy)]
pub struct ResponseEvent<'a> {
    pub timestamp: DateTime<Utc>,
    pub endpoint: Option<&'a Identity>,
    pub action: &'a str,
    pub request: &'a RawMessage,
    pub response: &'a RawMessage,
}

pub type RequestHook = Arc<dyn Fn(&RequestEvent<'_>) -> anyhow::Result<()> + Send + Sync>;
pub type ResponseHook = Arc<dyn Fn(&ResponseEvent<'_>) -> anyhow::Result<()> + Send + Sync>;

#[derive(Default)]
pub struct HookRegistry {
    request: RwLock<HashMap<String, Vec<RequestHook>>>,
    response: RwLock<HashMap<String, Vec<ResponseHook>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_request<F>(&self, action: &str, hook: F)
    where
        F: Fn(&RequestEvent<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.request
            .write()
            .entry(action.to_owned())
            .or_default()
            .push(Arc::new(hook));
    }

    pub fn on_response<F>(&self, action: &str, hook: F)
    where
        F: Fn(&ResponseEvent<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.response
            .write()
            .entry(action.to_owned())
            .or_default()
            .push(Arc::new(hook));
    }

    pub fn notify_request(&self, event: &RequestEvent<'_>) {
        let hooks = self.request.read().get(event.action).cloned().unwrap_or_default();
        for hook in hooks {
            isolate(event.action, "request", || hook(event));
        }
    }

    pub fn notify_response(&self, event: &ResponseEvent<'_>) {
        let hooks = self.response.read().get(event.action).cloned().unwrap_or_default();
        for hook in hooks {
            isolate(event.action, "response", || hook(event));
        }
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("request_actions", &self.request.read().len())
            .field("response_actions", &self.response.read().len())
            .finish()
    }
}

fn isolate(action: &str, stage: &'static str, hook: impl FnOnce() -> anyhow::Result<()>) {
    match panic::catch_unwind(AssertUnwindSafe(hook)) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            warn!(
                event = events::HOOK_FAILED,
                action,
                stage,
                error = %err,
                "notification hook failed"
            );
        }
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_owned());
            error!(
                event = events::HOOK_PANICKED,
                action,
                stage,
                reason = %reason,
                "notification hook panicked"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn raw() -> RawMessage {
        RawMessage::new(Transport::WebSocket, "[2,\"1\",\"Reset\",{}]")
    }

    #[test]
    fn failing_and_panicking_hooks_do_not_stop_later_hooks() {
        let hooks = HookRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));

        hooks.on_request("Reset", |_| anyhow::bail!("broken hook"));
        hooks.on_request("Reset", |_| panic!("exploding hook"));
        let counter = Arc::clone(&calls);
        hooks.on_request("Reset", move |event| {
            assert_eq!(event.action, "Reset");
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let request = raw();
        hooks.notify_request(&RequestEvent {
            timestamp: Utc::now(),
            endpoint: None,
            action: "Reset",
            request: &request,
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn hooks_are_scoped_to_their_action() {
        let hooks = HookRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        hooks.on_response("Heartbeat", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let request = raw();
        let response = RawMessage::new(Transport::WebSocket, "[3,\"1\",{}]");
        hooks.notify_response(&ResponseEvent {
            timestamp: Utc::now(),
            endpoint: None,
            action: "Reset",
            request: &request,
            response: &response,
        });
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
