//! Deadline-bounded fan-out of one decoded request to every registered handler.

use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use strum::{AsRefStr, Display};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::registry::{HandlerError, HandlerRegistry, RequestContext, SubscriptionId};
use crate::ocpp::events;
use crate::ocpp::messages::{Action, OcppResponse};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// How the authoritative handler result is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SelectionPolicy {
    /// The earliest handler to finish decides, success or failure.
    #[default]
    FirstCompleted,
    /// The earliest successful handler decides; failures are skipped until the deadline.
    FirstSuccessful,
}

/// Terminal state of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Resolution {
    Resolved,
    DefaultedOnEmptySet,
    DefaultedOnTimeout,
    /// The deciding handler result was a failure (or every handler failed).
    DefaultedOnAllFailed,
}

impl Resolution {
    pub fn is_default(self) -> bool {
        self != Resolution::Resolved
    }
}

#[derive(Debug)]
pub struct DispatchOutcome<R> {
    pub response: R,
    pub resolution: Resolution,
    /// Handler whose result was selected.
    pub subscription: Option<SubscriptionId>,
    pub error: Option<HandlerError>,
}

impl<R: OcppResponse> DispatchOutcome<R> {
    fn defaulted(resolution: Resolution, subscription: Option<SubscriptionId>, error: Option<HandlerError>) -> Self {
        Self {
            response: R::failed(),
            resolution,
            subscription,
            error,
        }
    }
}

/// Deadline per action name with a shared fallback.
///
/// Action names match case-insensitively, so keys that arrive lowercased from
/// environment overrides still apply.
#[derive(Debug, Clone)]
pub struct DispatchTimeouts {
    default: Duration,
    per_action: HashMap<String, Duration>,
}

impl Default for DispatchTimeouts {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl DispatchTimeouts {
    pub fn new(default: Duration) -> Self {
        Self {
            default,
            per_action: HashMap::new(),
        }
    }

    pub fn with_action(mut self, action: impl Into<String>, timeout: Duration) -> Self {
        self.per_action.insert(action.into().to_ascii_lowercase(), timeout);
        self
    }

    pub fn for_action(&self, action: &str) -> Duration {
        self.per_action
            .get(&action.to_ascii_lowercase())
            .copied()
            .unwrap_or(self.default)
    }
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    timeouts: DispatchTimeouts,
    policy: SelectionPolicy,
}

impl Dispatcher {
    pub fn new(registry: Arc<HandlerRegistry>, timeouts: DispatchTimeouts) -> Self {
        Self {
            registry,
            timeouts,
            policy: SelectionPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: SelectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    pub fn timeouts(&self) -> &DispatchTimeouts {
        &self.timeouts
    }

    /// Runs every handler registered for `A` concurrently and returns exactly one response.
    ///
    /// With no handlers the failed response is returned immediately. Otherwise the first
    /// handler result chosen by the selection policy wins; when the deadline passes first,
    /// handlers still running are signalled through the context's cancellation token, left
    /// to finish on their own, and their results discarded.
    pub async fn dispatch<A: Action>(&self, ctx: RequestContext, request: A::Request) -> DispatchOutcome<A::Response> {
        let handlers = self.registry.snapshot::<A>();
        let tracking_id = ctx.event_tracking_id.clone();

        if handlers.is_empty() {
            debug!(
                event = events::DISPATCH_EMPTY_SET,
                action = A::NAME,
                event_tracking_id = %tracking_id,
                "no handlers registered, answering with the failed response"
            );
            return DispatchOutcome::defaulted(Resolution::DefaultedOnEmptySet, None, None);
        }

        let deadline = self.timeouts.for_action(A::NAME);
        let cancellation = ctx.cancellation.child_token();
        let started = Instant::now();

        debug!(
            event = events::DISPATCH_START,
            action = A::NAME,
            event_tracking_id = %tracking_id,
            handlers = handlers.len(),
            timeout_ms = deadline.as_millis() as u64,
            "dispatching request"
        );

        let mut pending = FuturesUnordered::new();
        for (id, handler) in handlers {
            let mut handler_ctx = ctx.clone();
            handler_ctx.cancellation = cancellation.clone();
            handler_ctx.timeout = deadline;
            let request = request.clone();
            let task = tokio::spawn(async move { handler.handle(handler_ctx, request).await });
            pending.push(async move {
                let result = match task.await {
                    Ok(result) => result,
                    Err(join_error) => Err(HandlerError::Panicked(join_error.to_string())),
                };
                (id, result)
            });
        }

        let policy = self.policy;
        let selection = async {
            let mut last_failure: Option<(SubscriptionId, HandlerError)> = None;
            while let Some((id, result)) = pending.next().await {
                match result {
                    Ok(response) => return Ok((id, response)),
                    Err(err) => {
                        warn!(
                            event = events::DISPATCH_HANDLER_FAILED,
                            action = A::NAME,
                            event_tracking_id = %tracking_id,
                            subscription = %id,
                            error = %err,
                            "request handler failed"
                        );
                        if policy == SelectionPolicy::FirstCompleted {
                            return Err((Some(id), err));
                        }
                        last_failure = Some((id, err));
                    }
                }
            }
            Err(match last_failure {
                Some((id, err)) => (Some(id), err),
                None => (None, HandlerError::NoResponse),
            })
        };

        let outcome = match tokio::time::timeout(deadline, selection).await {
            Err(_elapsed) => {
                cancellation.cancel();
                warn!(
                    event = events::DISPATCH_TIMEOUT,
                    action = A::NAME,
                    event_tracking_id = %tracking_id,
                    timeout_ms = deadline.as_millis() as u64,
                    "no handler answered before the deadline"
                );
                DispatchOutcome::defaulted(Resolution::DefaultedOnTimeout, None, None)
            }
            Ok(Ok((id, response))) => DispatchOutcome {
                response,
                resolution: Resolution::Resolved,
                subscription: Some(id),
                error: None,
            },
            Ok(Err((id, err))) => DispatchOutcome::defaulted(Resolution::DefaultedOnAllFailed, id, Some(err)),
        };

        info!(
            event = events::DISPATCH_RESOLVED,
            action = A::NAME,
            event_tracking_id = %tracking_id,
            resolution = outcome.resolution.as_ref(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "dispatch finished"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocpp::enums::{ResetStatus, ResetType};
    use crate::ocpp::header::Header;
    use crate::ocpp::ids::MessageId;
    use crate::ocpp::messages::{Reset, ResetRequest, ResetResponse};
    use chrono::Utc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio_util::sync::CancellationToken;

    fn context() -> RequestContext {
        let header = Header::request("Reset", MessageId::random(), Utc::now());
        RequestContext::new(header, CancellationToken::new())
    }

    fn request() -> ResetRequest {
        ResetRequest { kind: ResetType::Soft }
    }

    fn answer_after(
        registry: &HandlerRegistry,
        delay: Duration,
        result: Result<ResetStatus, &'static str>,
    ) -> SubscriptionId {
        registry.register_fn::<Reset, _, _>(move |_ctx, _req| async move {
            tokio::time::sleep(delay).await;
            result
                .map(|status| ResetResponse { status })
                .map_err(|reason| HandlerError::Failed(reason.to_owned()))
        })
    }

    fn dispatcher(registry: Arc<HandlerRegistry>) -> Dispatcher {
        Dispatcher::new(registry, DispatchTimeouts::default())
    }

    #[tokio::test(start_paused = true)]
    async fn empty_set_answers_immediately_with_the_failed_response() {
        let dispatcher = dispatcher(Arc::new(HandlerRegistry::new()));
        let started = Instant::now();
        let outcome = dispatcher.dispatch::<Reset>(context(), request()).await;

        assert_eq!(outcome.resolution, Resolution::DefaultedOnEmptySet);
        assert_eq!(outcome.response, ResetResponse::failed());
        assert!(outcome.error.is_none());
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn fastest_successful_handler_wins() {
        let registry = Arc::new(HandlerRegistry::new());
        answer_after(&registry, Duration::from_secs(5), Ok(ResetStatus::Rejected));
        let fast = answer_after(&registry, Duration::from_secs(1), Ok(ResetStatus::Accepted));
        answer_after(&registry, Duration::from_secs(3), Err("slow failure"));

        let outcome = dispatcher(registry).dispatch::<Reset>(context(), request()).await;
        assert_eq!(outcome.resolution, Resolution::Resolved);
        assert_eq!(outcome.subscription, Some(fast));
        assert_eq!(outcome.response.status, ResetStatus::Accepted);
    }

    #[tokio::test(start_paused = true)]
    async fn first_completed_failure_falls_back_to_the_default() {
        let registry = Arc::new(HandlerRegistry::new());
        let failing = answer_after(&registry, Duration::from_secs(1), Err("boom"));
        answer_after(&registry, Duration::from_secs(2), Ok(ResetStatus::Accepted));

        let outcome = dispatcher(registry).dispatch::<Reset>(context(), request()).await;
        assert_eq!(outcome.resolution, Resolution::DefaultedOnAllFailed);
        assert_eq!(outcome.subscription, Some(failing));
        assert_eq!(outcome.response, ResetResponse::failed());
        assert!(matches!(outcome.error, Some(HandlerError::Failed(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn first_successful_policy_skips_failures() {
        let registry = Arc::new(HandlerRegistry::new());
        answer_after(&registry, Duration::from_secs(1), Err("boom"));
        let good = answer_after(&registry, Duration::from_secs(2), Ok(ResetStatus::Accepted));

        let outcome = dispatcher(registry)
            .with_policy(SelectionPolicy::FirstSuccessful)
            .dispatch::<Reset>(context(), request())
            .await;
        assert_eq!(outcome.resolution, Resolution::Resolved);
        assert_eq!(outcome.subscription, Some(good));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expiry_returns_the_default_no_earlier_than_the_deadline() {
        let registry = Arc::new(HandlerRegistry::new());
        let cancelled = Arc::new(AtomicBool::new(false));
        let seen = Arc::clone(&cancelled);
        registry.register_fn::<Reset, _, _>(move |ctx, _req| {
            let seen = Arc::clone(&seen);
            async move {
                ctx.cancellation.cancelled().await;
                seen.store(true, Ordering::SeqCst);
                Ok(ResetResponse { status: ResetStatus::Accepted })
            }
        });

        let started = Instant::now();
        let outcome = dispatcher(registry).dispatch::<Reset>(context(), request()).await;
        assert!(started.elapsed() >= DEFAULT_TIMEOUT);
        assert_eq!(outcome.resolution, Resolution::DefaultedOnTimeout);
        assert_eq!(outcome.response, ResetResponse::failed());

        for _ in 0..10 {
            if cancelled.load(Ordering::SeqCst) {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(cancelled.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn per_action_timeouts_override_the_default() {
        let registry = Arc::new(HandlerRegistry::new());
        answer_after(&registry, Duration::from_secs(20), Ok(ResetStatus::Accepted));
        let timeouts = DispatchTimeouts::default().with_action("Reset", Duration::from_secs(10));
        assert_eq!(timeouts.for_action("Heartbeat"), DEFAULT_TIMEOUT);

        let started = Instant::now();
        let outcome = Dispatcher::new(registry, timeouts)
            .dispatch::<Reset>(context(), request())
            .await;
        assert_eq!(outcome.resolution, Resolution::DefaultedOnTimeout);
        assert!(started.elapsed() >= Duration::from_secs(10));
        assert!(started.elapsed() < Duration::from_secs(20));
    }

    #[test]
    fn action_timeouts_ignore_case() {
        let timeouts = DispatchTimeouts::default().with_action("remotestarttransaction", Duration::from_secs(7));
        assert_eq!(timeouts.for_action("RemoteStartTransaction"), Duration::from_secs(7));
        assert_eq!(timeouts.for_action("REMOTESTARTTRANSACTION"), Duration::from_secs(7));
        assert_eq!(timeouts.for_action("RemoteStopTransaction"), DEFAULT_TIMEOUT);
    }

    #[tokio::test]
    async fn panicking_handler_is_a_failure_not_a_crash() {
        let registry = Arc::new(HandlerRegistry::new());
        registry.register_fn::<Reset, _, _>(|_ctx, _req| async {
            if true {
                panic!("handler bug");
            }
            Ok(ResetResponse { status: ResetStatus::Accepted })
        });

        let outcome = dispatcher(registry).dispatch::<Reset>(context(), request()).await;
        assert_eq!(outcome.resolution, Resolution::DefaultedOnAllFailed);
        assert!(matches!(outcome.error, Some(HandlerError::Panicked(_))));
    }
}
