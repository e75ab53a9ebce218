//! Applies upstream user lifecycle events to profiles.
//!
//! Delivery is at least once, so every handler is idempotent: creating a
//! profile that already exists or deleting one that is already gone is
//! reported as [`ConsumeOutcome::Duplicate`] and acknowledged. Transient
//! failures wait out a jittered exponential backoff before redelivery.
use std::sync::Arc;
use std::time::Duration;

use mockable::Clock;
use tracing::{debug, error, info, warn};

use crate::domain::ports::{
    ProfileCommand, UserEventDelivery, UserEventSource, UserEventSourceError,
};
use crate::domain::{
    ErrorCode, RequestContext, RetryBackoff, RetryRuntime, TraceId, UserLifecycleEvent,
};

/// How a single delivery was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// The event changed a profile.
    Applied,
    /// The event had already been applied.
    Duplicate,
    /// The payload can never be applied.
    Rejected,
    /// A transient failure prevented handling.
    Retry,
}

/// Pulls deliveries from a [`UserEventSource`] and drives [`ProfileCommand`].
#[derive(Clone)]
pub struct UserEventConsumer {
    source: Arc<dyn UserEventSource>,
    command: Arc<dyn ProfileCommand>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
    max_deliveries: u32,
    backoff: RetryBackoff,
    runtime: RetryRuntime,
}

impl UserEventConsumer {
    /// Default cap on deliveries of one payload before it is dropped.
    pub const DEFAULT_MAX_DELIVERIES: u32 = 5;

    /// Build a consumer whose handlers run under `timeout` each.
    pub fn new(
        source: Arc<dyn UserEventSource>,
        command: Arc<dyn ProfileCommand>,
        clock: Arc<dyn Clock>,
        timeout: Duration,
    ) -> Self {
        Self {
            source,
            command,
            clock,
            timeout,
            max_deliveries: Self::DEFAULT_MAX_DELIVERIES,
            backoff: RetryBackoff::default(),
            runtime: RetryRuntime::default(),
        }
    }

    /// Override the redelivery backoff bounds.
    #[must_use]
    pub fn with_backoff(mut self, backoff: RetryBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Inject the sleeper and jitter used between deliveries.
    #[must_use]
    pub fn with_retry_runtime(mut self, runtime: RetryRuntime) -> Self {
        self.runtime = runtime;
        self
    }

    /// Override the delivery cap. Values below one are raised to one.
    #[must_use]
    pub fn with_max_deliveries(mut self, max_deliveries: u32) -> Self {
        self.max_deliveries = max_deliveries.max(1);
        self
    }

    /// Consume until the source ends, returning the number of deliveries seen.
    pub async fn run(&self) -> u64 {
        let mut handled = 0_u64;
        while let Some(delivery) = self.source.next().await {
            handled += 1;
            if let Err(err) = self.process(delivery).await {
                error!(kind = err.kind(), error = %err, "user event source failed; stopping");
                break;
            }
        }
        info!(handled, "user event consumer stopped");
        handled
    }

    /// Handle one delivery and settle it with the source.
    pub async fn process(
        &self,
        delivery: UserEventDelivery,
    ) -> Result<ConsumeOutcome, UserEventSourceError> {
        let outcome = self.handle(&delivery.payload).await;
        if outcome == ConsumeOutcome::Retry {
            if delivery.attempt < self.max_deliveries {
                let delay = self.runtime.jitter.jittered_delay(
                    self.backoff.base_delay(delivery.attempt),
                    delivery.attempt,
                    self.clock.utc(),
                );
                debug!(
                    delivery_id = delivery.id,
                    attempt = delivery.attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "scheduling user event redelivery"
                );
                self.runtime.sleeper.sleep(delay).await;
                self.source.redeliver(delivery).await?;
                return Ok(outcome);
            }
            error!(
                delivery_id = delivery.id,
                attempt = delivery.attempt,
                "user event still failing after final delivery; dropping"
            );
        }
        self.source.acknowledge(&delivery).await?;
        Ok(outcome)
    }

    /// Decode and apply a raw payload.
    pub async fn handle(&self, payload: &[u8]) -> ConsumeOutcome {
        let event = match UserLifecycleEvent::from_slice(payload) {
            Ok(event) => event,
            Err(err) => {
                warn!(error = %err, "rejecting undecodable user event");
                return ConsumeOutcome::Rejected;
            }
        };
        let trace_id = TraceId::generate();
        let ctx = RequestContext::new(trace_id).with_timeout(self.clock.utc(), self.timeout);
        TraceId::scope(trace_id, self.apply(ctx, event)).await
    }

    async fn apply(&self, ctx: RequestContext, event: UserLifecycleEvent) -> ConsumeOutcome {
        let kind = event.kind();
        let user_id = *event.user_id();
        let result = match event {
            UserLifecycleEvent::UserCreated { user_id, email } => self
                .command
                .create_profile(ctx, user_id, email)
                .await
                .map(|_| ()),
            UserLifecycleEvent::UserDeleted { user_id } => self
                .command
                .delete_profile(ctx, user_id)
                .await
                .map(|_| ()),
        };
        let outcome = match result {
            Ok(()) => ConsumeOutcome::Applied,
            Err(err) => match (kind, err.code()) {
                ("user_created", ErrorCode::AlreadyExists) | ("user_deleted", ErrorCode::NotFound) => {
                    ConsumeOutcome::Duplicate
                }
                (_, ErrorCode::InvalidRequest) => {
                    warn!(%user_id, event = kind, error = %err, "rejecting invalid user event");
                    ConsumeOutcome::Rejected
                }
                _ => {
                    warn!(%user_id, event = kind, error = %err, "user event failed; will retry");
                    ConsumeOutcome::Retry
                }
            },
        };
        debug!(%user_id, event = kind, ?outcome, trace_id = %ctx.trace_id(), "user event handled");
        outcome
    }
}
