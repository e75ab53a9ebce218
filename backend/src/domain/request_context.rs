//! Per-call context carried from inbound adapters into the orchestrator.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::TraceId;

/// Time left before a caller's deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Budget {
    /// The caller did not set a deadline.
    Unbounded,
    /// Time remaining until the deadline.
    Remaining(Duration),
    /// The deadline has already passed.
    Expired,
}

/// Correlation and cancellation data for one unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    trace_id: TraceId,
    deadline: Option<DateTime<Utc>>,
}

impl RequestContext {
    /// Context without a deadline.
    pub fn new(trace_id: TraceId) -> Self {
        Self {
            trace_id,
            deadline: None,
        }
    }

    /// Context for background work with a freshly generated trace id.
    pub fn background() -> Self {
        Self::new(TraceId::current().unwrap_or_else(TraceId::generate))
    }

    /// Set an absolute deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set a deadline `timeout` after `now`.
    #[must_use]
    pub fn with_timeout(self, now: DateTime<Utc>, timeout: Duration) -> Self {
        let delta = chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::MAX);
        let deadline = now.checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.with_deadline(deadline)
    }

    /// Trace identifier for logs and errors.
    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    /// Absolute deadline, if any.
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    /// Time left before the deadline as observed at `now`.
    pub fn budget(&self, now: DateTime<Utc>) -> Budget {
        let Some(deadline) = self.deadline else {
            return Budget::Unbounded;
        };
        match (deadline - now).to_std() {
            Ok(remaining) if !remaining.is_zero() => Budget::Remaining(remaining),
            _ => Budget::Expired,
        }
    }
}
