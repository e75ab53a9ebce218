//! Port for the inbound user lifecycle event stream.
//!
//! Delivery is at least once: a payload may arrive more than once and must be
//! acknowledged after it has been handled. Unacknowledged deliveries can be
//! handed back with [`UserEventSource::redeliver`].

use async_trait::async_trait;

use super::define_port_error;

define_port_error! {
    /// Errors raised by user event source adapters.
    pub enum UserEventSourceError {
        /// The underlying transport failed.
        Transport { message: String } => "user event transport failed: {message}",
        /// The source has shut down and accepts no further calls.
        Closed => "user event source closed",
    }
}

/// One delivery of a raw event payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEventDelivery {
    /// Source-assigned delivery identifier.
    pub id: u64,
    /// Raw JSON payload.
    pub payload: Vec<u8>,
    /// How many times this payload has been delivered, starting at 1.
    pub attempt: u32,
}

/// At-least-once source of [`UserEventDelivery`] values.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserEventSource: Send + Sync {
    /// Wait for the next delivery. `None` means the stream has ended.
    async fn next(&self) -> Option<UserEventDelivery>;

    /// Mark a delivery as handled.
    async fn acknowledge(&self, delivery: &UserEventDelivery) -> Result<(), UserEventSourceError>;

    /// Hand a delivery back for another attempt.
    async fn redeliver(&self, delivery: UserEventDelivery) -> Result<(), UserEventSourceError>;
}
