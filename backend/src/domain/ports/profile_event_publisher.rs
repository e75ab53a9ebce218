//! Port for announcing profile changes to other subsystems.
use async_trait::async_trait;

use crate::domain::ProfileEvent;

use super::define_port_error;

define_port_error! {
    /// Errors raised while publishing profile events.
    pub enum ProfileEventPublishError {
        /// The event sink rejected or dropped the event.
        Backend { message: String } => "profile event publish failed: {message}",
    }
}

/// Outbound sink for [`ProfileEvent`]s.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileEventPublisher: Send + Sync {
    /// Publish one event.
    async fn publish(&self, event: &ProfileEvent) -> Result<(), ProfileEventPublishError>;
}

/// Publisher that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpProfileEventPublisher;

#[async_trait]
impl ProfileEventPublisher for NoOpProfileEventPublisher {
    async fn publish(&self, _event: &ProfileEvent) -> Result<(), ProfileEventPublishError> {
        Ok(())
    }
}
