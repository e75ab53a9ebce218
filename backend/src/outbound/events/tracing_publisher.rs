//! Profile event sink that writes structured log records.
use async_trait::async_trait;
use tracing::info;

use crate::domain::ProfileEvent;
use crate::domain::ports::{ProfileEventPublishError, ProfileEventPublisher};

/// Emits each [`ProfileEvent`] as an `info` record with a JSON body.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProfileEventPublisher;

#[async_trait]
impl ProfileEventPublisher for TracingProfileEventPublisher {
    async fn publish(&self, event: &ProfileEvent) -> Result<(), ProfileEventPublishError> {
        let body = serde_json::to_string(event)
            .map_err(|err| ProfileEventPublishError::backend(err.to_string()))?;
        info!(
            target: "profile_events",
            event = event.kind(),
            user_id = %event.user_id(),
            %body,
            "profile event"
        );
        Ok(())
    }
}
