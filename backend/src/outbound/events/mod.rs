//! Event adapters: user event sources and profile event sinks.

mod channel_source;
#[cfg(feature = "kafka")]
mod kafka_source;
mod tracing_publisher;

pub use channel_source::{ChannelUserEventSource, UserEventSender};
#[cfg(feature = "kafka")]
pub use kafka_source::KafkaUserEventSource;
pub use tracing_publisher::TracingProfileEventPublisher;
