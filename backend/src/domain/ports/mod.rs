//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod profile_cache;
mod profile_command;
mod profile_event_publisher;
mod profile_repository;
mod user_event_source;

#[cfg(test)]
pub use profile_cache::MockProfileCache;
pub use profile_cache::{CacheGeneration, CacheLookup, ProfileCache, ProfileCacheError};
#[cfg(test)]
pub use profile_command::{MockProfileCommand, MockProfileQuery};
pub use profile_command::{ProfileCommand, ProfileQuery};
#[cfg(test)]
pub use profile_event_publisher::MockProfileEventPublisher;
pub use profile_event_publisher::{
    NoOpProfileEventPublisher, ProfileEventPublishError, ProfileEventPublisher,
};
#[cfg(test)]
pub use profile_repository::MockProfileRepository;
pub use profile_repository::{
    DeletionMode, DeletionModeParseError, ProfileRepository, ProfileRepositoryError,
};
#[cfg(test)]
pub use user_event_source::MockUserEventSource;
pub use user_event_source::{UserEventDelivery, UserEventSource, UserEventSourceError};
