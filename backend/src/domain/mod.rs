//! Domain primitives, ports and the profile lifecycle orchestrator.
//!
//! Purpose: keep profile semantics independent of transport and storage.
//! Inbound adapters call the driving ports in [`ports`]; outbound adapters
//! implement the driven ones.
//!
//! Public surface:
//! - Error / ErrorCode: transport-neutral failure payload.
//! - Profile, UserId, Email, Nickname, ProfilePatch: the profile model.
//! - RandomNicknameGenerator: prefix plus random alphanumeric nicknames.
//! - ProfileService: create, get, update and delete orchestration.
//! - UserEventConsumer: applies upstream user lifecycle events.
//! - RetryBackoff / RetryRuntime: redelivery backoff for the consumer.

pub mod error;
pub mod event_retry;
pub mod nickname;
pub mod ports;
pub mod profile;
pub mod profile_events;
pub mod profile_service;
pub mod request_context;
pub mod trace_id;
pub mod user_event_consumer;

pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::event_retry::{
    AttemptJitter, RetryBackoff, RetryJitter, RetryRuntime, RetrySleeper, TokioSleeper,
};
pub use self::nickname::{
    MaxNicknameRetries, MaxNicknameRetriesError, NICKNAME_ALPHABET, NicknameGenerator,
    NicknameLength, NicknameLengthError, RandomNicknameGenerator, RandomSource,
    SeededRandomSource, ThreadRngSource,
};
pub use self::profile::{
    Email, FieldUpdate, NewProfile, Nickname, Profile, ProfilePatch, ProfileValidationError,
    UserId,
};
pub use self::profile_events::{ProfileEvent, UserLifecycleEvent};
pub use self::profile_service::{CreationOutcome, ProfileService, map_repository_error};
pub use self::request_context::{Budget, RequestContext};
pub use self::trace_id::TraceId;
pub use self::user_event_consumer::{ConsumeOutcome, UserEventConsumer};

/// Convenient domain result alias.
///
/// # Examples
/// ```
/// use profile_service::domain::{DomainResult, Error};
///
/// fn lookup() -> DomainResult<()> {
///     Err(Error::not_found("profile not found"))
/// }
/// assert!(lookup().is_err());
/// ```
pub type DomainResult<T> = Result<T, Error>;
