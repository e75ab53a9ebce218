//! Builders wiring configured adapters into the profile orchestrator.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use mockable::DefaultClock;
use profile_service::config::ServiceConfig;
use profile_service::domain::ports::{
    ProfileCache, ProfileRepository, UserEventSource, UserEventSourceError,
};
use profile_service::domain::{
    ProfileService, ProfileValidationError, RandomNicknameGenerator, ThreadRngSource,
};
use profile_service::outbound::cache::RedisProfileCache;
#[cfg(feature = "kafka")]
use profile_service::outbound::events::KafkaUserEventSource;
use profile_service::outbound::events::{
    ChannelUserEventSource, TracingProfileEventPublisher, UserEventSender,
};
use profile_service::outbound::memory::InMemoryProfileRepository;
use profile_service::outbound::persistence::{
    DbPool, DieselProfileRepository, MigrationError, PoolConfig, PoolError,
    run_pending_migrations,
};

/// Errors raised while assembling the service at startup.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Pending schema migrations could not be applied.
    #[error("database migrations failed: {0}")]
    Migrations(#[from] MigrationError),
    /// The connection pool could not be built or reach the database.
    #[error("database pool could not be built: {0}")]
    Pool(#[from] PoolError),
    /// The configured prefix cannot form a valid nickname.
    #[error("nickname prefix is unusable: {0}")]
    NicknamePrefix(#[from] ProfileValidationError),
    /// The upstream user event stream could not be joined.
    #[error("user event source could not be opened: {0}")]
    EventSource(#[from] UserEventSourceError),
}

/// Capacity of the in-process event channel.
const USER_EVENT_BUFFER: usize = 1024;

/// Orchestrator plus the resources it holds open.
pub struct ProfileStack {
    pub service: Arc<ProfileService>,
    pub db_pool: Option<DbPool>,
}

async fn build_repository(
    config: &ServiceConfig,
) -> Result<(Arc<dyn ProfileRepository>, Option<DbPool>), StartupError> {
    let Some(url) = config.database_url.as_deref() else {
        warn!(
            environment = %config.environment,
            "PROFILE_DATABASE_URL not set; profiles are kept in memory"
        );
        return Ok((
            Arc::new(InMemoryProfileRepository::new(config.deletion_mode)),
            None,
        ));
    };

    run_pending_migrations(url).await?;
    let pool = DbPool::new(PoolConfig::new(url)).await?;
    pool.ping().await?;
    info!(deletion_mode = ?config.deletion_mode, "using PostgreSQL profile repository");
    Ok((
        Arc::new(DieselProfileRepository::new(
            pool.clone(),
            config.deletion_mode,
        )),
        Some(pool),
    ))
}

async fn build_cache(config: &ServiceConfig) -> Option<Arc<dyn ProfileCache>> {
    let url = config.redis_url.as_deref()?;
    match RedisProfileCache::connect(url, config.cache_ttl).await {
        Ok(cache) => {
            info!(ttl_secs = config.cache_ttl.as_secs(), "profile cache enabled");
            Some(Arc::new(cache))
        }
        Err(err) => {
            warn!(error = %err, "profile cache unavailable; continuing without it");
            None
        }
    }
}

/// Assemble the orchestrator from configuration.
///
/// # Errors
/// Returns [`StartupError`] when storage cannot be prepared or the nickname
/// prefix is rejected.
pub async fn build_profile_stack(config: &ServiceConfig) -> Result<ProfileStack, StartupError> {
    let (repository, db_pool) = build_repository(config).await?;
    let nicknames = RandomNicknameGenerator::new(
        config.nickname_prefix.clone(),
        config.nickname_length,
        Arc::new(ThreadRngSource),
    )?;

    let mut service = ProfileService::new(
        repository,
        Arc::new(TracingProfileEventPublisher),
        Arc::new(nicknames),
        Arc::new(DefaultClock),
        config.max_nickname_retries,
    );
    if let Some(cache) = build_cache(config).await {
        service = service.with_cache(cache);
    }

    Ok(ProfileStack {
        service: Arc::new(service),
        db_pool,
    })
}

enum IntakeHandle {
    Channel(UserEventSender),
    #[cfg(feature = "kafka")]
    Kafka(Arc<KafkaUserEventSource>),
}

/// User event source for the consumer plus the handle that ends its stream.
pub struct EventIntake {
    pub source: Arc<dyn UserEventSource>,
    handle: IntakeHandle,
}

impl EventIntake {
    /// Sender for in-process producers; `None` when reading from Kafka.
    pub fn sender(&self) -> Option<&UserEventSender> {
        match &self.handle {
            IntakeHandle::Channel(sender) => Some(sender),
            #[cfg(feature = "kafka")]
            IntakeHandle::Kafka(_) => None,
        }
    }

    /// End the stream so the consumer drains and returns.
    pub fn close(self) {
        match self.handle {
            IntakeHandle::Channel(sender) => drop(sender),
            #[cfg(feature = "kafka")]
            IntakeHandle::Kafka(source) => source.close(),
        }
    }
}

fn channel_intake() -> EventIntake {
    let (source, sender) = ChannelUserEventSource::new(USER_EVENT_BUFFER);
    EventIntake {
        source: Arc::new(source),
        handle: IntakeHandle::Channel(sender),
    }
}

/// Open the upstream user event source.
///
/// Kafka is used when brokers are configured; otherwise events are read from
/// an in-process channel that only the returned intake can feed.
///
/// # Errors
/// Returns [`StartupError::EventSource`] when the Kafka consumer cannot be
/// created or subscribed.
pub fn build_event_intake(config: &ServiceConfig) -> Result<EventIntake, StartupError> {
    let Some(stream) = config.user_events.as_ref() else {
        info!("PROFILE_USER_EVENT_BROKERS not set; upstream user events are disabled");
        return Ok(channel_intake());
    };

    #[cfg(feature = "kafka")]
    {
        let source = Arc::new(KafkaUserEventSource::connect(stream)?);
        Ok(EventIntake {
            source: source.clone(),
            handle: IntakeHandle::Kafka(source),
        })
    }

    #[cfg(not(feature = "kafka"))]
    {
        warn!(
            topic = %stream.topic,
            "built without the kafka feature; upstream user events are disabled"
        );
        Ok(channel_intake())
    }
}
