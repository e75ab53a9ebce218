//! Profile lifecycle orchestration.
//!
//! [`ProfileService`] sequences nickname generation, repository writes, cache
//! maintenance and event publication for every profile operation. Repository
//! outcomes decide the result; cache and event side effects are best effort
//! and only ever logged when they fail. Cache fills present the slot
//! generation seen before the repository read, so a fill that lost a race with
//! an update or delete is refused instead of reviving stale data.
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde_json::json;
use tracing::{debug, error, warn};

use crate::domain::ports::{
    CacheGeneration, CacheLookup, ProfileCache, ProfileCommand, ProfileEventPublisher, ProfileQuery, ProfileRepository,
    ProfileRepositoryError,
};
use crate::domain::{
    Budget, Email, Error, MaxNicknameRetries, NewProfile, NicknameGenerator, Profile,
    ProfileEvent, ProfilePatch, RequestContext, UserId,
};

/// Terminal state of the bounded nickname loop.
#[derive(Debug, Clone, PartialEq)]
pub enum CreationOutcome {
    /// A candidate was accepted by the repository.
    Created { profile: Profile, attempts: u32 },
    /// Every permitted attempt collided on the nickname.
    Exhausted { attempts: u32 },
    /// A non-retryable failure ended the loop.
    Failed { error: Error, attempts: u32 },
    /// The caller's deadline passed before a profile was stored.
    Cancelled { attempts: u32 },
}

impl CreationOutcome {
    /// Number of nicknames drawn before the loop stopped.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Created { attempts, .. }
            | Self::Exhausted { attempts }
            | Self::Failed { attempts, .. }
            | Self::Cancelled { attempts } => *attempts,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct DeadlineExceeded;

/// Cache state observed before a repository read.
enum CacheRead {
    Hit(Profile),
    Miss(CacheGeneration),
    Unavailable,
}

/// Use-case layer for the profile entity.
#[derive(Clone)]
pub struct ProfileService {
    repository: Arc<dyn ProfileRepository>,
    cache: Option<Arc<dyn ProfileCache>>,
    events: Arc<dyn ProfileEventPublisher>,
    nicknames: Arc<dyn NicknameGenerator>,
    clock: Arc<dyn Clock>,
    max_retries: MaxNicknameRetries,
}

impl ProfileService {
    /// Create a service without a cache.
    ///
    /// ```rust,no_run
    /// # use std::sync::Arc;
    /// # use mockable::DefaultClock;
    /// # use profile_service::domain::{
    /// #     MaxNicknameRetries, NicknameLength, ProfileService, RandomNicknameGenerator,
    /// #     ThreadRngSource,
    /// # };
    /// # use profile_service::domain::ports::NoOpProfileEventPublisher;
    /// # use profile_service::outbound::memory::InMemoryProfileRepository;
    /// let generator = RandomNicknameGenerator::new(
    ///     "user_",
    ///     NicknameLength::new(8).expect("valid length"),
    ///     Arc::new(ThreadRngSource),
    /// )
    /// .expect("valid prefix");
    /// let service = ProfileService::new(
    ///     Arc::new(InMemoryProfileRepository::default()),
    ///     Arc::new(NoOpProfileEventPublisher),
    ///     Arc::new(generator),
    ///     Arc::new(DefaultClock),
    ///     MaxNicknameRetries::new(5).expect("valid budget"),
    /// );
    /// # let _ = service;
    /// ```
    pub fn new(
        repository: Arc<dyn ProfileRepository>,
        events: Arc<dyn ProfileEventPublisher>,
        nicknames: Arc<dyn NicknameGenerator>,
        clock: Arc<dyn Clock>,
        max_retries: MaxNicknameRetries,
    ) -> Self {
        Self {
            repository,
            cache: None,
            events,
            nicknames,
            clock,
            max_retries,
        }
    }

    /// Attach a lookup cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn ProfileCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Run `fut` within whatever remains of the caller's deadline.
    async fn within<F, T>(&self, ctx: &RequestContext, fut: F) -> Result<T, DeadlineExceeded>
    where
        F: Future<Output = T>,
    {
        match ctx.budget(self.clock.utc()) {
            Budget::Unbounded => Ok(fut.await),
            Budget::Remaining(remaining) => tokio::time::timeout(remaining, fut)
                .await
                .map_err(|_| DeadlineExceeded),
            Budget::Expired => Err(DeadlineExceeded),
        }
    }

    /// Draw nicknames and attempt inserts until one sticks or the loop ends.
    pub async fn run_creation(
        &self,
        ctx: &RequestContext,
        user_id: UserId,
        email: Option<Email>,
    ) -> CreationOutcome {
        let mut attempts = 0;
        while attempts < self.max_retries.get() {
            if ctx.budget(self.clock.utc()) == Budget::Expired {
                return CreationOutcome::Cancelled { attempts };
            }
            attempts += 1;
            let candidate = NewProfile {
                user_id,
                nickname: self.nicknames.generate(),
                email: email.clone(),
            };
            let now = self.clock.utc();
            let Ok(inserted) = self
                .within(ctx, self.repository.insert(&candidate, now))
                .await
            else {
                return CreationOutcome::Cancelled { attempts };
            };
            match inserted {
                Ok(profile) => return CreationOutcome::Created { profile, attempts },
                Err(ProfileRepositoryError::NicknameConflict { nickname }) => {
                    debug!(%user_id, %nickname, attempt = attempts, "nickname collision");
                }
                Err(ProfileRepositoryError::UserConflict { .. }) => {
                    return CreationOutcome::Failed {
                        error: profile_exists(&user_id),
                        attempts,
                    };
                }
                Err(other) => {
                    return CreationOutcome::Failed {
                        error: map_repository_error(&other),
                        attempts,
                    };
                }
            }
        }
        CreationOutcome::Exhausted { attempts }
    }

    async fn find_stored(
        &self,
        ctx: &RequestContext,
        user_id: &UserId,
    ) -> Result<Option<Profile>, Error> {
        self.within(ctx, self.repository.find_by_user_id(user_id))
            .await
            .map_err(|_| deadline_error())?
            .map_err(|err| map_repository_error(&err))
    }

    async fn fill_cache(
        &self,
        ctx: &RequestContext,
        profile: &Profile,
        observed: CacheGeneration,
    ) {
        let Some(cache) = &self.cache else {
            return;
        };
        match self.within(ctx, cache.fill(profile, observed)).await {
            Ok(Ok(true)) => {}
            Ok(Ok(false)) => debug!(
                user_id = %profile.user_id(),
                generation = observed.get(),
                "profile changed since read; skipping cache fill"
            ),
            Ok(Err(err)) => warn!(
                user_id = %profile.user_id(),
                kind = err.kind(),
                error = %err,
                "failed to populate profile cache"
            ),
            Err(DeadlineExceeded) => warn!(
                user_id = %profile.user_id(),
                "deadline passed before profile cache write"
            ),
        }
    }

    async fn invalidate_cache(&self, ctx: &RequestContext, user_id: &UserId) {
        let Some(cache) = &self.cache else {
            return;
        };
        match self.within(ctx, cache.invalidate(user_id)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(
                %user_id,
                kind = err.kind(),
                error = %err,
                "failed to invalidate profile cache"
            ),
            Err(DeadlineExceeded) => {
                warn!(%user_id, "deadline passed before profile cache invalidation");
            }
        }
    }

    async fn lookup_cache(
        &self,
        ctx: &RequestContext,
        user_id: &UserId,
    ) -> Result<CacheRead, Error> {
        let Some(cache) = &self.cache else {
            return Ok(CacheRead::Unavailable);
        };
        match self.within(ctx, cache.get(user_id)).await {
            Ok(Ok(CacheLookup::Hit(profile))) => Ok(CacheRead::Hit(profile)),
            Ok(Ok(CacheLookup::Miss(generation))) => Ok(CacheRead::Miss(generation)),
            Ok(Err(err)) => {
                warn!(
                    %user_id,
                    kind = err.kind(),
                    error = %err,
                    "profile cache read failed; falling back to repository"
                );
                Ok(CacheRead::Unavailable)
            }
            Err(DeadlineExceeded) => Err(deadline_error()),
        }
    }

    async fn publish(&self, event: ProfileEvent) {
        if let Err(err) = self.events.publish(&event).await {
            warn!(
                user_id = %event.user_id(),
                event = event.kind(),
                error = %err,
                "failed to publish profile event"
            );
        }
    }

    fn outcome_into_result(
        &self,
        user_id: &UserId,
        outcome: CreationOutcome,
    ) -> Result<Profile, Error> {
        match outcome {
            CreationOutcome::Created { profile, .. } => Ok(profile),
            CreationOutcome::Exhausted { attempts } => {
                warn!(
                    %user_id,
                    attempts,
                    "nickname generation exhausted; consider a longer nickname length"
                );
                Err(
                    Error::resource_exhausted("could not allocate a unique nickname")
                        .with_details(json!({ "attempts": attempts })),
                )
            }
            CreationOutcome::Failed { error, attempts } => {
                if error.code() != crate::domain::ErrorCode::AlreadyExists {
                    error!(%user_id, attempts, error = %error, "profile creation failed");
                }
                Err(error)
            }
            CreationOutcome::Cancelled { attempts } => {
                debug!(%user_id, attempts, "profile creation cancelled by deadline");
                Err(deadline_error())
            }
        }
    }
}

#[async_trait]
impl ProfileCommand for ProfileService {
    async fn create_profile(
        &self,
        ctx: RequestContext,
        user_id: UserId,
        email: Option<Email>,
    ) -> Result<Profile, Error> {
        let cache_state = self.lookup_cache(&ctx, &user_id).await?;
        if self.find_stored(&ctx, &user_id).await?.is_some() {
            return Err(profile_exists(&user_id));
        }
        let outcome = self.run_creation(&ctx, user_id, email).await;
        let profile = self.outcome_into_result(&user_id, outcome)?;
        match cache_state {
            CacheRead::Miss(generation) => self.fill_cache(&ctx, &profile, generation).await,
            // A hit for a user with no stored profile is a leftover entry.
            CacheRead::Hit(_) => self.invalidate_cache(&ctx, &user_id).await,
            CacheRead::Unavailable => {}
        }
        self.publish(ProfileEvent::ProfileCreated {
            trace_id: ctx.trace_id(),
            profile: profile.clone(),
        })
        .await;
        Ok(profile)
    }

    async fn update_profile(
        &self,
        ctx: RequestContext,
        user_id: UserId,
        patch: ProfilePatch,
    ) -> Result<Profile, Error> {
        if patch.is_empty() {
            return self
                .find_stored(&ctx, &user_id)
                .await?
                .ok_or_else(|| profile_missing(&user_id));
        }
        let now = self.clock.utc();
        let profile = self
            .within(&ctx, self.repository.update(&user_id, &patch, now))
            .await
            .map_err(|_| deadline_error())?
            .map_err(|err| map_repository_error(&err))?;
        self.invalidate_cache(&ctx, &user_id).await;
        self.publish(ProfileEvent::ProfileUpdated {
            trace_id: ctx.trace_id(),
            profile: profile.clone(),
        })
        .await;
        Ok(profile)
    }

    async fn delete_profile(
        &self,
        ctx: RequestContext,
        user_id: UserId,
    ) -> Result<DateTime<Utc>, Error> {
        let now = self.clock.utc();
        self.within(&ctx, self.repository.delete(&user_id, now))
            .await
            .map_err(|_| deadline_error())?
            .map_err(|err| map_repository_error(&err))?;
        self.invalidate_cache(&ctx, &user_id).await;
        self.publish(ProfileEvent::ProfileDeleted {
            trace_id: ctx.trace_id(),
            user_id,
            deleted_at: now,
        })
        .await;
        Ok(now)
    }
}

#[async_trait]
impl ProfileQuery for ProfileService {
    async fn get_profile(&self, ctx: RequestContext, user_id: UserId) -> Result<Profile, Error> {
        let observed = match self.lookup_cache(&ctx, &user_id).await? {
            CacheRead::Hit(profile) => return Ok(profile),
            CacheRead::Miss(generation) => Some(generation),
            CacheRead::Unavailable => None,
        };
        let profile = self
            .find_stored(&ctx, &user_id)
            .await?
            .ok_or_else(|| profile_missing(&user_id))?;
        if let Some(generation) = observed {
            self.fill_cache(&ctx, &profile, generation).await;
        }
        Ok(profile)
    }
}

fn deadline_error() -> Error {
    Error::cancelled("request deadline exceeded")
}

fn profile_exists(user_id: &UserId) -> Error {
    Error::already_exists("profile already exists")
        .with_details(json!({ "userId": user_id.to_string() }))
}

fn profile_missing(user_id: &UserId) -> Error {
    Error::not_found("profile not found").with_details(json!({ "userId": user_id.to_string() }))
}

/// Translate repository failures into transport-neutral domain errors.
pub fn map_repository_error(err: &ProfileRepositoryError) -> Error {
    match err {
        ProfileRepositoryError::NotFound { user_id } => {
            Error::not_found("profile not found").with_details(json!({ "userId": user_id }))
        }
        ProfileRepositoryError::UserConflict { user_id } => {
            Error::already_exists("profile already exists")
                .with_details(json!({ "userId": user_id }))
        }
        ProfileRepositoryError::Connection { message } => {
            error!(error = %message, "profile repository unavailable");
            Error::service_unavailable("profile store unavailable")
        }
        ProfileRepositoryError::Query { message } => {
            error!(error = %message, "profile repository query failed");
            Error::internal(format!("profile repository query failed: {message}"))
        }
        ProfileRepositoryError::NicknameConflict { nickname } => {
            Error::internal(format!("unexpected nickname conflict outside creation: {nickname}"))
        }
    }
}

#[cfg(test)]
#[path = "profile_service_tests.rs"]
mod tests;
