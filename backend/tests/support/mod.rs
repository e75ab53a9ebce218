//! Shared builders for the integration suites.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockable::Clock;
use profile_service::domain::ports::{DeletionMode, ProfileRepository, ProfileRepositoryError};
use profile_service::domain::{
    MaxNicknameRetries, NewProfile, Nickname, NicknameGenerator, Profile, ProfilePatch,
    ProfileService, RetrySleeper, UserId,
};
use profile_service::outbound::memory::InMemoryProfileRepository;
use profile_service::test_support::{MutableClock, RecordingProfileEventPublisher};

/// Generator replaying a fixed list of nicknames, then repeating the last.
pub struct ScriptedNicknames {
    script: Mutex<VecDeque<String>>,
    last: Mutex<String>,
    calls: AtomicUsize,
}

impl ScriptedNicknames {
    pub fn new(script: &[&str]) -> Self {
        Self {
            script: Mutex::new(script.iter().map(|s| (*s).to_owned()).collect()),
            last: Mutex::new(script.last().copied().unwrap_or("user_fallback").to_owned()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl NicknameGenerator for ScriptedNicknames {
    fn generate(&self) -> Nickname {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().expect("script lock").pop_front();
        let value = match next {
            Some(value) => {
                *self.last.lock().expect("last lock") = value.clone();
                value
            }
            None => self.last.lock().expect("last lock").clone(),
        };
        Nickname::new(value).expect("scripted nickname is valid")
    }
}

/// Repository whose first `failures` inserts report a lost connection.
pub struct FlakyRepository {
    inner: InMemoryProfileRepository,
    failures: AtomicUsize,
}

impl FlakyRepository {
    pub fn new(failures: usize) -> Self {
        Self {
            inner: InMemoryProfileRepository::new(DeletionMode::Soft),
            failures: AtomicUsize::new(failures),
        }
    }

    pub fn live_count(&self) -> usize {
        self.inner.live_count()
    }
}

#[async_trait]
impl ProfileRepository for FlakyRepository {
    async fn insert(
        &self,
        profile: &NewProfile,
        at: DateTime<Utc>,
    ) -> Result<Profile, ProfileRepositoryError> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ProfileRepositoryError::connection("connection reset"));
        }
        self.inner.insert(profile, at).await
    }

    async fn find_by_user_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Profile>, ProfileRepositoryError> {
        self.inner.find_by_user_id(user_id).await
    }

    async fn update(
        &self,
        user_id: &UserId,
        patch: &ProfilePatch,
        at: DateTime<Utc>,
    ) -> Result<Profile, ProfileRepositoryError> {
        self.inner.update(user_id, patch, at).await
    }

    async fn delete(&self, user_id: &UserId, at: DateTime<Utc>) -> Result<(), ProfileRepositoryError> {
        self.inner.delete(user_id, at).await
    }
}

/// Repository that reports a lost connection until the clock reaches
/// `recovers_at`.
pub struct OutageRepository {
    inner: InMemoryProfileRepository,
    clock: Arc<MutableClock>,
    recovers_at: DateTime<Utc>,
}

impl OutageRepository {
    pub fn new(clock: Arc<MutableClock>, outage: Duration) -> Self {
        let recovers_at = clock.utc() + chrono::TimeDelta::from_std(outage).expect("outage fits");
        Self {
            inner: InMemoryProfileRepository::new(DeletionMode::Soft),
            clock,
            recovers_at,
        }
    }

    pub fn live_count(&self) -> usize {
        self.inner.live_count()
    }

    fn check(&self) -> Result<(), ProfileRepositoryError> {
        if self.clock.utc() < self.recovers_at {
            return Err(ProfileRepositoryError::connection("database restarting"));
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileRepository for OutageRepository {
    async fn insert(
        &self,
        profile: &NewProfile,
        at: DateTime<Utc>,
    ) -> Result<Profile, ProfileRepositoryError> {
        self.check()?;
        self.inner.insert(profile, at).await
    }

    async fn find_by_user_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Profile>, ProfileRepositoryError> {
        self.check()?;
        self.inner.find_by_user_id(user_id).await
    }

    async fn update(
        &self,
        user_id: &UserId,
        patch: &ProfilePatch,
        at: DateTime<Utc>,
    ) -> Result<Profile, ProfileRepositoryError> {
        self.check()?;
        self.inner.update(user_id, patch, at).await
    }

    async fn delete(&self, user_id: &UserId, at: DateTime<Utc>) -> Result<(), ProfileRepositoryError> {
        self.check()?;
        self.inner.delete(user_id, at).await
    }
}

/// Sleeper that moves a [`MutableClock`] forward instead of waiting.
pub struct ClockAdvancingSleeper(pub Arc<MutableClock>);

#[async_trait]
impl RetrySleeper for ClockAdvancingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.0.advance(duration);
    }
}

/// Collaborators of a service under test, kept for later inspection.
pub struct Harness {
    pub service: Arc<ProfileService>,
    pub clock: Arc<MutableClock>,
    pub events: Arc<RecordingProfileEventPublisher>,
    pub nicknames: Arc<ScriptedNicknames>,
}

pub fn harness(
    repository: Arc<dyn ProfileRepository>,
    nicknames: ScriptedNicknames,
    max_retries: u32,
) -> Harness {
    let clock = Arc::new(MutableClock::fixed());
    let events = Arc::new(RecordingProfileEventPublisher::default());
    let nicknames = Arc::new(nicknames);
    let service = Arc::new(ProfileService::new(
        repository,
        events.clone(),
        nicknames.clone(),
        clock.clone(),
        MaxNicknameRetries::new(max_retries).expect("valid retry budget"),
    ));
    Harness {
        service,
        clock,
        events,
        nicknames,
    }
}

pub fn user(n: u8) -> UserId {
    UserId::new(format!("00000000-0000-0000-0000-0000000000{n:02}")).expect("valid id")
}
