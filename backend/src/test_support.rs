//! Shared test doubles for unit and integration tests.
//!
//! Exposed publicly so the suites under `tests/` can drive the orchestrator
//! with a controllable clock and observe published events.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use mockable::Clock;

use crate::domain::{ProfileEvent, RetryJitter, RetrySleeper};
use crate::domain::ports::{ProfileEventPublishError, ProfileEventPublisher};

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    /// Clock pinned to 2024-01-01T00:00:00Z.
    pub fn fixed() -> Self {
        match Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single() {
            Some(now) => Self::new(now),
            None => panic!("fixed clock timestamp must be valid"),
        }
    }

    pub fn advance(&self, delta: Duration) {
        let delta = match TimeDelta::from_std(delta) {
            Ok(delta) => delta,
            Err(error) => {
                panic!("failed to convert Duration to TimeDelta: {error}; delta={delta:?}")
            }
        };
        *self.lock_clock() += delta;
    }

    fn lock_clock(&self) -> MutexGuard<'_, DateTime<Utc>> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("clock mutex"),
        }
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.lock_clock()
    }
}

/// Publisher that remembers every event it receives.
#[derive(Debug, Default)]
pub struct RecordingProfileEventPublisher {
    events: Mutex<Vec<ProfileEvent>>,
    fail: bool,
}

impl RecordingProfileEventPublisher {
    /// Publisher that records and then reports a backend failure.
    pub fn failing() -> Self {
        Self {
            events: Mutex::default(),
            fail: true,
        }
    }

    /// Snapshot of the recorded events in publication order.
    pub fn events(&self) -> Vec<ProfileEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Labels of the recorded events in publication order.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events().iter().map(ProfileEvent::kind).collect()
    }
}

#[async_trait]
impl ProfileEventPublisher for RecordingProfileEventPublisher {
    async fn publish(&self, event: &ProfileEvent) -> Result<(), ProfileEventPublishError> {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
        if self.fail {
            return Err(ProfileEventPublishError::backend("sink offline"));
        }
        Ok(())
    }
}

/// Sleeper that records requested delays and returns immediately.
#[derive(Debug, Default)]
pub struct RecordingSleeper(Mutex<Vec<Duration>>);

impl RecordingSleeper {
    /// Requested delays in call order.
    pub fn delays(&self) -> Vec<Duration> {
        match self.0.lock() {
            Ok(delays) => delays.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl RetrySleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        match self.0.lock() {
            Ok(mut delays) => delays.push(duration),
            Err(poisoned) => poisoned.into_inner().push(duration),
        }
    }
}

/// Jitter that returns the base delay unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoJitter;

impl RetryJitter for NoJitter {
    fn jittered_delay(&self, base: Duration, _attempt: u32, _now: DateTime<Utc>) -> Duration {
        base
    }
}
