//! Random nickname generation.
//!
//! Candidates are a fixed prefix followed by `length` symbols drawn from a
//! 62-symbol alphanumeric alphabet. The source of randomness is injected so
//! callers can swap in seeded or adversarial sources; collisions are expected
//! and resolved by the orchestrator's bounded retry loop.

use std::sync::{Arc, Mutex};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::profile::{Nickname, ProfileValidationError};

/// Symbols a generated nickname may contain after its prefix.
pub const NICKNAME_ALPHABET: &[u8; 62] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Smallest accepted random-part length.
pub const NICKNAME_LENGTH_MIN: usize = 3;
/// Largest accepted random-part length.
pub const NICKNAME_LENGTH_MAX: usize = 30;

/// Validated length of the random part of a nickname.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NicknameLength(usize);

/// Error raised when a nickname length falls outside the supported range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("nickname length must be between 3 and 30, got {0}")]
pub struct NicknameLengthError(pub usize);

impl NicknameLength {
    /// Validate a configured length.
    pub fn new(length: usize) -> Result<Self, NicknameLengthError> {
        if (NICKNAME_LENGTH_MIN..=NICKNAME_LENGTH_MAX).contains(&length) {
            Ok(Self(length))
        } else {
            Err(NicknameLengthError(length))
        }
    }

    /// Raw length value.
    pub fn get(self) -> usize {
        self.0
    }
}

/// Smallest accepted attempt budget for nickname generation.
pub const MAX_NICKNAME_RETRIES_MIN: u32 = 1;
/// Largest accepted attempt budget for nickname generation.
pub const MAX_NICKNAME_RETRIES_MAX: u32 = 10;

/// Upper bound on nickname draws per profile creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxNicknameRetries(u32);

/// Error raised when the attempt budget falls outside the supported range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("max nickname retries must be between 1 and 10, got {0}")]
pub struct MaxNicknameRetriesError(pub u32);

impl MaxNicknameRetries {
    /// Validate a configured attempt budget.
    pub fn new(attempts: u32) -> Result<Self, MaxNicknameRetriesError> {
        if (MAX_NICKNAME_RETRIES_MIN..=MAX_NICKNAME_RETRIES_MAX).contains(&attempts) {
            Ok(Self(attempts))
        } else {
            Err(MaxNicknameRetriesError(attempts))
        }
    }

    /// Raw attempt count.
    pub fn get(self) -> u32 {
        self.0
    }
}

/// Source of uniformly distributed indices.
#[cfg_attr(test, mockall::automock)]
pub trait RandomSource: Send + Sync {
    /// Return an index in `0..upper`. `upper` is never zero.
    fn index(&self, upper: usize) -> usize;
}

/// Production source backed by the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngSource;

impl RandomSource for ThreadRngSource {
    fn index(&self, upper: usize) -> usize {
        rand::thread_rng().gen_range(0..upper)
    }
}

/// Deterministic source for reproducible runs.
#[derive(Debug)]
pub struct SeededRandomSource {
    rng: Mutex<SmallRng>,
}

impl SeededRandomSource {
    /// Build a source that replays the same sequence for the same seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(SmallRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandomSource {
    fn index(&self, upper: usize) -> usize {
        match self.rng.lock() {
            Ok(mut rng) => rng.gen_range(0..upper),
            Err(poisoned) => poisoned.into_inner().gen_range(0..upper),
        }
    }
}

/// Produces candidate nicknames for new profiles.
#[cfg_attr(test, mockall::automock)]
pub trait NicknameGenerator: Send + Sync {
    /// Draw a fresh candidate.
    fn generate(&self) -> Nickname;
}

/// Prefix + random alphanumeric nickname generator.
#[derive(Clone)]
pub struct RandomNicknameGenerator {
    prefix: String,
    length: NicknameLength,
    source: Arc<dyn RandomSource>,
}

impl RandomNicknameGenerator {
    /// Build a generator, checking that the prefix can form a valid nickname.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    /// use profile_service::domain::{
    ///     NicknameGenerator, NicknameLength, RandomNicknameGenerator, ThreadRngSource,
    /// };
    ///
    /// let length = NicknameLength::new(8).expect("valid length");
    /// let generator = RandomNicknameGenerator::new("user_", length, Arc::new(ThreadRngSource))
    ///     .expect("valid prefix");
    /// assert_eq!(generator.generate().as_ref().len(), 13);
    /// ```
    pub fn new(
        prefix: impl Into<String>,
        length: NicknameLength,
        source: Arc<dyn RandomSource>,
    ) -> Result<Self, ProfileValidationError> {
        let prefix = prefix.into();
        // A prefix-only sample must already satisfy the nickname rules.
        Nickname::new(format!("{prefix}{}", "a".repeat(length.get())))?;
        Ok(Self {
            prefix,
            length,
            source,
        })
    }

    /// Configured prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Configured random-part length.
    pub fn length(&self) -> NicknameLength {
        self.length
    }

    fn draw(&self) -> String {
        let mut candidate = String::with_capacity(self.prefix.len() + self.length.get());
        candidate.push_str(&self.prefix);
        for _ in 0..self.length.get() {
            let index = self.source.index(NICKNAME_ALPHABET.len()) % NICKNAME_ALPHABET.len();
            candidate.push(char::from(NICKNAME_ALPHABET[index]));
        }
        candidate
    }
}

impl NicknameGenerator for RandomNicknameGenerator {
    fn generate(&self) -> Nickname {
        // `new` validated a same-length sample and the alphabet is alphanumeric.
        Nickname::from_validated(self.draw())
    }
}

impl std::fmt::Debug for RandomNicknameGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomNicknameGenerator")
            .field("prefix", &self.prefix)
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}
