//! Port interface for the optional profile lookup cache.
//!
//! Each user's cache slot carries a generation that every invalidation
//! advances. A miss reports the generation it observed and a later fill only
//! lands while that generation is still current, so a read that raced an
//! update or delete can never put the superseded profile back.
use async_trait::async_trait;

use crate::domain::{Profile, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors surfaced by profile cache adapters.
    pub enum ProfileCacheError {
        /// Cache backend is unavailable or timing out.
        Backend { message: String } => "profile cache backend failure: {message}",
        /// Serialisation or deserialisation of cached content failed.
        Serialization { message: String } => "profile cache serialisation failed: {message}",
    }
}

/// Invalidation counter of one user's cache slot.
///
/// # Examples
/// ```
/// use profile_service::domain::ports::CacheGeneration;
///
/// let first = CacheGeneration::default();
/// assert_eq!(first.get(), 0);
/// assert_eq!(first.next(), CacheGeneration::new(1));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CacheGeneration(u64);

impl CacheGeneration {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// Generation following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

/// Result of a cache read.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    /// The cached profile.
    Hit(Profile),
    /// Nothing cached; fills must present this generation.
    Miss(CacheGeneration),
}

/// Read-through cache of profiles keyed by user.
///
/// Entries are invalidated on mutation rather than patched in place.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileCache: Send + Sync {
    /// Read a cached profile, or the slot generation on a miss.
    async fn get(&self, user_id: &UserId) -> Result<CacheLookup, ProfileCacheError>;

    /// Store `profile` unless the slot was invalidated after `observed`.
    ///
    /// Returns whether the entry was written.
    async fn fill(
        &self,
        profile: &Profile,
        observed: CacheGeneration,
    ) -> Result<bool, ProfileCacheError>;

    /// Drop any cached entry for the user and advance its generation.
    async fn invalidate(&self, user_id: &UserId) -> Result<(), ProfileCacheError>;
}
