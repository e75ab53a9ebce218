//! Process-local profile cache.
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::ports::{CacheGeneration, CacheLookup, ProfileCache, ProfileCacheError};
use crate::domain::{Profile, UserId};

#[derive(Debug, Default)]
struct Slots {
    entries: HashMap<UserId, Profile>,
    generations: HashMap<UserId, CacheGeneration>,
}

impl Slots {
    fn generation(&self, user_id: &UserId) -> CacheGeneration {
        self.generations.get(user_id).copied().unwrap_or_default()
    }
}

/// Unbounded map-backed [`ProfileCache`] without expiry.
#[derive(Debug, Default)]
pub struct InMemoryProfileCache {
    slots: Mutex<Slots>,
}

impl InMemoryProfileCache {
    /// Whether an entry is cached for the user.
    pub fn contains(&self, user_id: &UserId) -> bool {
        self.lock().entries.contains_key(user_id)
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl ProfileCache for InMemoryProfileCache {
    async fn get(&self, user_id: &UserId) -> Result<CacheLookup, ProfileCacheError> {
        let slots = self.lock();
        Ok(match slots.entries.get(user_id) {
            Some(profile) => CacheLookup::Hit(profile.clone()),
            None => CacheLookup::Miss(slots.generation(user_id)),
        })
    }

    async fn fill(
        &self,
        profile: &Profile,
        observed: CacheGeneration,
    ) -> Result<bool, ProfileCacheError> {
        let mut slots = self.lock();
        if slots.generation(profile.user_id()) != observed {
            return Ok(false);
        }
        slots.entries.insert(*profile.user_id(), profile.clone());
        Ok(true)
    }

    async fn invalidate(&self, user_id: &UserId) -> Result<(), ProfileCacheError> {
        let mut slots = self.lock();
        slots.entries.remove(user_id);
        let next = slots.generation(user_id).next();
        slots.generations.insert(*user_id, next);
        Ok(())
    }
}
