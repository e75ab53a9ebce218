//! Mutex-guarded profile store.
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::ports::{DeletionMode, ProfileRepository, ProfileRepositoryError};
use crate::domain::{NewProfile, Profile, ProfilePatch, UserId};

#[derive(Debug, Clone)]
struct StoredProfile {
    profile: Profile,
    deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct State {
    rows: HashMap<UserId, StoredProfile>,
    nicknames: HashSet<String>,
}

/// In-memory [`ProfileRepository`] enforcing user and nickname uniqueness.
#[derive(Debug, Default)]
pub struct InMemoryProfileRepository {
    state: Mutex<State>,
    deletion_mode: DeletionMode,
}

impl InMemoryProfileRepository {
    /// Empty store with the given deletion semantics.
    pub fn new(deletion_mode: DeletionMode) -> Self {
        Self {
            state: Mutex::default(),
            deletion_mode,
        }
    }

    /// Number of live profiles.
    pub fn live_count(&self) -> usize {
        self.lock()
            .rows
            .values()
            .filter(|row| row.deleted_at.is_none())
            .count()
    }

    /// Whether a live or soft-deleted profile holds `nickname`.
    pub fn nickname_reserved(&self, nickname: &str) -> bool {
        self.lock().nicknames.contains(nickname)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn not_found(user_id: &UserId) -> ProfileRepositoryError {
    ProfileRepositoryError::not_found(user_id.to_string())
}

#[async_trait]
impl ProfileRepository for InMemoryProfileRepository {
    async fn insert(
        &self,
        profile: &NewProfile,
        at: DateTime<Utc>,
    ) -> Result<Profile, ProfileRepositoryError> {
        let mut state = self.lock();
        if state.rows.contains_key(&profile.user_id) {
            return Err(ProfileRepositoryError::user_conflict(
                profile.user_id.to_string(),
            ));
        }
        let nickname = profile.nickname.as_ref();
        if state.nicknames.contains(nickname) {
            return Err(ProfileRepositoryError::nickname_conflict(nickname));
        }
        let stored = Profile::new(
            profile.user_id,
            profile.nickname.clone(),
            profile.email.clone(),
            at,
            at,
        );
        state.nicknames.insert(nickname.to_owned());
        state.rows.insert(
            profile.user_id,
            StoredProfile {
                profile: stored.clone(),
                deleted_at: None,
            },
        );
        Ok(stored)
    }

    async fn find_by_user_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Profile>, ProfileRepositoryError> {
        Ok(self
            .lock()
            .rows
            .get(user_id)
            .filter(|row| row.deleted_at.is_none())
            .map(|row| row.profile.clone()))
    }

    async fn update(
        &self,
        user_id: &UserId,
        patch: &ProfilePatch,
        at: DateTime<Utc>,
    ) -> Result<Profile, ProfileRepositoryError> {
        let mut state = self.lock();
        let row = state
            .rows
            .get_mut(user_id)
            .filter(|row| row.deleted_at.is_none())
            .ok_or_else(|| not_found(user_id))?;
        row.profile = row.profile.patched(patch, at);
        Ok(row.profile.clone())
    }

    async fn delete(
        &self,
        user_id: &UserId,
        at: DateTime<Utc>,
    ) -> Result<(), ProfileRepositoryError> {
        let mut state = self.lock();
        let live = state
            .rows
            .get(user_id)
            .is_some_and(|row| row.deleted_at.is_none());
        if !live {
            return Err(not_found(user_id));
        }
        match self.deletion_mode {
            DeletionMode::Soft => {
                if let Some(row) = state.rows.get_mut(user_id) {
                    row.deleted_at = Some(at);
                }
            }
            DeletionMode::Hard => {
                let released = state.rows.get_mut(user_id).map(|row| {
                    row.deleted_at = Some(at);
                    row.profile.nickname().as_ref().to_owned()
                });
                if let Some(nickname) = released {
                    state.nicknames.remove(&nickname);
                }
            }
        }
        Ok(())
    }
}
