//! Port abstraction for durable profile storage.
//!
//! Adapters enforce nickname uniqueness and report which uniqueness rule an
//! insert tripped, so the orchestrator can retry nickname collisions while
//! treating a duplicate identity as final.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{NewProfile, Profile, ProfilePatch, UserId};

use super::define_port_error;

define_port_error! {
    /// Persistence errors raised by profile repository adapters.
    pub enum ProfileRepositoryError {
        /// Another profile already holds the candidate nickname.
        NicknameConflict { nickname: String } =>
            "nickname already taken: {nickname}",
        /// A profile (live or deleted) already exists for the user.
        UserConflict { user_id: String } =>
            "profile already exists for user {user_id}",
        /// No live profile exists for the user.
        NotFound { user_id: String } =>
            "no profile for user {user_id}",
        /// Repository connection could not be established.
        Connection { message: String } =>
            "profile repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "profile repository query failed: {message}",
    }
}

/// How `delete` removes a profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeletionMode {
    /// Stamp `deleted_at` and keep the row, so the nickname stays reserved.
    #[default]
    Soft,
    /// Erase the profile data and release the nickname, keeping only a
    /// user-id tombstone so the user cannot be recreated.
    Hard,
}

/// Error raised when parsing an unknown deletion mode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("deletion mode must be `soft` or `hard`, got `{0}`")]
pub struct DeletionModeParseError(pub String);

impl std::str::FromStr for DeletionMode {
    type Err = DeletionModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "soft" => Ok(Self::Soft),
            "hard" => Ok(Self::Hard),
            _ => Err(DeletionModeParseError(s.to_owned())),
        }
    }
}

/// Durable CRUD store for profiles keyed by [`UserId`].
///
/// # Contract
///
/// - `insert` fails with [`ProfileRepositoryError::NicknameConflict`] when
///   the nickname is taken and [`ProfileRepositoryError::UserConflict`] when
///   the user already has a profile, including a deleted one in either
///   [`DeletionMode`].
/// - Deleted profiles are invisible to `find_by_user_id`, `update` and
///   `delete`.
/// - Timestamps passed in are stored verbatim so callers control the clock.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Insert a new profile created at `at`.
    async fn insert(
        &self,
        profile: &NewProfile,
        at: DateTime<Utc>,
    ) -> Result<Profile, ProfileRepositoryError>;

    /// Fetch the live profile for a user.
    async fn find_by_user_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Profile>, ProfileRepositoryError>;

    /// Apply `patch` to the live profile and return the stored result.
    async fn update(
        &self,
        user_id: &UserId,
        patch: &ProfilePatch,
        at: DateTime<Utc>,
    ) -> Result<Profile, ProfileRepositoryError>;

    /// Remove the live profile for a user.
    async fn delete(&self, user_id: &UserId, at: DateTime<Utc>)
    -> Result<(), ProfileRepositoryError>;
}
