//! Driving ports consumed by inbound adapters.
//!
//! [`ProfileCommand`] covers mutations and [`ProfileQuery`] covers reads. RPC
//! handlers and the event consumer depend on these traits rather than on the
//! concrete orchestrator.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Email, Error, Profile, ProfilePatch, RequestContext, UserId};

/// Mutating profile operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileCommand: Send + Sync {
    /// Create a profile with a freshly drawn nickname.
    async fn create_profile(
        &self,
        ctx: RequestContext,
        user_id: UserId,
        email: Option<Email>,
    ) -> Result<Profile, Error>;

    /// Apply a partial update.
    async fn update_profile(
        &self,
        ctx: RequestContext,
        user_id: UserId,
        patch: ProfilePatch,
    ) -> Result<Profile, Error>;

    /// Delete a profile and return the deletion time.
    async fn delete_profile(
        &self,
        ctx: RequestContext,
        user_id: UserId,
    ) -> Result<DateTime<Utc>, Error>;
}

/// Read-only profile operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileQuery: Send + Sync {
    /// Fetch a live profile.
    async fn get_profile(&self, ctx: RequestContext, user_id: UserId) -> Result<Profile, Error>;
}
