//! PostgreSQL-backed `ProfileRepository` implementation using Diesel ORM.
//!
//! Insert conflicts are classified by constraint name so the orchestrator can
//! tell a nickname collision (retryable) from a duplicate identity (final).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::Timestamptz;
use diesel_async::RunQueryDsl;
use tracing::{debug, warn};

use crate::domain::ports::{DeletionMode, ProfileRepository, ProfileRepositoryError};
use crate::domain::{Email, FieldUpdate, NewProfile, Nickname, Profile, ProfilePatch, UserId};

use super::models::{NewProfileRow, ProfileChangeset, ProfileRow};
use super::pool::{DbPool, PoolError};
use super::schema::profiles;

/// Primary-key constraint on `profiles.user_id`.
pub const USER_ID_CONSTRAINT: &str = "profiles_pkey";
/// Unique constraint on `profiles.nickname`.
pub const NICKNAME_CONSTRAINT: &str = "profiles_nickname_key";

diesel::define_sql_function! {
    /// PostgreSQL `GREATEST` over two timestamps.
    fn greatest(a: Timestamptz, b: Timestamptz) -> Timestamptz;
}

/// Diesel-backed implementation of the `ProfileRepository` port.
#[derive(Clone)]
pub struct DieselProfileRepository {
    pool: DbPool,
    deletion_mode: DeletionMode,
}

impl DieselProfileRepository {
    /// Create a repository over `pool` with the given deletion semantics.
    pub fn new(pool: DbPool, deletion_mode: DeletionMode) -> Self {
        Self {
            pool,
            deletion_mode,
        }
    }
}

fn map_pool_error(error: PoolError) -> ProfileRepositoryError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            ProfileRepositoryError::connection(message)
        }
    }
}

/// Map Diesel errors to repository errors, classifying unique violations.
///
/// `user_id` and `nickname` describe the row being written so conflicts can
/// name the clashing value.
fn map_diesel_error(
    error: DieselError,
    user_id: &UserId,
    nickname: Option<&str>,
) -> ProfileRepositoryError {
    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(&error),
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            classify_unique_violation(info.constraint_name(), user_id, nickname)
        }
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            ProfileRepositoryError::connection("database connection error")
        }
        DieselError::NotFound => ProfileRepositoryError::not_found(user_id.to_string()),
        DieselError::QueryBuilderError(_) => ProfileRepositoryError::query("database query error"),
        _ => ProfileRepositoryError::query("database error"),
    }
}

fn classify_unique_violation(
    constraint: Option<&str>,
    user_id: &UserId,
    nickname: Option<&str>,
) -> ProfileRepositoryError {
    match (constraint, nickname) {
        (Some(USER_ID_CONSTRAINT), _) => ProfileRepositoryError::user_conflict(user_id.to_string()),
        (Some(NICKNAME_CONSTRAINT), Some(nickname)) => {
            ProfileRepositoryError::nickname_conflict(nickname)
        }
        (other, _) => {
            warn!(
                constraint = ?other,
                "unrecognised unique violation on profiles; treating as query failure"
            );
            ProfileRepositoryError::query("unique constraint violation")
        }
    }
}

fn row_to_profile(row: ProfileRow) -> Result<Profile, ProfileRepositoryError> {
    let raw_nickname = row
        .nickname
        .ok_or_else(|| ProfileRepositoryError::query("live profile has no nickname"))?;
    let nickname = Nickname::new(raw_nickname).map_err(|err| {
        ProfileRepositoryError::query(format!("stored nickname is invalid: {err}"))
    })?;
    let email = row
        .email
        .map(Email::new)
        .transpose()
        .map_err(|err| ProfileRepositoryError::query(format!("stored email is invalid: {err}")))?;
    Ok(Profile::new(
        UserId::from_uuid(row.user_id),
        nickname,
        email,
        row.created_at,
        row.updated_at,
    ))
}

fn changeset_for(patch: &ProfilePatch) -> ProfileChangeset<'_> {
    let email = match &patch.email {
        FieldUpdate::Keep => None,
        FieldUpdate::Set(email) => Some(Some(email.as_ref())),
        FieldUpdate::Clear => Some(None),
    };
    ProfileChangeset { email }
}

#[async_trait]
impl ProfileRepository for DieselProfileRepository {
    async fn insert(
        &self,
        profile: &NewProfile,
        at: DateTime<Utc>,
    ) -> Result<Profile, ProfileRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = NewProfileRow {
            user_id: *profile.user_id.as_uuid(),
            nickname: Some(profile.nickname.as_ref()),
            email: profile.email.as_ref().map(AsRef::as_ref),
            created_at: at,
            updated_at: at,
        };

        let stored: ProfileRow = diesel::insert_into(profiles::table)
            .values(&row)
            .returning(ProfileRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(|err| {
                map_diesel_error(err, &profile.user_id, Some(profile.nickname.as_ref()))
            })?;
        row_to_profile(stored)
    }

    async fn find_by_user_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Profile>, ProfileRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row: Option<ProfileRow> = profiles::table
            .filter(profiles::user_id.eq(user_id.as_uuid()))
            .filter(profiles::deleted_at.is_null())
            .select(ProfileRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|err| map_diesel_error(err, user_id, None))?;

        row.map(row_to_profile).transpose()
    }

    async fn update(
        &self,
        user_id: &UserId,
        patch: &ProfilePatch,
        at: DateTime<Utc>,
    ) -> Result<Profile, ProfileRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let changeset = changeset_for(patch);

        let row: Option<ProfileRow> = diesel::update(
            profiles::table
                .filter(profiles::user_id.eq(user_id.as_uuid()))
                .filter(profiles::deleted_at.is_null()),
        )
        // Clock skew between instances must not trip the
        // `profiles_updated_after_created` check.
        .set((
            &changeset,
            profiles::updated_at.eq(greatest(profiles::created_at, at)),
        ))
        .returning(ProfileRow::as_returning())
        .get_result(&mut conn)
        .await
        .optional()
        .map_err(|err| map_diesel_error(err, user_id, None))?;

        match row {
            Some(row) => row_to_profile(row),
            None => Err(ProfileRepositoryError::not_found(user_id.to_string())),
        }
    }

    async fn delete(
        &self,
        user_id: &UserId,
        at: DateTime<Utc>,
    ) -> Result<(), ProfileRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let live = profiles::table
            .filter(profiles::user_id.eq(user_id.as_uuid()))
            .filter(profiles::deleted_at.is_null());

        let affected = match self.deletion_mode {
            DeletionMode::Soft => {
                diesel::update(live)
                    .set(profiles::deleted_at.eq(Some(at)))
                    .execute(&mut conn)
                    .await
            }
            DeletionMode::Hard => {
                diesel::update(live)
                    .set((
                        profiles::deleted_at.eq(Some(at)),
                        profiles::nickname.eq(None::<String>),
                        profiles::email.eq(None::<String>),
                    ))
                    .execute(&mut conn)
                    .await
            }
        }
        .map_err(|err| map_diesel_error(err, user_id, None))?;

        if affected == 0 {
            return Err(ProfileRepositoryError::not_found(user_id.to_string()));
        }
        Ok(())
    }
}
