//! Profile data model.
//!
//! A profile links an upstream identity (`UserId`) to a unique nickname and
//! an optional email address. Identifiers are supplied by callers and never
//! minted here; nicknames are drawn by the orchestrator at creation time.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum accepted email length (RFC 5321 path limit).
pub const EMAIL_MAX: usize = 254;
/// Maximum accepted nickname length, prefix included.
pub const NICKNAME_MAX: usize = 64;

/// Validation errors returned by the profile value constructors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileValidationError {
    /// The user id was empty.
    #[error("user id must not be empty")]
    EmptyUserId,
    /// The user id is not a canonical UUID.
    #[error("user id must be a valid UUID")]
    InvalidUserId,
    /// The email was empty.
    #[error("email must not be empty")]
    EmptyEmail,
    /// The email exceeds [`EMAIL_MAX`] characters.
    #[error("email must be at most {max} characters")]
    EmailTooLong { max: usize },
    /// The email lacks a local part or domain.
    #[error("email must contain a local part and a domain separated by '@'")]
    InvalidEmail,
    /// The nickname was empty.
    #[error("nickname must not be empty")]
    EmptyNickname,
    /// The nickname exceeds [`NICKNAME_MAX`] characters.
    #[error("nickname must be at most {max} characters")]
    NicknameTooLong { max: usize },
    /// The nickname holds characters outside `[A-Za-z0-9_]`.
    #[error("nickname may only contain letters, numbers, or underscores")]
    NicknameInvalidCharacters,
}

/// Stable identity assigned by the upstream account system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(Uuid);

impl UserId {
    /// Validate and construct a [`UserId`] from borrowed input.
    pub fn new(id: impl AsRef<str>) -> Result<Self, ProfileValidationError> {
        let raw = id.as_ref();
        if raw.is_empty() {
            return Err(ProfileValidationError::EmptyUserId);
        }
        if raw.trim() != raw {
            return Err(ProfileValidationError::InvalidUserId);
        }
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|_| ProfileValidationError::InvalidUserId)
    }

    /// Wrap an already parsed UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.0.to_string()
    }
}

impl TryFrom<String> for UserId {
    type Error = ProfileValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Contact email attached to a profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Validate and construct an [`Email`].
    ///
    /// Surrounding whitespace is trimmed before validation.
    pub fn new(email: impl Into<String>) -> Result<Self, ProfileValidationError> {
        let email = email.into();
        let trimmed = email.trim();
        if trimmed.is_empty() {
            return Err(ProfileValidationError::EmptyEmail);
        }
        if trimmed.chars().count() > EMAIL_MAX {
            return Err(ProfileValidationError::EmailTooLong { max: EMAIL_MAX });
        }
        let Some((local, domain)) = trimmed.split_once('@') else {
            return Err(ProfileValidationError::InvalidEmail);
        };
        let domain_ok = domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
            && !domain.contains('@');
        if local.is_empty() || !domain_ok || trimmed.chars().any(char::is_whitespace) {
            return Err(ProfileValidationError::InvalidEmail);
        }
        Ok(Self(trimmed.to_owned()))
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<Email> for String {
    fn from(value: Email) -> Self {
        value.0
    }
}

impl TryFrom<String> for Email {
    type Error = ProfileValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Publicly visible, globally unique handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Nickname(String);

impl Nickname {
    /// Validate and construct a [`Nickname`].
    pub fn new(nickname: impl Into<String>) -> Result<Self, ProfileValidationError> {
        let nickname = nickname.into();
        if nickname.is_empty() {
            return Err(ProfileValidationError::EmptyNickname);
        }
        if nickname.chars().count() > NICKNAME_MAX {
            return Err(ProfileValidationError::NicknameTooLong { max: NICKNAME_MAX });
        }
        if !nickname
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ProfileValidationError::NicknameInvalidCharacters);
        }
        Ok(Self(nickname))
    }

    /// Wrap a value the caller has already shown to satisfy [`Nickname::new`].
    pub(crate) fn from_validated(nickname: String) -> Self {
        debug_assert!(Self::new(nickname.as_str()).is_ok(), "{nickname}");
        Self(nickname)
    }
}

impl AsRef<str> for Nickname {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Nickname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<Nickname> for String {
    fn from(value: Nickname) -> Self {
        value.0
    }
}

impl TryFrom<String> for Nickname {
    type Error = ProfileValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Stored profile record.
///
/// ## Invariants
/// - `user_id` is supplied by the caller and never changes.
/// - `nickname` is unique across all profiles, enforced by the repository.
/// - `updated_at` is never earlier than `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    user_id: UserId,
    nickname: Nickname,
    email: Option<Email>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Profile {
    /// Assemble a profile from validated components.
    pub fn new(
        user_id: UserId,
        nickname: Nickname,
        email: Option<Email>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            nickname,
            email,
            created_at,
            updated_at,
        }
    }

    /// Identity the profile belongs to.
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Unique nickname drawn at creation.
    pub fn nickname(&self) -> &Nickname {
        &self.nickname
    }

    /// Optional contact email.
    pub fn email(&self) -> Option<&Email> {
        self.email.as_ref()
    }

    /// Creation timestamp.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Last modification timestamp.
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Return a copy with `patch` applied and `updated_at` moved to `now`.
    ///
    /// Fields the patch leaves as [`FieldUpdate::Keep`] are carried over
    /// unchanged.
    #[must_use]
    pub fn patched(&self, patch: &ProfilePatch, now: DateTime<Utc>) -> Self {
        Self {
            email: patch.email.clone().apply(self.email.clone()),
            updated_at: now.max(self.created_at),
            ..self.clone()
        }
    }
}

/// Insert payload for a profile whose nickname has just been drawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProfile {
    /// Identity supplied by the caller.
    pub user_id: UserId,
    /// Candidate nickname for this attempt.
    pub nickname: Nickname,
    /// Optional contact email.
    pub email: Option<Email>,
}

/// Tri-state update for a single optional field.
///
/// `Keep` leaves the stored value untouched, `Set` replaces it and `Clear`
/// removes it. This keeps "absent from the request" distinct from "explicitly
/// emptied".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldUpdate<T> {
    /// Leave the stored value as is.
    #[default]
    Keep,
    /// Replace the stored value.
    Set(T),
    /// Remove the stored value.
    Clear,
}

impl<T> FieldUpdate<T> {
    /// Whether this update leaves the field untouched.
    pub fn is_keep(&self) -> bool {
        matches!(self, Self::Keep)
    }

    /// Resolve the new field value given the currently stored one.
    pub fn apply(self, current: Option<T>) -> Option<T> {
        match self {
            Self::Keep => current,
            Self::Set(value) => Some(value),
            Self::Clear => None,
        }
    }
}

/// Partial update applied to an existing profile.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProfilePatch {
    /// Email change, if any.
    pub email: FieldUpdate<Email>,
}

impl ProfilePatch {
    /// Build a patch that only sets the email.
    pub fn set_email(email: Email) -> Self {
        Self {
            email: FieldUpdate::Set(email),
        }
    }

    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.email.is_keep()
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use chrono::TimeZone;
    use rstest::{fixture, rstest};

    #[fixture]
    fn stored_profile() -> Profile {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().expect("valid time");
        Profile::new(
            UserId::new("11111111-1111-1111-1111-111111111111").expect("valid id"),
            Nickname::new("user_Ab3dE9xQ").expect("valid nickname"),
            Some(Email::new("ada@example.com").expect("valid email")),
            created,
            created,
        )
    }

    #[rstest]
    #[case("", ProfileValidationError::EmptyUserId)]
    #[case("not-a-uuid", ProfileValidationError::InvalidUserId)]
    #[case(" 11111111-1111-1111-1111-111111111111", ProfileValidationError::InvalidUserId)]
    fn user_id_rejects_malformed_input(#[case] raw: &str, #[case] expected: ProfileValidationError) {
        assert_eq!(UserId::new(raw), Err(expected));
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    fn email_rejects_blank(#[case] raw: &str) {
        assert_eq!(Email::new(raw), Err(ProfileValidationError::EmptyEmail));
    }

    #[rstest]
    #[case("no-at-sign.example.com")]
    #[case("@example.com")]
    #[case("ada@localhost")]
    #[case("ada@example.")]
    #[case("a da@example.com")]
    #[case("ada@@example.com")]
    fn email_rejects_malformed(#[case] raw: &str) {
        assert_eq!(Email::new(raw), Err(ProfileValidationError::InvalidEmail));
    }

    #[rstest]
    fn email_trims_surrounding_whitespace() {
        let email = Email::new("  ada@example.com ").expect("valid email");
        assert_eq!(email.as_ref(), "ada@example.com");
    }

    #[rstest]
    fn email_rejects_overlong_values() {
        let raw = format!("{}@example.com", "a".repeat(EMAIL_MAX));
        assert_eq!(
            Email::new(raw),
            Err(ProfileValidationError::EmailTooLong { max: EMAIL_MAX })
        );
    }

    #[rstest]
    #[case("", ProfileValidationError::EmptyNickname)]
    #[case("user-1", ProfileValidationError::NicknameInvalidCharacters)]
    #[case("user 1", ProfileValidationError::NicknameInvalidCharacters)]
    fn nickname_rejects_invalid_input(#[case] raw: &str, #[case] expected: ProfileValidationError) {
        assert_eq!(Nickname::new(raw), Err(expected));
    }

    #[rstest]
    fn keep_leaves_value_untouched() {
        assert_eq!(FieldUpdate::<u8>::Keep.apply(Some(1)), Some(1));
        assert_eq!(FieldUpdate::Set(2).apply(Some(1)), Some(2));
        assert_eq!(FieldUpdate::<u8>::Clear.apply(Some(1)), None);
    }

    #[rstest]
    fn patch_changes_only_email(stored_profile: Profile) {
        let now = stored_profile.created_at() + chrono::Duration::minutes(5);
        let patch = ProfilePatch::set_email(Email::new("grace@example.com").expect("valid email"));

        let updated = stored_profile.patched(&patch, now);

        assert_eq!(updated.email().map(AsRef::as_ref), Some("grace@example.com"));
        assert_eq!(updated.nickname(), stored_profile.nickname());
        assert_eq!(updated.user_id(), stored_profile.user_id());
        assert_eq!(updated.created_at(), stored_profile.created_at());
        assert_eq!(updated.updated_at(), now);
    }

    #[rstest]
    fn clear_patch_removes_email(stored_profile: Profile) {
        let patch = ProfilePatch {
            email: FieldUpdate::Clear,
        };
        let updated = stored_profile.patched(&patch, stored_profile.created_at());
        assert!(updated.email().is_none());
    }

    #[rstest]
    fn profile_serialises_camel_case(stored_profile: Profile) {
        let value = serde_json::to_value(&stored_profile).expect("serialise profile");
        assert_eq!(value["userId"], "11111111-1111-1111-1111-111111111111");
        assert_eq!(value["nickname"], "user_Ab3dE9xQ");
        let decoded: Profile = serde_json::from_value(value).expect("deserialise profile");
        assert_eq!(decoded, stored_profile);
    }
}
