//! Lifecycle events flowing into and out of the profile service.
//!
//! Inbound [`UserLifecycleEvent`]s come from the upstream identity system and
//! drive profile initialisation and removal. Outbound [`ProfileEvent`]s tell
//! other subsystems that a profile changed; they are published best effort.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::profile::{Email, Profile, UserId};
use super::TraceId;

/// Upstream user lifecycle notification.
///
/// Payloads are JSON objects tagged by `type`:
///
/// ```json
/// {"type": "user_created", "userId": "…", "email": "ada@example.com"}
/// {"type": "user_deleted", "userId": "…"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UserLifecycleEvent {
    /// A new account was registered upstream.
    #[serde(rename_all = "camelCase")]
    UserCreated {
        user_id: UserId,
        #[serde(default, deserialize_with = "deserialize_optional_email")]
        email: Option<Email>,
    },
    /// An account was removed upstream.
    #[serde(rename_all = "camelCase")]
    UserDeleted { user_id: UserId },
}

impl UserLifecycleEvent {
    /// Decode a raw payload.
    pub fn from_slice(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    /// Identity the event refers to.
    pub fn user_id(&self) -> &UserId {
        match self {
            Self::UserCreated { user_id, .. } | Self::UserDeleted { user_id } => user_id,
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UserCreated { .. } => "user_created",
            Self::UserDeleted { .. } => "user_deleted",
        }
    }
}

// Upstream producers send an empty string when no email was collected.
fn deserialize_optional_email<'de, D>(deserializer: D) -> Result<Option<Email>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => Email::new(value).map(Some).map_err(serde::de::Error::custom),
    }
}

/// Outbound notification describing a completed profile mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProfileEvent {
    /// A profile was created.
    ProfileCreated {
        #[serde(rename = "traceId", serialize_with = "serialize_trace_id")]
        trace_id: TraceId,
        profile: Profile,
    },
    /// A profile was updated.
    ProfileUpdated {
        #[serde(rename = "traceId", serialize_with = "serialize_trace_id")]
        trace_id: TraceId,
        profile: Profile,
    },
    /// A profile was deleted.
    ProfileDeleted {
        #[serde(rename = "traceId", serialize_with = "serialize_trace_id")]
        trace_id: TraceId,
        #[serde(rename = "userId")]
        user_id: UserId,
        #[serde(rename = "deletedAt")]
        deleted_at: DateTime<Utc>,
    },
}

fn serialize_trace_id<S>(trace_id: &TraceId, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_str(trace_id)
}

impl ProfileEvent {
    /// Identity the event refers to.
    pub fn user_id(&self) -> &UserId {
        match self {
            Self::ProfileCreated { profile, .. } | Self::ProfileUpdated { profile, .. } => {
                profile.user_id()
            }
            Self::ProfileDeleted { user_id, .. } => user_id,
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ProfileCreated { .. } => "profile_created",
            Self::ProfileUpdated { .. } => "profile_updated",
            Self::ProfileDeleted { .. } => "profile_deleted",
        }
    }
}
