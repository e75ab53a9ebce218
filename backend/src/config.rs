//! Service configuration loaded via OrthoConfig.
//!
//! [`ProfileSettings`] is the raw layer merged from CLI flags, `PROFILE_*`
//! environment variables and configuration files. [`ServiceConfig`] is the
//! validated form the server is built from.

use std::ffi::OsString;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::ports::DeletionMode;
use crate::domain::{MaxNicknameRetries, NicknameLength};

const DEFAULT_HTTP_PORT: u32 = 8080;
const DEFAULT_NICKNAME_LENGTH: usize = 8;
const DEFAULT_MAX_NICKNAME_RETRIES: u32 = 5;
const DEFAULT_NICKNAME_PREFIX: &str = "user_";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_USER_EVENT_TOPIC: &str = "user_event";
const DEFAULT_USER_EVENT_GROUP_ID: &str = "user_event_group";

/// Raw configuration values.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "PROFILE")]
pub struct ProfileSettings {
    /// Deployment environment, `dev` or `prod`.
    pub environment: Option<String>,
    /// PostgreSQL connection string.
    pub database_url: Option<String>,
    /// Redis connection string. Enables the profile cache when present.
    pub redis_url: Option<String>,
    /// Port the RPC server binds on all interfaces.
    pub http_port: Option<u32>,
    /// Random characters appended to the nickname prefix.
    pub nickname_length: Option<usize>,
    /// Nickname draws allowed per profile creation.
    pub max_nickname_retries: Option<u32>,
    /// Fixed prefix of generated nicknames.
    pub nickname_prefix: Option<String>,
    /// Default per-call deadline in milliseconds.
    pub request_timeout_ms: Option<u64>,
    /// Lifetime of cached profiles in seconds.
    pub cache_ttl_secs: Option<u64>,
    /// `soft` keeps the whole row, `hard` keeps only a user-id tombstone.
    pub deletion_mode: Option<String>,
    /// Comma-separated Kafka bootstrap servers. Enables the upstream user
    /// event consumer when present.
    pub user_event_brokers: Option<String>,
    /// Topic carrying user lifecycle events.
    pub user_event_topic: Option<String>,
    /// Consumer group used for offset tracking.
    pub user_event_group_id: Option<String>,
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Local development; storage falls back to memory.
    #[default]
    Dev,
    /// Production; a database is mandatory.
    Prod,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dev" => Ok(Self::Dev),
            "prod" => Ok(Self::Prod),
            other => Err(format!("expected `dev` or `prod`, got `{other}`")),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Dev => "dev",
            Self::Prod => "prod",
        })
    }
}

/// Configuration failures. Each variant names the offending key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Sources could not be read or merged.
    #[error("failed to load configuration: {message}")]
    Load { message: String },
    /// A value was present but failed validation.
    #[error("{key} is invalid: {message}")]
    Invalid { key: &'static str, message: String },
    /// A value required by the environment was absent.
    #[error("{key} is required in {environment}")]
    Missing {
        key: &'static str,
        environment: Environment,
    },
}

impl ConfigError {
    /// Environment variable name for the failing key, if any.
    pub fn key(&self) -> Option<&'static str> {
        match self {
            Self::Load { .. } => None,
            Self::Invalid { key, .. } | Self::Missing { key, .. } => Some(key),
        }
    }

    fn invalid(key: &'static str, message: impl fmt::Display) -> Self {
        Self::Invalid {
            key,
            message: message.to_string(),
        }
    }
}

/// Kafka subscription for upstream user lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEventStreamConfig {
    /// Bootstrap servers.
    pub brokers: Vec<String>,
    /// Subscribed topic.
    pub topic: String,
    /// Consumer group identifier.
    pub group_id: String,
}

/// Validated service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub environment: Environment,
    /// PostgreSQL URL; `None` keeps profiles in memory outside prod.
    pub database_url: Option<String>,
    /// Redis URL; `None` disables the profile cache.
    pub redis_url: Option<String>,
    pub http_port: u16,
    pub nickname_length: NicknameLength,
    pub max_nickname_retries: MaxNicknameRetries,
    pub nickname_prefix: String,
    /// Deadline applied when a caller supplies none.
    pub request_timeout: Duration,
    pub cache_ttl: Duration,
    pub deletion_mode: DeletionMode,
    /// `None` when no broker is configured.
    pub user_events: Option<UserEventStreamConfig>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_owned())
        .filter(|trimmed| !trimmed.is_empty())
}

fn positive(key: &'static str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        return Err(ConfigError::invalid(key, "must be greater than zero"));
    }
    Ok(value)
}

fn user_event_stream(
    settings: &mut ProfileSettings,
) -> Result<Option<UserEventStreamConfig>, ConfigError> {
    let Some(raw) = non_blank(settings.user_event_brokers.take()) else {
        return Ok(None);
    };
    let brokers: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|broker| !broker.is_empty())
        .map(str::to_owned)
        .collect();
    if brokers.is_empty() {
        return Err(ConfigError::invalid(
            "PROFILE_USER_EVENT_BROKERS",
            "must list at least one host:port",
        ));
    }
    let topic = non_blank(settings.user_event_topic.take())
        .unwrap_or_else(|| DEFAULT_USER_EVENT_TOPIC.to_owned());
    let group_id = non_blank(settings.user_event_group_id.take())
        .unwrap_or_else(|| DEFAULT_USER_EVENT_GROUP_ID.to_owned());
    Ok(Some(UserEventStreamConfig {
        brokers,
        topic,
        group_id,
    }))
}

impl ServiceConfig {
    /// Load from process arguments, environment and configuration files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading fails or a value is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_iter(std::env::args_os())
    }

    /// Load using an explicit argument list.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading fails or a value is invalid.
    pub fn load_from_iter<I>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = OsString>,
    {
        let settings = ProfileSettings::load_from_iter(args).map_err(|err| ConfigError::Load {
            message: err.to_string(),
        })?;
        Self::try_from(settings)
    }

    /// Whether the deployment runs in production.
    pub fn is_prod(&self) -> bool {
        self.environment == Environment::Prod
    }
}

impl TryFrom<ProfileSettings> for ServiceConfig {
    type Error = ConfigError;

    fn try_from(mut settings: ProfileSettings) -> Result<Self, Self::Error> {
        let user_events = user_event_stream(&mut settings)?;
        let environment = match non_blank(settings.environment) {
            Some(raw) => raw
                .parse()
                .map_err(|err: String| ConfigError::invalid("PROFILE_ENVIRONMENT", err))?,
            None => Environment::default(),
        };

        let database_url = non_blank(settings.database_url);
        if environment == Environment::Prod && database_url.is_none() {
            return Err(ConfigError::Missing {
                key: "PROFILE_DATABASE_URL",
                environment,
            });
        }

        let port = settings.http_port.unwrap_or(DEFAULT_HTTP_PORT);
        let http_port = u16::try_from(port)
            .ok()
            .filter(|port| *port != 0)
            .ok_or_else(|| {
                ConfigError::invalid("PROFILE_HTTP_PORT", format!("must be 1..=65535, got {port}"))
            })?;

        let nickname_length =
            NicknameLength::new(settings.nickname_length.unwrap_or(DEFAULT_NICKNAME_LENGTH))
                .map_err(|err| ConfigError::invalid("PROFILE_NICKNAME_LENGTH", err))?;
        let max_nickname_retries = MaxNicknameRetries::new(
            settings
                .max_nickname_retries
                .unwrap_or(DEFAULT_MAX_NICKNAME_RETRIES),
        )
        .map_err(|err| ConfigError::invalid("PROFILE_MAX_NICKNAME_RETRIES", err))?;

        let nickname_prefix = settings
            .nickname_prefix
            .unwrap_or_else(|| DEFAULT_NICKNAME_PREFIX.to_owned());
        if !nickname_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ConfigError::invalid(
                "PROFILE_NICKNAME_PREFIX",
                "may only contain ASCII letters, digits or underscores",
            ));
        }

        let request_timeout = Duration::from_millis(positive(
            "PROFILE_REQUEST_TIMEOUT_MS",
            settings
                .request_timeout_ms
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS),
        )?);
        let cache_ttl = Duration::from_secs(positive(
            "PROFILE_CACHE_TTL_SECS",
            settings.cache_ttl_secs.unwrap_or(DEFAULT_CACHE_TTL_SECS),
        )?);

        let deletion_mode = match non_blank(settings.deletion_mode) {
            Some(raw) => raw
                .parse()
                .map_err(|err| ConfigError::invalid("PROFILE_DELETION_MODE", err))?,
            None => DeletionMode::default(),
        };

        Ok(Self {
            environment,
            database_url,
            redis_url: non_blank(settings.redis_url),
            http_port,
            nickname_length,
            max_nickname_retries,
            nickname_prefix,
            request_timeout,
            cache_ttl,
            deletion_mode,
            user_events,
        })
    }
}
