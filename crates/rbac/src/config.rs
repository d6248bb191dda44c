//! Plugin configuration
//!
//! The host hands configuration over as a loosely typed JSON map. Decoding is
//! weak: numbers and booleans are accepted where strings are expected, and
//! numeric strings where numbers are expected. Unknown keys are ignored.
//!
//! | key                 | alias (deprecated) | required | default |
//! |---------------------|--------------------|----------|---------|
//! | `access_key_id`     | `username`         | yes      |         |
//! | `secret_access_key` | `password`         | yes      |         |
//! | `url`               |                    | yes      |         |
//! | `region`            |                    | yes      |         |
//! | `poll_max_attempts` |                    | no       | `50`    |
//! | `poll_interval`     |                    | no       | `3s`    |

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::{ConfigError, ResourceId, SecretString, normalize};
use crate::poll::{DEFAULT_INTERVAL, DEFAULT_MAX_ATTEMPTS, PollPolicy};

/// Validation contract for configuration handed over at initialization
pub trait ProviderConfig: Send + Sync + Clone {
    /// Check every field, reporting the first problem found
    fn validate(&self) -> Result<(), ConfigError>;

    /// Name used in logs
    fn provider_name(&self) -> &'static str;
}

/// Connection and polling settings for one ElastiCache deployment
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "RawConfig")]
pub struct ElastiCacheConfig {
    /// AWS access key id
    pub access_key_id: SecretString,
    /// AWS secret access key
    pub secret_access_key: SecretString,
    /// Primary endpoint of the replication group, `prefix.cluster-id.suffix:port`
    pub url: String,
    /// AWS region
    pub region: String,
    /// Status checks per wait
    pub poll_max_attempts: u32,
    /// Pause between status checks
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl ElastiCacheConfig {
    /// Build a configuration from explicit values with default polling
    pub fn new(
        access_key_id: impl Into<SecretString>,
        secret_access_key: impl Into<SecretString>,
        url: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            url: url.into(),
            region: region.into(),
            poll_max_attempts: DEFAULT_MAX_ATTEMPTS,
            poll_interval: DEFAULT_INTERVAL,
        }
    }

    /// Weakly decode the host's configuration map
    pub fn from_map(map: &Map<String, Value>) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_value(Value::Object(map.clone()))?;
        Self::try_from(raw)
    }

    /// Override the polling policy
    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll_max_attempts = policy.max_attempts;
        self.poll_interval = policy.interval;
        self
    }

    /// Polling policy for every wait issued under this configuration
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            max_attempts: self.poll_max_attempts,
            interval: self.poll_interval,
        }
    }

    /// Replication group identifier: the second dot-separated label of the URL.
    ///
    /// `master.my-cluster.abc123.use1.cache.amazonaws.com:6379` yields
    /// `my-cluster`. A URL without a second label is rejected.
    pub fn replication_group_id(&self) -> Result<ResourceId, ConfigError> {
        let label = self
            .url
            .split('.')
            .nth(1)
            .filter(|label| !label.is_empty())
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "url",
                reason: "expected prefix.cluster-id.dns-suffix:port".to_string(),
            })?;
        Ok(normalize(label))
    }
}

impl ProviderConfig for ElastiCacheConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.access_key_id.is_blank() {
            return Err(ConfigError::MissingRequired {
                field: "access_key_id",
            });
        }
        if self.secret_access_key.is_blank() {
            return Err(ConfigError::MissingRequired {
                field: "secret_access_key",
            });
        }
        if self.url.trim().is_empty() {
            return Err(ConfigError::MissingRequired { field: "url" });
        }
        if self.region.trim().is_empty() {
            return Err(ConfigError::MissingRequired { field: "region" });
        }
        if self.poll_max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "poll_max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "poll_interval",
                reason: "must be greater than zero".to_string(),
            });
        }
        self.replication_group_id()?;
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "redisElastiCache"
    }
}

/// Wire shape before weak conversion. Keeps the deprecated aliases apart so
/// that both spellings may be present; the current name wins.
#[derive(Deserialize)]
struct RawConfig {
    access_key_id: Option<Value>,
    username: Option<Value>,
    secret_access_key: Option<Value>,
    password: Option<Value>,
    url: Option<Value>,
    region: Option<Value>,
    poll_max_attempts: Option<Value>,
    poll_interval: Option<Value>,
}

impl TryFrom<RawConfig> for ElastiCacheConfig {
    type Error = ConfigError;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        let access_key_id = raw.access_key_id.or(raw.username);
        let secret_access_key = raw.secret_access_key.or(raw.password);

        Ok(Self {
            access_key_id: weak_string("access_key_id", access_key_id)?.into(),
            secret_access_key: weak_string("secret_access_key", secret_access_key)?.into(),
            url: weak_string("url", raw.url)?,
            region: weak_string("region", raw.region)?,
            poll_max_attempts: weak_u32("poll_max_attempts", raw.poll_max_attempts)?
                .unwrap_or(DEFAULT_MAX_ATTEMPTS),
            poll_interval: weak_duration("poll_interval", raw.poll_interval)?
                .unwrap_or(DEFAULT_INTERVAL),
        })
    }
}

fn weak_string(field: &'static str, value: Option<Value>) -> Result<String, ConfigError> {
    match value {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(other) => Err(ConfigError::InvalidValue {
            field,
            reason: format!("expected a string, got {other}"),
        }),
    }
}

fn weak_u32(field: &'static str, value: Option<Value>) -> Result<Option<u32>, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidValue { field, reason };
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| invalid(format!("{n} is not a valid attempt count"))),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| invalid(format!("'{s}': {e}"))),
        Some(other) => Err(invalid(format!("expected a number, got {other}"))),
    }
}

fn weak_duration(field: &'static str, value: Option<Value>) -> Result<Option<Duration>, ConfigError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|secs| Some(Duration::from_secs(secs)))
            .ok_or_else(|| ConfigError::InvalidValue {
                field,
                reason: format!("{n} is not a whole number of seconds"),
            }),
        Some(value @ Value::String(_)) => humantime_serde::deserialize::<Duration, _>(value)
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                field,
                reason: e.to_string(),
            }),
        Some(other) => Err(ConfigError::InvalidValue {
            field,
            reason: format!("expected a duration, got {other}"),
        }),
    }
}
