//! Tuning parameters and backend location.
//!
//! Defaults match what the console has always used (500 ms for both the
//! poller and `wait_for_quest`). Values can be overridden from the
//! environment:
//!
//! | Variable | Field |
//! |---|---|
//! | `QUESTLINE_POLL_INTERVAL_MS` | `QuestConfig::poll_interval` |
//! | `QUESTLINE_WAIT_RETRY_MS` | `QuestConfig::wait_retry_delay` |
//! | `QUESTLINE_API_URL` | `HttpConfig::base_url` |
//! | `QUESTLINE_REQUEST_TIMEOUT_MS` | `HttpConfig::request_timeout` |

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_WAIT_RETRY_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_API_URL: &str = "http://localhost/api/v2/";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be a positive number of milliseconds, got {value:?}")]
    InvalidDuration { var: &'static str, value: String },

    #[error("invalid api url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("could not build http client: {0}")]
    Client(String),
}

/// Timing of the quest engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QuestConfig {
    /// How often the poller refreshes the main quests.
    #[serde(with = "millis")]
    pub poll_interval: Duration,

    /// Delay between two refreshes inside `wait_for_quest`.
    #[serde(with = "millis")]
    pub wait_retry_delay: Duration,
}

impl Default for QuestConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            wait_retry_delay: DEFAULT_WAIT_RETRY_DELAY,
        }
    }
}

impl QuestConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            poll_interval: duration_var(&lookup, "QUESTLINE_POLL_INTERVAL_MS")?
                .unwrap_or(defaults.poll_interval),
            wait_retry_delay: duration_var(&lookup, "QUESTLINE_WAIT_RETRY_MS")?
                .unwrap_or(defaults.wait_retry_delay),
        })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_wait_retry_delay(mut self, delay: Duration) -> Self {
        self.wait_retry_delay = delay;
        self
    }
}

/// Where the device API lives.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub base_url: String,

    #[serde(with = "millis")]
    pub request_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl HttpConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            base_url: lookup("QUESTLINE_API_URL").unwrap_or(defaults.base_url),
            request_timeout: duration_var(&lookup, "QUESTLINE_REQUEST_TIMEOUT_MS")?
                .unwrap_or(defaults.request_timeout),
        })
    }
}

fn duration_var(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<Duration>, ConfigError> {
    let Some(value) = lookup(var) else {
        return Ok(None);
    };
    match value.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Some(Duration::from_millis(ms))),
        _ => Err(ConfigError::InvalidDuration { var, value }),
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
