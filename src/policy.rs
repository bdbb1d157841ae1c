//! Iteration policy types and resolution.
//!
//! A [`PolicyOverrides`] is the partial, user-facing configuration: every
//! field optional, settable through builder methods or loaded from a TOML
//! file. Resolving it against the documented defaults produces the
//! immutable [`RunPolicy`] that governs every run started from one
//! controller.

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use thiserror::Error;

/// The resolved, immutable set of iteration-control parameters.
///
/// Produced once per controller by [`PolicyOverrides::resolve`] and shared
/// read-only across all runs started from that controller. Values are taken
/// as-is, with no clamping: a `limit` of `Some(0)` yields a run that
/// terminates immediately after its start/stop notifications, and a
/// `max_retries` of 0 yields a zero-retry run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPolicy {
    /// Maximum number of successful iterations. `None` means unbounded.
    pub limit: Option<u64>,
    /// Delay after each successful iteration. Default: zero.
    pub interval: Duration,
    /// Whether a step failure triggers a retry instead of immediate
    /// propagation. Default: `false`.
    pub retry_on_error: bool,
    /// Retry attempts allowed per iteration before the error propagates.
    /// Default: 3.
    pub max_retries: u32,
    /// Delay before each retry attempt. Default: 1000 ms.
    pub retry_delay: Duration,
}

impl Default for RunPolicy {
    fn default() -> Self {
        Self {
            limit: None,
            interval: Duration::ZERO,
            retry_on_error: false,
            max_retries: 3,
            retry_delay: Duration::from_millis(1000),
        }
    }
}

/// A partial policy: every field of [`RunPolicy`] as an `Option`.
///
/// Unset fields fall back to the defaults documented on [`RunPolicy`] when
/// [`resolve`](PolicyOverrides::resolve) is called. Durations deserialize
/// from millisecond integer fields (`interval_ms`, `retry_delay_ms`).
///
/// The initial bridge seed is typed by the work value and therefore lives
/// on the controller (`Controller::with_seed`), not here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PolicyOverrides {
    /// Maximum successful iterations; unset means unbounded.
    pub limit: Option<u64>,
    /// Delay after each successful iteration, in milliseconds on disk.
    #[serde(rename = "interval_ms", deserialize_with = "duration_ms::deserialize")]
    pub interval: Option<Duration>,
    /// Whether failures are retried instead of propagated.
    pub retry_on_error: Option<bool>,
    /// Retry attempts allowed per iteration.
    pub max_retries: Option<u32>,
    /// Delay before each retry attempt, in milliseconds on disk.
    #[serde(rename = "retry_delay_ms", deserialize_with = "duration_ms::deserialize")]
    pub retry_delay: Option<Duration>,
}

impl PolicyOverrides {
    /// Creates an empty set of overrides; resolving it yields the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of successful iterations.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the delay applied after each successful iteration.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Sets whether step failures are retried.
    pub fn with_retry_on_error(mut self, retry: bool) -> Self {
        self.retry_on_error = Some(retry);
        self
    }

    /// Sets the retry budget per iteration.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Sets the delay before each retry attempt.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Resolves the overrides into a complete [`RunPolicy`], substituting
    /// the documented default for every unset field.
    pub fn resolve(self) -> RunPolicy {
        let defaults = RunPolicy::default();
        RunPolicy {
            limit: self.limit.or(defaults.limit),
            interval: self.interval.unwrap_or(defaults.interval),
            retry_on_error: self.retry_on_error.unwrap_or(defaults.retry_on_error),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            retry_delay: self.retry_delay.unwrap_or(defaults.retry_delay),
        }
    }

    /// Loads overrides from a TOML file.
    ///
    /// Environment variables with the `STEPLOOP` prefix override file
    /// values, e.g. `STEPLOOP_LIMIT=5` or `STEPLOOP_INTERVAL_MS=250`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist, the path is not valid
    /// UTF-8, or the contents fail to parse.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PolicyFileError> {
        let path = path.as_ref();

        let path_str = path
            .to_str()
            .ok_or_else(|| PolicyFileError::InvalidPath(format!("{:?}", path)))?;

        if !path.exists() {
            return Err(PolicyFileError::NotFound(path_str.to_string()));
        }

        let loaded = Config::builder()
            .add_source(File::with_name(path_str))
            .add_source(
                Environment::with_prefix("STEPLOOP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(loaded.try_deserialize()?)
    }
}

/// Errors that can occur when loading a policy file.
#[derive(Debug, Error)]
pub enum PolicyFileError {
    /// The policy file was not found.
    #[error("policy file not found: {0}")]
    NotFound(String),

    /// The policy file could not be parsed.
    #[error("failed to parse policy file: {0}")]
    Parse(#[from] ConfigError),

    /// The policy file path is not valid UTF-8.
    #[error("invalid policy path: {0}")]
    InvalidPath(String),
}

mod duration_ms {
    //! Deserializes an optional duration from a millisecond integer.

    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Some(Duration::from_millis(millis)))
    }
}
