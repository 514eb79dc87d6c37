//! Relay configuration
//!
//! Defaults: reconnect every 10 seconds with an effectively unbounded
//! ceiling, keep-alive every 5 minutes, completed tasks kept for 5 minutes.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{RelayError, Result};

/// Default fixed backoff between reconnect attempts
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(10);

/// Default reconnect ceiling ("unlimited in practice")
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 1000;

/// Default keep-alive period
pub const DEFAULT_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(300);

/// Default retention of completed tasks
pub const DEFAULT_TASK_RETENTION: Duration = Duration::from_secs(300);

/// Default wait between opening a session and requesting a pairing code
pub const DEFAULT_PAIRING_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Default credential directory
pub const DEFAULT_CREDENTIALS_DIR: &str = "sessions";

// ============================================================================
// Relay Options
// ============================================================================

/// Runtime configuration for the relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayOptions {
    /// Fixed backoff between reconnect attempts
    pub reconnect_interval: Duration,
    /// Reconnect ceiling; reaching it leaves the session `Disconnected`
    pub max_reconnect_attempts: u32,
    /// Keep-alive period
    pub keep_alive_interval: Duration,
    /// Grace period before a completed task is purged
    pub task_retention: Duration,
    /// Wait after opening a session before requesting a pairing code
    pub pairing_settle_delay: Duration,
    /// Root directory for file-backed credentials
    pub credentials_dir: PathBuf,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            keep_alive_interval: DEFAULT_KEEP_ALIVE_INTERVAL,
            task_retention: DEFAULT_TASK_RETENTION,
            pairing_settle_delay: DEFAULT_PAIRING_SETTLE_DELAY,
            credentials_dir: PathBuf::from(DEFAULT_CREDENTIALS_DIR),
        }
    }
}

impl RelayOptions {
    /// Create a new builder for `RelayOptions`
    #[must_use]
    pub fn builder() -> RelayOptionsBuilder {
        RelayOptionsBuilder::default()
    }

    /// Defaults overlaid with `RELAY_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from an arbitrary key lookup
    ///
    /// Recognized keys: `RELAY_RECONNECT_INTERVAL_SECS`,
    /// `RELAY_MAX_RECONNECT_ATTEMPTS`, `RELAY_KEEP_ALIVE_INTERVAL_SECS`,
    /// `RELAY_TASK_RETENTION_SECS`, `RELAY_PAIRING_SETTLE_MS`,
    /// `RELAY_CREDENTIALS_DIR`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::builder();

        if let Some(secs) = parse_var::<u64, _>(&lookup, "RELAY_RECONNECT_INTERVAL_SECS")? {
            builder = builder.reconnect_interval(Duration::from_secs(secs));
        }
        if let Some(max) = parse_var::<u32, _>(&lookup, "RELAY_MAX_RECONNECT_ATTEMPTS")? {
            builder = builder.max_reconnect_attempts(max);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "RELAY_KEEP_ALIVE_INTERVAL_SECS")? {
            builder = builder.keep_alive_interval(Duration::from_secs(secs));
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "RELAY_TASK_RETENTION_SECS")? {
            builder = builder.task_retention(Duration::from_secs(secs));
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "RELAY_PAIRING_SETTLE_MS")? {
            builder = builder.pairing_settle_delay(Duration::from_millis(ms));
        }
        if let Some(dir) = lookup("RELAY_CREDENTIALS_DIR").filter(|d| !d.trim().is_empty()) {
            builder = builder.credentials_dir(dir);
        }

        builder.build()
    }

    /// Check every value is usable
    pub fn validate(&self) -> Result<()> {
        if self.reconnect_interval.is_zero() {
            return Err(RelayError::invalid_config("reconnect_interval must be > 0"));
        }
        if self.keep_alive_interval.is_zero() {
            return Err(RelayError::invalid_config("keep_alive_interval must be > 0"));
        }
        if self.task_retention.is_zero() {
            return Err(RelayError::invalid_config("task_retention must be > 0"));
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| RelayError::invalid_config(format!("{key}: cannot parse '{raw}'"))),
    }
}

// ============================================================================
// Builder for RelayOptions
// ============================================================================

/// Builder for `RelayOptions`
#[derive(Debug, Default)]
pub struct RelayOptionsBuilder {
    options: RelayOptions,
}

impl RelayOptionsBuilder {
    /// Set the reconnect backoff
    #[must_use]
    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.options.reconnect_interval = interval;
        self
    }

    /// Set the reconnect ceiling
    #[must_use]
    pub fn max_reconnect_attempts(mut self, max: u32) -> Self {
        self.options.max_reconnect_attempts = max;
        self
    }

    /// Set the keep-alive period
    #[must_use]
    pub fn keep_alive_interval(mut self, interval: Duration) -> Self {
        self.options.keep_alive_interval = interval;
        self
    }

    /// Set the completed-task retention
    #[must_use]
    pub fn task_retention(mut self, retention: Duration) -> Self {
        self.options.task_retention = retention;
        self
    }

    /// Set the pairing settle delay
    #[must_use]
    pub fn pairing_settle_delay(mut self, delay: Duration) -> Self {
        self.options.pairing_settle_delay = delay;
        self
    }

    /// Set the credential directory
    #[must_use]
    pub fn credentials_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.options.credentials_dir = dir.into();
        self
    }

    /// Validate and build the options
    pub fn build(self) -> Result<RelayOptions> {
        self.options.validate()?;
        Ok(self.options)
    }
}
