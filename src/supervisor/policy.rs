//! Reconnect policy

use std::time::Duration;

use crate::types::options::RelayOptions;

/// Fixed-interval reconnect policy with a retry ceiling
///
/// The ceiling only bounds pathological retry storms. There is no
/// exponential growth and no jitter; wrap this type for smarter backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    interval: Duration,
    max_attempts: u32,
}

impl ReconnectPolicy {
    /// Create a policy
    #[must_use]
    pub const fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Policy configured from relay options
    #[must_use]
    pub const fn from_options(options: &RelayOptions) -> Self {
        Self::new(options.reconnect_interval, options.max_reconnect_attempts)
    }

    /// Backoff before the next attempt, given attempts made so far
    ///
    /// `None` once `retry_count` reaches the ceiling.
    #[must_use]
    pub const fn next_delay(&self, retry_count: u32) -> Option<Duration> {
        if retry_count < self.max_attempts {
            Some(self.interval)
        } else {
            None
        }
    }

    /// Fixed backoff interval
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Retry ceiling
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_options(&RelayOptions::default())
    }
}
