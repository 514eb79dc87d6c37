//! Newtype wrappers for type safety
//!
//! Session ids, task ids and phone numbers are all strings on the wire;
//! wrapping them keeps registries and APIs from mixing them up.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Newtype Wrappers for Type Safety
// ============================================================================

/// Random suffix length used when generating ids
const SUFFIX_LEN: usize = 5;

fn random_suffix() -> String {
    Uuid::new_v4().simple().to_string()[..SUFFIX_LEN].to_string()
}

/// Session ID newtype for type safety
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Create a new session ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh session ID for a phone number
    ///
    /// Format: `perm_<digits>_<unix millis>_<random>`
    #[must_use]
    pub fn generate(phone: &PhoneNumber) -> Self {
        Self(format!(
            "perm_{}_{}_{}",
            phone.as_str(),
            Utc::now().timestamp_millis(),
            random_suffix()
        ))
    }

    /// Get the session ID as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Task ID newtype
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Create a new task ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh task ID
    ///
    /// Format: `task_<unix millis>_<random>`
    #[must_use]
    pub fn generate() -> Self {
        Self(format!(
            "task_{}_{}",
            Utc::now().timestamp_millis(),
            random_suffix()
        ))
    }

    /// Get the task ID as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Phone number normalized to its digits
///
/// Accepts `+91 98-765 43210` style input and keeps only `0-9`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Normalize raw input to a digit string
    ///
    /// Returns `None` when no digits remain.
    #[must_use]
    pub fn normalize(raw: &str) -> Option<Self> {
        let digits = digits_only(raw);
        if digits.is_empty() {
            None
        } else {
            Some(Self(digits))
        }
    }

    /// Get the digits as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether a network identity (`<digits>[:device]@<server>`) belongs to this number
    #[must_use]
    pub fn matches_identity(&self, identity: &str) -> bool {
        let bare = identity
            .split([':', '@'])
            .next()
            .unwrap_or_default();
        bare == self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Strip every non-digit character
pub(crate) fn digits_only(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}
