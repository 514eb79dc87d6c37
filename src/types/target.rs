//! Dispatch targets

use serde::{Deserialize, Serialize};
use std::fmt;

use super::identifiers::digits_only;

/// Kind of recipient a task sends to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// A single identity addressed by phone number
    Individual,
    /// A group addressed by its network id
    Group,
}

/// Recipient of a dispatch task
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    /// Destination identifier (digits for individuals, raw id for groups)
    pub id: String,
    /// Discriminator
    pub kind: TargetKind,
}

impl Target {
    /// Individual target; everything but digits is stripped
    pub fn individual(raw: impl AsRef<str>) -> Self {
        Self {
            id: digits_only(raw.as_ref()),
            kind: TargetKind::Individual,
        }
    }

    /// Group target; the id is kept verbatim (trimmed)
    pub fn group(raw: impl AsRef<str>) -> Self {
        Self {
            id: raw.as_ref().trim().to_string(),
            kind: TargetKind::Group,
        }
    }

    /// Build a target from a kind and raw identifier
    pub fn new(kind: TargetKind, raw: impl AsRef<str>) -> Self {
        match kind {
            TargetKind::Individual => Self::individual(raw),
            TargetKind::Group => Self::group(raw),
        }
    }

    /// Whether the identifier is empty after normalization
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TargetKind::Individual => write!(f, "individual:{}", self.id),
            TargetKind::Group => write!(f, "group:{}", self.id),
        }
    }
}
