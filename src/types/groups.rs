//! Group listing types

use serde::{Deserialize, Serialize};

/// Subject shown for groups that have none
pub const UNNAMED_GROUP: &str = "No Name";

/// Group metadata as reported by the messaging client
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    /// Group subject, if set
    pub subject: Option<String>,
    /// Identity of the group owner, if known
    pub owner_id: Option<String>,
    /// Number of participants
    pub participant_count: usize,
}

/// Which groups to return from a listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupFilter {
    /// Every group the session participates in
    #[default]
    All,
    /// Only groups owned by the session's identity
    Owned,
}

/// One row of a group listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSummary {
    /// Group id (usable as a `Target::group`)
    pub id: String,
    /// Subject, or `"No Name"`
    pub subject: String,
    /// Owner identity, if known
    pub owner_id: Option<String>,
    /// Number of participants
    pub participant_count: usize,
    /// Whether the session's identity owns the group
    pub is_owner: bool,
}
