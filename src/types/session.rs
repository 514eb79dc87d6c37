//! Session state and its transition rules
//!
//! A session pairs one phone-number identity with one external connection.
//! The connection handle itself lives in the registry entry; this struct is
//! the plain, cloneable state that callers observe.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identifiers::{PhoneNumber, SessionId};

/// Connection lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// A connection has been requested but is not open yet
    Initializing,
    /// Connection open; usable for dispatch
    Connected,
    /// Connection lost; a reconnect may be pending
    Disconnected,
    /// Terminal: credentials revoked or explicit logout
    LoggedOut,
}

impl SessionStatus {
    /// Whether no further transition is possible
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::LoggedOut)
    }
}

/// Input to the session state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTransition {
    /// The connection reported `opened`
    Opened,
    /// The connection reported `closed`
    Lost {
        /// Whether the close reason allows reconnecting
        recoverable: bool,
    },
    /// Backoff elapsed and a new connection attempt starts
    Retrying,
}

/// Observable session state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier
    pub id: SessionId,
    /// Normalized phone number this session is bound to
    pub phone_number: PhoneNumber,
    /// Current lifecycle status
    pub status: SessionStatus,
    /// Reconnect attempts since the last successful open
    pub retry_count: u32,
    /// When the connection last reached `Connected`
    pub last_connected_at: Option<DateTime<Utc>>,
    /// When the session was first opened
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Create a session in `Initializing`
    #[must_use]
    pub fn new(id: SessionId, phone_number: PhoneNumber) -> Self {
        Self {
            id,
            phone_number,
            status: SessionStatus::Initializing,
            retry_count: 0,
            last_connected_at: None,
            created_at: Utc::now(),
        }
    }

    /// Apply a transition at time `now`
    ///
    /// Returns `false` when the transition is not allowed from the current
    /// status, in which case the session is left untouched. `LoggedOut`
    /// rejects everything.
    pub fn apply(&mut self, transition: SessionTransition, now: DateTime<Utc>) -> bool {
        use SessionStatus::{Connected, Disconnected, Initializing, LoggedOut};

        match (self.status, transition) {
            (LoggedOut, _) => false,
            (_, SessionTransition::Lost { recoverable: false }) => {
                self.status = LoggedOut;
                true
            }
            (_, SessionTransition::Opened) => {
                self.status = Connected;
                self.retry_count = 0;
                self.last_connected_at = Some(now);
                true
            }
            (Initializing | Connected, SessionTransition::Lost { recoverable: true }) => {
                self.status = Disconnected;
                true
            }
            (Disconnected, SessionTransition::Retrying) => {
                self.status = Initializing;
                true
            }
            (Disconnected, SessionTransition::Lost { recoverable: true })
            | (Initializing | Connected, SessionTransition::Retrying) => false,
        }
    }

    /// Whether dispatch may use this session
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status == SessionStatus::Connected
    }
}
