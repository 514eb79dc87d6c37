//! Messaging-network client abstraction
//!
//! The relay never speaks the network protocol itself. Handshake, encryption
//! and wire format belong to an external client library, which is adapted to
//! the [`MessagingClient`] trait below.

pub mod loopback;

use std::collections::HashMap;
use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::Result;
use crate::types::groups::GroupInfo;
use crate::types::identifiers::{PhoneNumber, SessionId};
use crate::types::target::Target;

/// Status code the network uses for revoked or invalid credentials
pub const INVALID_CREDENTIALS_CODE: u16 = 401;

/// Why a connection closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "code")]
pub enum DisconnectReason {
    /// The identity logged out explicitly
    LoggedOut,
    /// Credentials were rejected
    InvalidCredentials,
    /// Any other network status code
    Code(u16),
    /// No status code was reported
    Unknown,
}

impl DisconnectReason {
    /// Classify a raw status code as reported by the client
    #[must_use]
    pub const fn from_status_code(code: Option<u16>) -> Self {
        match code {
            Some(INVALID_CREDENTIALS_CODE) => Self::InvalidCredentials,
            Some(code) => Self::Code(code),
            None => Self::Unknown,
        }
    }

    /// Whether reconnecting can succeed
    #[must_use]
    pub const fn is_recoverable(self) -> bool {
        !matches!(self, Self::LoggedOut | Self::InvalidCredentials)
    }
}

/// Notification emitted by a connection
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// Connection is open and usable
    Opened,
    /// Connection closed
    Closed(DisconnectReason),
    /// Credential material changed and must be persisted
    CredentialsUpdated(serde_json::Value),
    /// Visual pairing code for out-of-band pairing
    QrCode(String),
}

/// Parameters for opening a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Session the connection belongs to
    pub session_id: SessionId,
    /// Identity to authenticate as
    pub phone_number: PhoneNumber,
    /// Whether this replaces a lost connection
    pub is_reconnect: bool,
}

/// A freshly requested connection and its notification stream
pub struct ConnectionParts<C> {
    /// Handle used for every subsequent call
    pub connection: C,
    /// State-change notifications; closed when the connection is dropped
    pub events: mpsc::UnboundedReceiver<ConnectionEvent>,
}

/// Client for the external messaging network
///
/// Implementations must tolerate calls from several tasks at once; the relay
/// serializes sends per session but liveness signals and group fetches may
/// overlap with them.
pub trait MessagingClient: Send + Sync + 'static {
    /// Opaque connection handle
    type Connection: Send + Sync + 'static;

    /// Request a new connection
    ///
    /// Returns once the request is issued; `Opened` arrives on the event
    /// stream later.
    ///
    /// # Errors
    /// Returns a connection error if the request cannot be issued
    fn connect(
        &self,
        request: &ConnectRequest,
    ) -> impl Future<Output = Result<ConnectionParts<Self::Connection>>> + Send;

    /// Request a one-time pairing code
    ///
    /// `Ok(None)` means codes are unsupported or the identity is already
    /// registered; callers fall back to out-of-band pairing.
    fn request_pairing_code(
        &self,
        connection: &Self::Connection,
        phone_number: &PhoneNumber,
    ) -> impl Future<Output = Result<Option<String>>> + Send {
        let _ = (connection, phone_number);
        async { Ok(None) }
    }

    /// Send one text message
    ///
    /// # Errors
    /// Returns a send error when delivery fails
    fn send(
        &self,
        connection: &Self::Connection,
        target: &Target,
        text: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Fetch every group the identity participates in, keyed by group id
    fn fetch_groups(
        &self,
        connection: &Self::Connection,
    ) -> impl Future<Output = Result<HashMap<String, GroupInfo>>> + Send;

    /// Best-effort liveness signal
    fn send_liveness_signal(
        &self,
        connection: &Self::Connection,
    ) -> impl Future<Output = Result<()>> + Send;
}
