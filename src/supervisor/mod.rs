//! Connection supervision
//!
//! `ConnectionSupervisor` owns one external connection per session. It opens
//! connections, consumes each connection's event stream on a background task,
//! keeps the session registry current, and schedules fixed-interval
//! reconnects after recoverable losses.
//!
//! # Module Structure
//!
//! - `policy` - `ReconnectPolicy`, the inspectable retry rule
//! - `events` - Event loop, close classification and reconnect scheduling

mod events;
pub mod policy;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::credentials::CredentialStore;
use crate::error::{RelayError, Result};
use crate::registry::{SessionLease, SessionRegistry};
use crate::transport::{ConnectRequest, MessagingClient};
use crate::types::groups::{GroupFilter, GroupSummary, UNNAMED_GROUP};
use crate::types::identifiers::{PhoneNumber, SessionId};
use crate::types::options::RelayOptions;
use crate::types::session::Session;

pub use policy::ReconnectPolicy;

/// Result of a pairing request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingOutcome {
    /// Session created for the phone number
    pub session_id: SessionId,
    /// Normalized phone number
    pub phone_number: PhoneNumber,
    /// One-time code, or `None` when the caller must pair out-of-band
    pub code: Option<String>,
}

/// Owns the lifecycle of one external connection per session
pub struct ConnectionSupervisor<C: MessagingClient> {
    client: Arc<C>,
    sessions: SessionRegistry<C::Connection>,
    credentials: Arc<dyn CredentialStore>,
    policy: ReconnectPolicy,
    pairing_settle_delay: Duration,
    shutdown: CancellationToken,
}

impl<C: MessagingClient> Clone for ConnectionSupervisor<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            sessions: self.sessions.clone(),
            credentials: Arc::clone(&self.credentials),
            policy: self.policy,
            pairing_settle_delay: self.pairing_settle_delay,
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<C: MessagingClient> ConnectionSupervisor<C> {
    /// Create a supervisor over a shared session registry
    ///
    /// Cancelling `shutdown` stops every event loop and pending reconnect.
    pub fn new(
        client: Arc<C>,
        sessions: SessionRegistry<C::Connection>,
        credentials: Arc<dyn CredentialStore>,
        options: &RelayOptions,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            client,
            sessions,
            credentials,
            policy: ReconnectPolicy::from_options(options),
            pairing_settle_delay: options.pairing_settle_delay,
            shutdown,
        }
    }

    /// Reconnect policy in effect
    #[must_use]
    pub const fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Open a connection for a session
    ///
    /// Idempotent per session id: returns `Ok(false)` without side effects
    /// when the session already exists. Otherwise registers the session in
    /// `Initializing`, requests the connection, starts consuming its events
    /// and returns `Ok(true)` without waiting for `Connected`.
    ///
    /// # Errors
    /// A failed first connect request removes the session again and returns
    /// the client's error.
    pub async fn open(&self, session_id: SessionId, phone_number: PhoneNumber) -> Result<bool> {
        if !self
            .sessions
            .put_if_absent(Session::new(session_id.clone(), phone_number.clone()))
        {
            log::debug!("[{session_id}] open ignored: session already exists");
            return Ok(false);
        }

        log::info!("[{session_id}] opening connection for {phone_number}");
        if let Err(e) = self.connect(&session_id, &phone_number, false).await {
            log::warn!("[{session_id}] initial connect failed: {e}");
            self.sessions.remove(&session_id);
            return Err(e);
        }
        Ok(true)
    }

    /// Open a session for a phone number and request a pairing code
    ///
    /// Generates the session id, waits for the client to settle, then asks
    /// for a code. `code` is `None` when the client cannot issue one.
    ///
    /// # Errors
    /// Returns a validation error when `raw_phone` contains no digits.
    pub async fn pair(&self, raw_phone: &str) -> Result<PairingOutcome> {
        let phone_number = PhoneNumber::normalize(raw_phone)
            .ok_or_else(|| RelayError::validation("phone number must contain digits"))?;
        let session_id = SessionId::generate(&phone_number);

        self.open(session_id.clone(), phone_number.clone()).await?;
        tokio::time::sleep(self.pairing_settle_delay).await;

        let lease = self
            .sessions
            .lease(&session_id)
            .ok_or_else(|| RelayError::session_not_found(session_id.as_str()))?;
        let code = self
            .client
            .request_pairing_code(&lease.connection, &phone_number)
            .await?;

        match &code {
            Some(_) => log::info!("[{session_id}] pairing code issued for {phone_number}"),
            None => log::info!(
                "[{session_id}] pairing code unavailable for {phone_number}; pair with the QR code from the logs"
            ),
        }

        Ok(PairingOutcome {
            session_id,
            phone_number,
            code,
        })
    }

    /// List groups visible to a connected session, sorted by subject
    ///
    /// # Errors
    /// Fails when the session is unknown, not connected, or the fetch fails.
    pub async fn groups(&self, session_id: &SessionId, filter: GroupFilter) -> Result<Vec<GroupSummary>> {
        let lease = self.connected_lease(session_id)?;
        let phone_number = &lease.session.phone_number;

        let mut groups: Vec<GroupSummary> = self
            .client
            .fetch_groups(&lease.connection)
            .await?
            .into_iter()
            .map(|(id, info)| {
                let is_owner = info
                    .owner_id
                    .as_deref()
                    .is_some_and(|owner| phone_number.matches_identity(owner));
                GroupSummary {
                    id,
                    subject: info
                        .subject
                        .filter(|s| !s.trim().is_empty())
                        .unwrap_or_else(|| UNNAMED_GROUP.to_string()),
                    owner_id: info.owner_id,
                    participant_count: info.participant_count,
                    is_owner,
                }
            })
            .filter(|group| filter == GroupFilter::All || group.is_owner)
            .collect();

        groups.sort_by(|a, b| a.subject.cmp(&b.subject).then_with(|| a.id.cmp(&b.id)));
        log::debug!("[{session_id}] listed {} group(s) ({filter:?})", groups.len());
        Ok(groups)
    }

    /// Snapshot of one session
    #[must_use]
    pub fn session(&self, session_id: &SessionId) -> Option<Session> {
        self.sessions.get(session_id)
    }

    /// Snapshots of every session, oldest first
    #[must_use]
    pub fn sessions(&self) -> Vec<Session> {
        self.sessions.list()
    }

    /// Administrative removal
    ///
    /// Drops the session and its connection handle; its event loop stops
    /// and any pending reconnect finds nothing to do.
    pub fn purge(&self, session_id: &SessionId) -> Option<Session> {
        let removed = self.sessions.remove(session_id);
        if removed.is_some() {
            log::info!("[{session_id}] session purged");
        }
        removed
    }

    fn connected_lease(&self, session_id: &SessionId) -> Result<SessionLease<C::Connection>> {
        match self.sessions.lease(session_id) {
            Some(lease) if lease.session.is_connected() => Ok(lease),
            Some(_) => Err(RelayError::session_unavailable(session_id.as_str())),
            None if self.sessions.get(session_id).is_some() => {
                Err(RelayError::session_unavailable(session_id.as_str()))
            }
            None => Err(RelayError::session_not_found(session_id.as_str())),
        }
    }

    /// Request a connection and start consuming its events
    async fn connect(
        &self,
        session_id: &SessionId,
        phone_number: &PhoneNumber,
        is_reconnect: bool,
    ) -> Result<()> {
        let request = ConnectRequest {
            session_id: session_id.clone(),
            phone_number: phone_number.clone(),
            is_reconnect,
        };
        let parts = self.client.connect(&request).await?;

        let Some(generation) = self
            .sessions
            .attach_connection(session_id, Arc::new(parts.connection))
        else {
            return Err(RelayError::session_not_found(session_id.as_str()));
        };

        self.spawn_event_loop(session_id.clone(), generation, parts.events, is_reconnect);
        Ok(())
    }
}
