//! Connection event handling
//!
//! Each connection gets one background task draining its event stream.
//! Events are tagged with the generation of the connection that produced
//! them; once a reconnect installs a newer connection, state events from the
//! old one are dropped.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;

use super::ConnectionSupervisor;
use crate::error::RelayError;
use crate::transport::{ConnectionEvent, DisconnectReason, MessagingClient};
use crate::types::identifiers::SessionId;
use crate::types::session::SessionTransition;

/// What a recoverable loss led to
enum LossOutcome {
    /// Status did not allow the transition (already handled or gone)
    Ignored,
    /// Reconnect scheduled after `delay`
    Retry { delay: Duration, attempt: u32 },
    /// Ceiling reached; session stays `Disconnected`
    Exhausted { attempts: u32 },
}

impl<C: MessagingClient> ConnectionSupervisor<C> {
    /// Spawn the task that drains one connection's event stream
    pub(super) fn spawn_event_loop(
        &self,
        session_id: SessionId,
        generation: u64,
        mut events: mpsc::UnboundedReceiver<ConnectionEvent>,
        is_reconnect: bool,
    ) {
        let supervisor = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = supervisor.shutdown.cancelled() => break,
                    event = events.recv() => {
                        let Some(event) = event else { break };
                        supervisor.handle_event(&session_id, generation, event, is_reconnect);
                    }
                }
            }
            log::debug!("[{session_id}] event loop for connection #{generation} finished");
        });
    }

    /// Apply one event
    ///
    /// State events from a superseded connection (or a purged session) are
    /// dropped, but the stream keeps being drained until the client closes
    /// it so later credential updates still reach the store.
    fn handle_event(
        &self,
        session_id: &SessionId,
        generation: u64,
        event: ConnectionEvent,
        is_reconnect: bool,
    ) {
        // Credential updates are persisted whatever state the session is in.
        if let ConnectionEvent::CredentialsUpdated(payload) = &event {
            self.persist_credentials(session_id, payload);
            return;
        }

        if self.sessions.generation(session_id) != Some(generation) {
            log::debug!("[{session_id}] dropping {event:?} from superseded connection #{generation}");
            return;
        }

        match event {
            ConnectionEvent::Opened => {
                let now = Utc::now();
                let opened = self
                    .sessions
                    .update(session_id, |session| session.apply(SessionTransition::Opened, now));
                if opened == Some(true) {
                    log::info!("[{session_id}] connected");
                }
            }
            ConnectionEvent::Closed(reason) => {
                log::info!("[{session_id}] connection closed: {reason:?}");
                self.handle_closed(session_id, reason);
            }
            ConnectionEvent::QrCode(code) => {
                if !is_reconnect {
                    log::info!("[{session_id}] QR code received: {code}");
                }
            }
            ConnectionEvent::CredentialsUpdated(_) => {}
        }
    }

    fn persist_credentials(&self, session_id: &SessionId, payload: &serde_json::Value) {
        match self.credentials.save(session_id, payload) {
            Ok(()) => log::debug!("[{session_id}] credentials persisted"),
            Err(e) => log::error!("[{session_id}] failed to persist credentials: {e}"),
        }
    }

    /// Classify a closure and either purge the session or schedule a retry
    pub(super) fn handle_closed(&self, session_id: &SessionId, reason: DisconnectReason) {
        let now = Utc::now();

        if !reason.is_recoverable() {
            let logged_out = self.sessions.update(session_id, |session| {
                session.apply(SessionTransition::Lost { recoverable: false }, now)
            });
            if logged_out == Some(true) {
                self.sessions.remove(session_id);
                log::info!("[{session_id}] logged out ({reason:?}); session removed");
            }
            return;
        }

        let policy = self.policy;
        let outcome = self
            .sessions
            .update(session_id, |session| {
                if !session.apply(SessionTransition::Lost { recoverable: true }, now) {
                    return LossOutcome::Ignored;
                }
                match policy.next_delay(session.retry_count) {
                    Some(delay) => {
                        session.retry_count += 1;
                        LossOutcome::Retry {
                            delay,
                            attempt: session.retry_count,
                        }
                    }
                    None => LossOutcome::Exhausted {
                        attempts: session.retry_count,
                    },
                }
            })
            .unwrap_or(LossOutcome::Ignored);

        match outcome {
            LossOutcome::Ignored => {}
            LossOutcome::Retry { delay, attempt } => {
                log::warn!(
                    "[{session_id}] reconnecting in {}s (attempt {attempt})",
                    delay.as_secs_f64()
                );
                self.schedule_reconnect(session_id.clone(), delay);
            }
            LossOutcome::Exhausted { attempts } => {
                log::warn!("[{session_id}] giving up after {attempts} reconnect attempt(s)");
            }
        }
    }

    fn schedule_reconnect(&self, session_id: SessionId, delay: Duration) {
        let supervisor = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = supervisor.shutdown.cancelled() => {
                    log::debug!("[{session_id}] reconnect cancelled by shutdown");
                }
                () = tokio::time::sleep(delay) => supervisor.reconnect(&session_id).await,
            }
        });
    }

    /// Move `Disconnected -> Initializing` and request a new connection
    async fn reconnect(&self, session_id: &SessionId) {
        let now = Utc::now();
        let phone_number = self
            .sessions
            .update(session_id, |session| {
                session
                    .apply(SessionTransition::Retrying, now)
                    .then(|| session.phone_number.clone())
            })
            .flatten();

        let Some(phone_number) = phone_number else {
            log::debug!("[{session_id}] reconnect skipped: session no longer disconnected");
            return;
        };

        log::info!("[{session_id}] reconnecting");
        if let Err(e) = self.connect(session_id, &phone_number, true).await {
            log::warn!("[{session_id}] reconnect attempt failed: {e}");
            let reason = match e {
                RelayError::Auth(_) => DisconnectReason::InvalidCredentials,
                _ => DisconnectReason::Unknown,
            };
            self.handle_closed(session_id, reason);
        }
    }
}
