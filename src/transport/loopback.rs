//! In-memory messaging client
//!
//! `LoopbackClient` never touches the network. Every send is recorded, and
//! connection events can be injected per session, which makes it the driver
//! for the demo binary and for exercising reconnect and dispatch behavior.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::{ConnectRequest, ConnectionEvent, ConnectionParts, MessagingClient};
use crate::error::{RelayError, Result};
use crate::types::groups::GroupInfo;
use crate::types::identifiers::{PhoneNumber, SessionId};
use crate::types::target::Target;

type SendPredicate = Arc<dyn Fn(&Target, &str) -> bool + Send + Sync>;

/// A message accepted by the loopback client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Session whose connection sent it
    pub session_id: SessionId,
    /// Recipient
    pub target: Target,
    /// Final text, prefix included
    pub text: String,
    /// When the send started
    pub started_at: Instant,
}

/// Connection handle issued by [`LoopbackClient`]
#[derive(Debug)]
pub struct LoopbackConnection {
    session_id: SessionId,
    attempt: u32,
    closed: Arc<AtomicBool>,
}

impl LoopbackConnection {
    /// Session the connection belongs to
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// 1-based connect attempt that produced this handle
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Whether a `Closed` event has been emitted for this handle
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct LiveConnection {
    attempt: u32,
    events_tx: mpsc::UnboundedSender<ConnectionEvent>,
    closed: Arc<AtomicBool>,
}

impl LiveConnection {
    fn emit(&self, event: ConnectionEvent) -> bool {
        if matches!(event, ConnectionEvent::Closed(_)) {
            self.closed.store(true, Ordering::SeqCst);
        }
        self.events_tx.send(event).is_ok()
    }
}

#[derive(Default)]
struct LoopbackState {
    live: HashMap<SessionId, LiveConnection>,
    superseded: HashMap<SessionId, Vec<LiveConnection>>,
    connect_attempts: HashMap<SessionId, u32>,
    failing_connects: u32,
    sent: Vec<SentMessage>,
    in_flight: HashMap<SessionId, usize>,
    max_in_flight: HashMap<SessionId, usize>,
    liveness: HashMap<SessionId, usize>,
    groups: HashMap<String, GroupInfo>,
}

/// Messaging client that keeps everything in memory
pub struct LoopbackClient {
    state: Mutex<LoopbackState>,
    auto_open: bool,
    pairing_code: Option<String>,
    send_latency: Duration,
    fail_send: Mutex<Option<SendPredicate>>,
    fail_liveness: AtomicBool,
}

impl Default for LoopbackClient {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackClient {
    /// Client that opens every connection immediately
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LoopbackState::default()),
            auto_open: true,
            pairing_code: None,
            send_latency: Duration::ZERO,
            fail_send: Mutex::new(None),
            fail_liveness: AtomicBool::new(false),
        }
    }

    /// Leave connections in `Initializing` until `Opened` is emitted by hand
    #[must_use]
    pub fn manual_open(mut self) -> Self {
        self.auto_open = false;
        self
    }

    /// Answer pairing-code requests with `code`
    #[must_use]
    pub fn with_pairing_code(mut self, code: impl Into<String>) -> Self {
        self.pairing_code = Some(code.into());
        self
    }

    /// Make each send take `latency`
    #[must_use]
    pub fn with_send_latency(mut self, latency: Duration) -> Self {
        self.send_latency = latency;
        self
    }

    /// Fail every send for which `predicate` returns true
    pub fn fail_sends_when<F>(&self, predicate: F)
    where
        F: Fn(&Target, &str) -> bool + Send + Sync + 'static,
    {
        *self.fail_send.lock() = Some(Arc::new(predicate));
    }

    /// Fail the next `count` connect requests
    pub fn fail_next_connects(&self, count: u32) {
        self.state.lock().failing_connects = count;
    }

    /// Fail or succeed liveness signals
    pub fn fail_liveness(&self, fail: bool) {
        self.fail_liveness.store(fail, Ordering::SeqCst);
    }

    /// Replace the groups returned by `fetch_groups`
    pub fn set_groups(&self, groups: HashMap<String, GroupInfo>) {
        self.state.lock().groups = groups;
    }

    /// Push an event onto the session's current connection
    ///
    /// Returns false when the session has no live connection. A `Closed`
    /// event also marks the handle closed, so later sends on it fail.
    pub fn emit(&self, session_id: &SessionId, event: ConnectionEvent) -> bool {
        self.state
            .lock()
            .live
            .get(session_id)
            .is_some_and(|live| live.emit(event))
    }

    /// Push an event onto the connection produced by a given connect attempt
    ///
    /// Replaced connections keep their event streams open, so this reaches
    /// handles the relay has already moved past.
    pub fn emit_to_attempt(&self, session_id: &SessionId, attempt: u32, event: ConnectionEvent) -> bool {
        let state = self.state.lock();
        state
            .live
            .get(session_id)
            .into_iter()
            .chain(state.superseded.get(session_id).into_iter().flatten())
            .find(|live| live.attempt == attempt)
            .is_some_and(|live| live.emit(event))
    }

    /// Every message accepted so far, in send order
    #[must_use]
    pub fn sent(&self) -> Vec<SentMessage> {
        self.state.lock().sent.clone()
    }

    /// Number of connect requests issued for a session
    #[must_use]
    pub fn connect_attempts(&self, session_id: &SessionId) -> u32 {
        self.state
            .lock()
            .connect_attempts
            .get(session_id)
            .copied()
            .unwrap_or_default()
    }

    /// Number of successful liveness signals for a session
    #[must_use]
    pub fn liveness_signals(&self, session_id: &SessionId) -> usize {
        self.state
            .lock()
            .liveness
            .get(session_id)
            .copied()
            .unwrap_or_default()
    }

    /// Highest number of overlapping sends observed on one session
    #[must_use]
    pub fn max_concurrent_sends(&self, session_id: &SessionId) -> usize {
        self.state
            .lock()
            .max_in_flight
            .get(session_id)
            .copied()
            .unwrap_or_default()
    }

    fn should_fail_send(&self, target: &Target, text: &str) -> bool {
        self.fail_send
            .lock()
            .as_ref()
            .is_some_and(|predicate| predicate(target, text))
    }
}

impl MessagingClient for LoopbackClient {
    type Connection = LoopbackConnection;

    async fn connect(
        &self,
        request: &ConnectRequest,
    ) -> Result<ConnectionParts<Self::Connection>> {
        let (events_tx, events) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));

        let attempt = {
            let mut state = self.state.lock();
            let attempts = state
                .connect_attempts
                .entry(request.session_id.clone())
                .or_default();
            *attempts += 1;
            let attempt = *attempts;

            if state.failing_connects > 0 {
                state.failing_connects -= 1;
                return Err(RelayError::connection(format!(
                    "loopback refused connect attempt {attempt} for {}",
                    request.session_id
                )));
            }

            let previous = state.live.insert(
                request.session_id.clone(),
                LiveConnection {
                    attempt,
                    events_tx: events_tx.clone(),
                    closed: Arc::clone(&closed),
                },
            );
            if let Some(previous) = previous {
                state
                    .superseded
                    .entry(request.session_id.clone())
                    .or_default()
                    .push(previous);
            }
            attempt
        };

        if self.auto_open {
            let _ = events_tx.send(ConnectionEvent::Opened);
        }

        Ok(ConnectionParts {
            connection: LoopbackConnection {
                session_id: request.session_id.clone(),
                attempt,
                closed,
            },
            events,
        })
    }

    async fn request_pairing_code(
        &self,
        _connection: &Self::Connection,
        _phone_number: &PhoneNumber,
    ) -> Result<Option<String>> {
        Ok(self.pairing_code.clone())
    }

    async fn send(&self, connection: &Self::Connection, target: &Target, text: &str) -> Result<()> {
        let started_at = Instant::now();
        {
            let mut state = self.state.lock();
            let in_flight = state
                .in_flight
                .entry(connection.session_id.clone())
                .or_default();
            *in_flight += 1;
            let current = *in_flight;
            let max = state
                .max_in_flight
                .entry(connection.session_id.clone())
                .or_default();
            *max = (*max).max(current);
        }

        if !self.send_latency.is_zero() {
            tokio::time::sleep(self.send_latency).await;
        }

        let mut state = self.state.lock();
        if let Some(in_flight) = state.in_flight.get_mut(&connection.session_id) {
            *in_flight = in_flight.saturating_sub(1);
        }

        if connection.is_closed() {
            return Err(RelayError::send("connection closed"));
        }
        if self.should_fail_send(target, text) {
            return Err(RelayError::send(format!("recipient {target} rejected message")));
        }

        state.sent.push(SentMessage {
            session_id: connection.session_id.clone(),
            target: target.clone(),
            text: text.to_string(),
            started_at,
        });
        Ok(())
    }

    async fn fetch_groups(&self, connection: &Self::Connection) -> Result<HashMap<String, GroupInfo>> {
        if connection.is_closed() {
            return Err(RelayError::connection("connection closed"));
        }
        Ok(self.state.lock().groups.clone())
    }

    async fn send_liveness_signal(&self, connection: &Self::Connection) -> Result<()> {
        if connection.is_closed() || self.fail_liveness.load(Ordering::SeqCst) {
            return Err(RelayError::connection("liveness signal rejected"));
        }
        *self
            .state
            .lock()
            .liveness
            .entry(connection.session_id.clone())
            .or_default() += 1;
        Ok(())
    }
}
