//! Periodic keep-alive
//!
//! Sends a best-effort liveness signal on every connected session so the
//! remote network does not drop idle connections. A failed signal is logged
//! and otherwise ignored: it never changes session status, and real
//! connection loss is only ever detected through the connection's events.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::registry::SessionRegistry;
use crate::transport::MessagingClient;

/// Outcome of one keep-alive round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeepAliveReport {
    /// Connected sessions signalled
    pub attempted: usize,
    /// Signals that failed
    pub failed: usize,
}

/// Fixed-period liveness signalling across connected sessions
pub struct KeepAliveScheduler<C: MessagingClient> {
    client: Arc<C>,
    sessions: SessionRegistry<C::Connection>,
    period: Duration,
}

impl<C: MessagingClient> Clone for KeepAliveScheduler<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            sessions: self.sessions.clone(),
            period: self.period,
        }
    }
}

impl<C: MessagingClient> KeepAliveScheduler<C> {
    /// Create a scheduler firing every `period`
    pub fn new(client: Arc<C>, sessions: SessionRegistry<C::Connection>, period: Duration) -> Self {
        Self {
            client,
            sessions,
            period,
        }
    }

    /// Signal every connected session once, concurrently
    pub async fn tick(&self) -> KeepAliveReport {
        let connected = self.sessions.connected();
        let attempted = connected.len();

        let outcomes = join_all(connected.into_iter().map(|(session_id, connection)| {
            let client = Arc::clone(&self.client);
            async move {
                match client.send_liveness_signal(&connection).await {
                    Ok(()) => {
                        log::debug!("[{session_id}] keep-alive sent");
                        true
                    }
                    Err(e) => {
                        log::warn!("[{session_id}] keep-alive failed: {e}");
                        false
                    }
                }
            }
        }))
        .await;

        KeepAliveReport {
            attempted,
            failed: outcomes.into_iter().filter(|ok| !ok).count(),
        }
    }

    /// Run `tick` every period until `shutdown` is cancelled
    ///
    /// The first round fires one full period after start.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + self.period;
            let mut interval = tokio::time::interval_at(start, self.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        let report = self.tick().await;
                        if report.attempted > 0 {
                            log::debug!(
                                "keep-alive round: {} session(s), {} failure(s)",
                                report.attempted,
                                report.failed
                            );
                        }
                    }
                }
            }
            log::debug!("keep-alive scheduler stopped");
        })
    }
}
