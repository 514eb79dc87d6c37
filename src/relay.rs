//! Relay facade
//!
//! Wires the registries, supervisor, dispatcher and keep-alive scheduler
//! together around one messaging client.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::credentials::{CredentialStore, FileCredentialStore};
use crate::dispatch::MessageDispatcher;
use crate::error::Result;
use crate::keepalive::{KeepAliveReport, KeepAliveScheduler};
use crate::registry::{SessionRegistry, TaskRegistry};
use crate::supervisor::{ConnectionSupervisor, PairingOutcome};
use crate::transport::MessagingClient;
use crate::types::identifiers::{PhoneNumber, SessionId, TaskId};
use crate::types::options::RelayOptions;
use crate::types::session::Session;
use crate::types::task::{DispatchRequest, TaskSnapshot, TaskStatus};

/// Totals reported by [`Relay::shutdown`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownSummary {
    /// Sessions registered at shutdown
    pub sessions: usize,
    /// Running tasks asked to stop
    pub stopped_tasks: usize,
}

/// Session supervision plus bulk dispatch over one messaging client
pub struct Relay<C: MessagingClient> {
    supervisor: ConnectionSupervisor<C>,
    dispatcher: MessageDispatcher<C>,
    keep_alive: KeepAliveScheduler<C>,
    sessions: SessionRegistry<C::Connection>,
    options: RelayOptions,
    shutdown: CancellationToken,
    keep_alive_handle: Mutex<Option<JoinHandle<()>>>,
}

impl<C: MessagingClient> Relay<C> {
    /// Build a relay and start its keep-alive scheduler
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(client: Arc<C>, credentials: Arc<dyn CredentialStore>, options: RelayOptions) -> Self {
        let sessions = SessionRegistry::new();
        let tasks = TaskRegistry::new();
        let shutdown = CancellationToken::new();

        let supervisor = ConnectionSupervisor::new(
            Arc::clone(&client),
            sessions.clone(),
            credentials,
            &options,
            shutdown.clone(),
        );
        let dispatcher = MessageDispatcher::new(
            Arc::clone(&client),
            sessions.clone(),
            tasks,
            options.task_retention,
        );
        let keep_alive = KeepAliveScheduler::new(client, sessions.clone(), options.keep_alive_interval);
        let keep_alive_handle = keep_alive.clone().spawn(shutdown.clone());

        log::info!(
            "relay started: reconnect every {}s (max {}), keep-alive every {}s",
            options.reconnect_interval.as_secs(),
            options.max_reconnect_attempts,
            options.keep_alive_interval.as_secs()
        );

        Self {
            supervisor,
            dispatcher,
            keep_alive,
            sessions,
            options,
            shutdown,
            keep_alive_handle: Mutex::new(Some(keep_alive_handle)),
        }
    }

    /// Build a relay persisting credentials under `options.credentials_dir`
    pub fn with_file_credentials(client: Arc<C>, options: RelayOptions) -> Self {
        let store = FileCredentialStore::new(options.credentials_dir.clone());
        Self::new(client, Arc::new(store), options)
    }

    /// Connection supervisor
    #[must_use]
    pub const fn supervisor(&self) -> &ConnectionSupervisor<C> {
        &self.supervisor
    }

    /// Message dispatcher
    #[must_use]
    pub const fn dispatcher(&self) -> &MessageDispatcher<C> {
        &self.dispatcher
    }

    /// Options in effect
    #[must_use]
    pub const fn options(&self) -> &RelayOptions {
        &self.options
    }

    /// See [`ConnectionSupervisor::open`]
    pub async fn open(&self, session_id: SessionId, phone_number: PhoneNumber) -> Result<bool> {
        self.supervisor.open(session_id, phone_number).await
    }

    /// See [`ConnectionSupervisor::pair`]
    pub async fn pair(&self, raw_phone: &str) -> Result<PairingOutcome> {
        self.supervisor.pair(raw_phone).await
    }

    /// Snapshots of every session
    #[must_use]
    pub fn sessions(&self) -> Vec<Session> {
        self.supervisor.sessions()
    }

    /// See [`MessageDispatcher::submit`]
    pub fn submit(&self, request: DispatchRequest) -> Result<TaskId> {
        self.dispatcher.submit(request)
    }

    /// See [`MessageDispatcher::request_stop`]
    pub fn request_stop(&self, task_id: &TaskId) -> Result<TaskStatus> {
        self.dispatcher.request_stop(task_id)
    }

    /// See [`MessageDispatcher::status`]
    pub fn status(&self, task_id: &TaskId) -> Result<TaskSnapshot> {
        self.dispatcher.status(task_id)
    }

    /// Run one keep-alive round immediately
    pub async fn keep_alive_now(&self) -> KeepAliveReport {
        self.keep_alive.tick().await
    }

    /// Gracefully shut down
    ///
    /// Cancels keep-alive, event loops and pending reconnects, and asks every
    /// running task to stop before its next message.
    pub async fn shutdown(&self) -> ShutdownSummary {
        log::info!("Shutting down relay...");
        self.shutdown.cancel();

        let stopped_tasks = self.dispatcher.stop_all();
        let handle = self.keep_alive_handle.lock().take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            log::warn!("keep-alive scheduler ended abnormally: {e}");
        }

        let summary = ShutdownSummary {
            sessions: self.sessions.len(),
            stopped_tasks,
        };
        log::info!(
            "Relay shutdown complete: {} session(s), {} task(s) asked to stop",
            summary.sessions,
            summary.stopped_tasks
        );
        summary
    }
}

impl<C: MessagingClient> Drop for Relay<C> {
    fn drop(&mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.keep_alive_handle.lock().take() {
            handle.abort();
        }
    }
}
