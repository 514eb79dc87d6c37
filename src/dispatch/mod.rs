//! Bulk message dispatch
//!
//! `MessageDispatcher` validates submissions, registers a [`Task`] and spawns
//! one independent send loop per task. Loops observe stop requests only
//! between messages, so a send in flight always completes.
//!
//! # Module Structure
//!
//! - `background` - Send loop and retention timer
//! - `helpers` - Message composition and message-file parsing

mod background;
mod helpers;

use std::sync::Arc;
use std::time::Duration;

use crate::error::{RelayError, Result};
use crate::registry::{SessionRegistry, TaskRegistry};
use crate::transport::MessagingClient;
use crate::types::identifiers::TaskId;
use crate::types::task::{DispatchRequest, Task, TaskSnapshot, TaskStatus};

use background::{SendLoopContext, spawn_send_loop};

pub use helpers::{compose_text, parse_message_lines};

/// Runs bulk-send jobs over supervised sessions
pub struct MessageDispatcher<C: MessagingClient> {
    client: Arc<C>,
    sessions: SessionRegistry<C::Connection>,
    tasks: TaskRegistry,
    retention: Duration,
}

impl<C: MessagingClient> Clone for MessageDispatcher<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            sessions: self.sessions.clone(),
            tasks: self.tasks.clone(),
            retention: self.retention,
        }
    }
}

impl<C: MessagingClient> MessageDispatcher<C> {
    /// Create a dispatcher; completed tasks stay queryable for `retention`
    pub fn new(
        client: Arc<C>,
        sessions: SessionRegistry<C::Connection>,
        tasks: TaskRegistry,
        retention: Duration,
    ) -> Self {
        Self {
            client,
            sessions,
            tasks,
            retention,
        }
    }

    /// Validate a request, register the task and start its send loop
    ///
    /// Returns the task id immediately; delivery happens in the background.
    ///
    /// # Errors
    /// Returns a validation error, and creates no task, when the message
    /// list is empty or contains a blank message, the target is empty, the
    /// delay is not a positive number of seconds, or the session is unknown
    /// or not connected.
    pub fn submit(&self, request: DispatchRequest) -> Result<TaskId> {
        let DispatchRequest {
            session_id,
            target,
            messages,
            prefix,
            delay_seconds,
        } = request;

        if messages.is_empty() {
            return Err(RelayError::validation("message list is empty"));
        }
        if let Some(index) = messages.iter().position(|m| m.trim().is_empty()) {
            return Err(RelayError::validation(format!("message {} is blank", index + 1)));
        }
        if target.is_empty() {
            return Err(RelayError::validation("target is empty"));
        }
        if !(delay_seconds.is_finite() && delay_seconds > 0.0) {
            return Err(RelayError::validation(format!(
                "delay must be a positive number of seconds, got {delay_seconds}"
            )));
        }
        let delay = Duration::try_from_secs_f64(delay_seconds)
            .map_err(|e| RelayError::validation(format!("delay {delay_seconds}s: {e}")))?;

        match self.sessions.get(&session_id) {
            None => {
                return Err(RelayError::validation(format!("session {session_id} not found")));
            }
            Some(session) if !session.is_connected() => {
                return Err(RelayError::validation(format!(
                    "session {session_id} is {:?}, not connected",
                    session.status
                )));
            }
            Some(_) => {}
        }

        let prefix = prefix.filter(|p| !p.is_empty());
        let task = Task::new(
            TaskId::generate(),
            session_id.clone(),
            target.clone(),
            messages,
            prefix.clone(),
            delay,
        );
        let task_id = task.id.clone();
        let messages = Arc::clone(&task.messages);
        self.tasks.put(task);

        let handle = spawn_send_loop(SendLoopContext {
            client: Arc::clone(&self.client),
            sessions: self.sessions.clone(),
            tasks: self.tasks.clone(),
            task_id: task_id.clone(),
            session_id,
            target,
            messages,
            prefix,
            delay,
            retention: self.retention,
        });
        self.tasks.attach_handle(&task_id, handle);

        Ok(task_id)
    }

    /// Ask a task to stop before its next message
    ///
    /// Idempotent: only a `Running` task changes (to `StopRequested`); the
    /// current status is returned either way.
    ///
    /// # Errors
    /// Returns `TaskNotFound` for unknown or already purged tasks.
    pub fn request_stop(&self, task_id: &TaskId) -> Result<TaskStatus> {
        let (changed, status) = self
            .tasks
            .update(task_id, |task| (task.request_stop(), task.status))
            .ok_or_else(|| RelayError::task_not_found(task_id.as_str()))?;
        if changed {
            log::info!("[{task_id}] stop requested");
        }
        Ok(status)
    }

    /// Current snapshot of a task
    ///
    /// # Errors
    /// Returns `TaskNotFound` for unknown or already purged tasks.
    pub fn status(&self, task_id: &TaskId) -> Result<TaskSnapshot> {
        self.tasks
            .get(task_id)
            .ok_or_else(|| RelayError::task_not_found(task_id.as_str()))
    }

    /// Snapshots of every task still registered, oldest first
    #[must_use]
    pub fn tasks(&self) -> Vec<TaskSnapshot> {
        self.tasks.list()
    }

    /// Wait for a task's send loop to exit and return its final snapshot
    ///
    /// # Errors
    /// Returns `TaskNotFound` for unknown or already purged tasks.
    pub async fn wait(&self, task_id: &TaskId) -> Result<TaskSnapshot> {
        if let Some(handle) = self.tasks.take_handle(task_id)
            && let Err(e) = handle.await
        {
            log::error!("[{task_id}] send loop aborted: {e}");
        }
        self.status(task_id)
    }

    /// Request a stop on every running task; returns how many were asked
    pub fn stop_all(&self) -> usize {
        self.tasks
            .running()
            .iter()
            .filter(|task_id| {
                self.tasks
                    .update(task_id, |task| task.request_stop())
                    .unwrap_or(false)
            })
            .count()
    }
}
