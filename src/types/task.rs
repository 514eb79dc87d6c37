//! Dispatch task state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::identifiers::{SessionId, TaskId};
use super::target::Target;

/// Task lifecycle status
///
/// Transitions are monotone: `Running -> StopRequested -> Completed`, or
/// `Running -> Completed` directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Send loop active
    Running,
    /// Stop requested; the loop exits before its next message
    StopRequested,
    /// Loop exited
    Completed,
}

/// Bulk-send request as supplied by the front end
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchRequest {
    /// Session whose connection sends the messages
    pub session_id: SessionId,
    /// Recipient
    pub target: Target,
    /// Ordered, already trimmed, non-empty messages
    pub messages: Vec<String>,
    /// Optional text prepended to every message
    pub prefix: Option<String>,
    /// Minimum wait between consecutive send attempts
    pub delay_seconds: f64,
}

/// Task state held by the registry
#[derive(Debug, Clone)]
pub struct Task {
    /// Unique task identifier
    pub id: TaskId,
    /// Session used to send
    pub session_id: SessionId,
    /// Recipient
    pub target: Target,
    /// Messages, fixed at submission
    pub messages: Arc<[String]>,
    /// Optional prefix
    pub prefix: Option<String>,
    /// Delay between send attempts
    pub delay: Duration,
    /// Messages delivered successfully
    pub sent_count: usize,
    /// Messages skipped after a send error
    pub failed_count: usize,
    /// Current status
    pub status: TaskStatus,
    /// Submission time
    pub started_at: DateTime<Utc>,
    /// Time the loop exited
    pub ended_at: Option<DateTime<Utc>>,
    /// Time of the latest successful send
    pub last_sent_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a running task
    #[must_use]
    pub fn new(
        id: TaskId,
        session_id: SessionId,
        target: Target,
        messages: Vec<String>,
        prefix: Option<String>,
        delay: Duration,
    ) -> Self {
        Self {
            id,
            session_id,
            target,
            messages: messages.into(),
            prefix,
            delay,
            sent_count: 0,
            failed_count: 0,
            status: TaskStatus::Running,
            started_at: Utc::now(),
            ended_at: None,
            last_sent_at: None,
        }
    }

    /// Count one delivered message; sent plus failed never exceeds the message count
    pub fn record_sent(&mut self, now: DateTime<Utc>) {
        if self.sent_count + self.failed_count < self.messages.len() {
            self.sent_count += 1;
            self.last_sent_at = Some(now);
        }
    }

    /// Count one skipped message
    pub fn record_failure(&mut self) {
        if self.sent_count + self.failed_count < self.messages.len() {
            self.failed_count += 1;
        }
    }

    /// Move `Running` to `StopRequested`; anything else is left as is
    ///
    /// Returns whether the status changed.
    pub fn request_stop(&mut self) -> bool {
        if self.status == TaskStatus::Running {
            self.status = TaskStatus::StopRequested;
            true
        } else {
            false
        }
    }

    /// Mark the loop as exited
    pub fn complete(&mut self, now: DateTime<Utc>) {
        if self.status != TaskStatus::Completed {
            self.status = TaskStatus::Completed;
            self.ended_at = Some(now);
        }
    }

    /// Whether the send loop should keep going
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status == TaskStatus::Running
    }

    /// Cloneable, serializable view of this task
    #[must_use]
    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            task_id: self.id.clone(),
            session_id: self.session_id.clone(),
            target: self.target.clone(),
            prefix: self.prefix.clone(),
            total_messages: self.messages.len(),
            sent_count: self.sent_count,
            failed_count: self.failed_count,
            delay_seconds: self.delay.as_secs_f64(),
            status: self.status,
            started_at: self.started_at,
            ended_at: self.ended_at,
            last_sent_at: self.last_sent_at,
        }
    }
}

/// Point-in-time view of a task, returned by status queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    /// Unique task identifier
    pub task_id: TaskId,
    /// Session used to send
    pub session_id: SessionId,
    /// Recipient
    pub target: Target,
    /// Optional prefix
    pub prefix: Option<String>,
    /// Number of messages in the task
    pub total_messages: usize,
    /// Messages delivered successfully
    pub sent_count: usize,
    /// Messages skipped after a send error
    pub failed_count: usize,
    /// Delay between send attempts in seconds
    pub delay_seconds: f64,
    /// Current status
    pub status: TaskStatus,
    /// Submission time
    pub started_at: DateTime<Utc>,
    /// Time the loop exited (None while running)
    pub ended_at: Option<DateTime<Utc>>,
    /// Time of the latest successful send
    pub last_sent_at: Option<DateTime<Utc>>,
}
