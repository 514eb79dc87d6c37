//! Task registry

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::types::identifiers::TaskId;
use crate::types::task::{Task, TaskSnapshot};

struct TaskEntry {
    task: Task,
    handle: Option<JoinHandle<()>>,
}

/// Dispatch-task state keyed by task id, plus the handle of each send loop
#[derive(Clone, Default)]
pub struct TaskRegistry {
    entries: Arc<Mutex<HashMap<TaskId, TaskEntry>>>,
}

impl TaskRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a task
    pub fn put(&self, task: Task) {
        self.entries
            .lock()
            .insert(task.id.clone(), TaskEntry { task, handle: None });
    }

    /// Store the join handle of a task's send loop
    ///
    /// Returns false (and drops the handle, detaching the loop) when the
    /// task is no longer registered.
    pub fn attach_handle(&self, task_id: &TaskId, handle: JoinHandle<()>) -> bool {
        match self.entries.lock().get_mut(task_id) {
            Some(entry) => {
                entry.handle = Some(handle);
                true
            }
            None => false,
        }
    }

    /// Take the join handle out of the registry
    pub fn take_handle(&self, task_id: &TaskId) -> Option<JoinHandle<()>> {
        self.entries
            .lock()
            .get_mut(task_id)
            .and_then(|entry| entry.handle.take())
    }

    /// Snapshot of one task
    #[must_use]
    pub fn get(&self, task_id: &TaskId) -> Option<TaskSnapshot> {
        self.entries
            .lock()
            .get(task_id)
            .map(|entry| entry.task.snapshot())
    }

    /// Whether the task exists and is still `Running`
    #[must_use]
    pub fn is_running(&self, task_id: &TaskId) -> bool {
        self.entries
            .lock()
            .get(task_id)
            .is_some_and(|entry| entry.task.is_running())
    }

    /// Run `f` on a task while holding the registry lock
    pub fn update<R>(&self, task_id: &TaskId, f: impl FnOnce(&mut Task) -> R) -> Option<R> {
        self.entries
            .lock()
            .get_mut(task_id)
            .map(|entry| f(&mut entry.task))
    }

    /// Remove a task, returning its final snapshot
    pub fn remove(&self, task_id: &TaskId) -> Option<TaskSnapshot> {
        self.entries
            .lock()
            .remove(task_id)
            .map(|entry| entry.task.snapshot())
    }

    /// Snapshots of every task, oldest first
    #[must_use]
    pub fn list(&self) -> Vec<TaskSnapshot> {
        let mut tasks: Vec<TaskSnapshot> = self
            .entries
            .lock()
            .values()
            .map(|entry| entry.task.snapshot())
            .collect();
        tasks.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.task_id.cmp(&b.task_id))
        });
        tasks
    }

    /// Ids of every task still `Running`
    #[must_use]
    pub fn running(&self) -> Vec<TaskId> {
        self.entries
            .lock()
            .iter()
            .filter(|(_, entry)| entry.task.is_running())
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Number of registered tasks
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no task is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
