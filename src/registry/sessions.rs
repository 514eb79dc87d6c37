//! Session registry

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::types::identifiers::SessionId;
use crate::types::session::{Session, SessionStatus};

struct SessionEntry<C> {
    session: Session,
    connection: Option<Arc<C>>,
    generation: u64,
    send_lock: Arc<tokio::sync::Mutex<()>>,
}

impl<C> SessionEntry<C> {
    fn new(session: Session) -> Self {
        Self {
            session,
            connection: None,
            generation: 0,
            send_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }
}

/// Everything a dispatcher needs to send through one session
pub struct SessionLease<C> {
    /// Session state at the time of the lookup
    pub session: Session,
    /// Current connection handle
    pub connection: Arc<C>,
    /// Serializes sends on this session
    pub send_lock: Arc<tokio::sync::Mutex<()>>,
}

/// Session state keyed by session id
///
/// Holds a non-owning `Arc` to each session's current connection next to its
/// state. No lifecycle rules live here; the supervisor decides transitions.
///
/// Connection generations come from one counter shared by the whole
/// registry, so a re-created session id never reuses a generation that an
/// older event loop may still hold.
pub struct SessionRegistry<C> {
    entries: Arc<Mutex<HashMap<SessionId, SessionEntry<C>>>>,
    generations: Arc<AtomicU64>,
}

impl<C> Clone for SessionRegistry<C> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            generations: Arc::clone(&self.generations),
        }
    }
}

impl<C> Default for SessionRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> SessionRegistry<C> {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            generations: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Insert or replace a session, dropping any connection it had
    pub fn put(&self, session: Session) {
        self.entries
            .lock()
            .insert(session.id.clone(), SessionEntry::new(session));
    }

    /// Insert a session unless one with the same id exists
    ///
    /// Returns whether the session was inserted.
    pub fn put_if_absent(&self, session: Session) -> bool {
        let mut entries = self.entries.lock();
        if entries.contains_key(&session.id) {
            return false;
        }
        entries.insert(session.id.clone(), SessionEntry::new(session));
        true
    }

    /// Snapshot of one session
    #[must_use]
    pub fn get(&self, session_id: &SessionId) -> Option<Session> {
        self.entries
            .lock()
            .get(session_id)
            .map(|entry| entry.session.clone())
    }

    /// Remove a session and release its connection handle
    pub fn remove(&self, session_id: &SessionId) -> Option<Session> {
        self.entries
            .lock()
            .remove(session_id)
            .map(|entry| entry.session)
    }

    /// Snapshots of every session, oldest first
    #[must_use]
    pub fn list(&self) -> Vec<Session> {
        let mut sessions: Vec<Session> = self
            .entries
            .lock()
            .values()
            .map(|entry| entry.session.clone())
            .collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        sessions
    }

    /// Overwrite a session's status
    ///
    /// Returns false when the session is unknown.
    pub fn update_status(&self, session_id: &SessionId, status: SessionStatus) -> bool {
        self.update(session_id, |session| session.status = status)
            .is_some()
    }

    /// Run `f` on a session while holding the registry lock
    pub fn update<R>(&self, session_id: &SessionId, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        self.entries
            .lock()
            .get_mut(session_id)
            .map(|entry| f(&mut entry.session))
    }

    /// Install a new connection handle and return its generation
    ///
    /// Generations are unique across the registry and start at 1.
    pub fn attach_connection(&self, session_id: &SessionId, connection: Arc<C>) -> Option<u64> {
        self.entries.lock().get_mut(session_id).map(|entry| {
            entry.generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
            entry.connection = Some(connection);
            entry.generation
        })
    }

    /// Generation of the session's current connection
    #[must_use]
    pub fn generation(&self, session_id: &SessionId) -> Option<u64> {
        self.entries
            .lock()
            .get(session_id)
            .map(|entry| entry.generation)
    }

    /// Session state plus its connection, if one is attached
    #[must_use]
    pub fn lease(&self, session_id: &SessionId) -> Option<SessionLease<C>> {
        let entries = self.entries.lock();
        let entry = entries.get(session_id)?;
        let connection = entry.connection.as_ref()?;
        Some(SessionLease {
            session: entry.session.clone(),
            connection: Arc::clone(connection),
            send_lock: Arc::clone(&entry.send_lock),
        })
    }

    /// Ids and connections of every `Connected` session
    #[must_use]
    pub fn connected(&self) -> Vec<(SessionId, Arc<C>)> {
        self.entries
            .lock()
            .iter()
            .filter(|(_, entry)| entry.session.is_connected())
            .filter_map(|(id, entry)| {
                entry
                    .connection
                    .as_ref()
                    .map(|connection| (id.clone(), Arc::clone(connection)))
            })
            .collect()
    }

    /// Number of registered sessions
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no session is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
