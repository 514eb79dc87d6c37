//! Credential persistence
//!
//! The messaging client reports updated credential material through
//! `ConnectionEvent::CredentialsUpdated`. The supervisor hands every update,
//! in arrival order, to a [`CredentialStore`] before handling the next event.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{RelayError, Result};
use crate::types::identifiers::SessionId;

/// File name used for each session's credentials
pub const CREDENTIALS_FILE: &str = "creds.json";

/// Durable storage for per-session credential material
pub trait CredentialStore: Send + Sync + 'static {
    /// Persist the latest credential payload for a session
    ///
    /// Called synchronously from the session's event loop and must return
    /// only once the payload is durable.
    fn save(&self, session_id: &SessionId, payload: &serde_json::Value) -> Result<()>;
}

/// Stores credentials as `<root>/<session_id>/creds.json`
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    root: PathBuf,
}

impl FileCredentialStore {
    /// Create a store rooted at `root` (created lazily)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a session's credential file
    #[must_use]
    pub fn path_for(&self, session_id: &SessionId) -> PathBuf {
        self.root.join(session_id.as_str()).join(CREDENTIALS_FILE)
    }

    /// Read back the stored payload, if any
    pub fn load(&self, session_id: &SessionId) -> Result<Option<serde_json::Value>> {
        let path = self.path_for(session_id);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }
}

impl CredentialStore for FileCredentialStore {
    fn save(&self, session_id: &SessionId, payload: &serde_json::Value) -> Result<()> {
        let id = session_id.as_str();
        if id.is_empty() || id.contains(['/', '\\']) || id == "." || id == ".." {
            return Err(RelayError::credentials(format!(
                "session id '{id}' is not usable as a directory name"
            )));
        }

        let dir = self.root.join(id);
        fs::create_dir_all(&dir)?;

        let target = dir.join(CREDENTIALS_FILE);
        let staging = dir.join(format!("{CREDENTIALS_FILE}.tmp"));

        let mut file = fs::File::create(&staging)?;
        file.write_all(serde_json::to_string_pretty(payload)?.as_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&staging, &target)?;
        Ok(())
    }
}
