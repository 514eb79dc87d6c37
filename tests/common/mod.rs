//! Shared helpers for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use session_relay::transport::loopback::LoopbackClient;
use session_relay::{
    CredentialStore, PhoneNumber, Relay, RelayOptions, Result, SessionId, SessionStatus,
};

/// Credential store that remembers every update in order
#[derive(Default)]
pub struct RecordingStore {
    pub updates: Mutex<Vec<(SessionId, serde_json::Value)>>,
}

impl CredentialStore for RecordingStore {
    fn save(&self, session_id: &SessionId, payload: &serde_json::Value) -> Result<()> {
        self.updates
            .lock()
            .push((session_id.clone(), payload.clone()));
        Ok(())
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn test_options() -> RelayOptions {
    RelayOptions::builder()
        .pairing_settle_delay(Duration::from_millis(50))
        .build()
        .unwrap()
}

pub fn relay_with(
    client: Arc<LoopbackClient>,
    options: RelayOptions,
) -> (Relay<LoopbackClient>, Arc<RecordingStore>) {
    init_logging();
    let store = Arc::new(RecordingStore::default());
    let relay = Relay::new(client, store.clone(), options);
    (relay, store)
}

/// Poll `condition` on virtual time (10ms steps, 60s budget)
pub async fn eventually<F: Fn() -> bool>(what: &str, condition: F) {
    for _ in 0..6000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

pub fn phone() -> PhoneNumber {
    PhoneNumber::normalize("919876543210").unwrap()
}

/// Open `id` and wait until it is connected
pub async fn open_connected(relay: &Relay<LoopbackClient>, id: &str) -> SessionId {
    let session_id = SessionId::new(id);
    assert!(relay.open(session_id.clone(), phone()).await.unwrap());
    eventually("session connected", || {
        relay
            .supervisor()
            .session(&session_id)
            .is_some_and(|s| s.status == SessionStatus::Connected)
    })
    .await;
    session_id
}
