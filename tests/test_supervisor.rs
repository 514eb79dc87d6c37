//! Integration tests for `ConnectionSupervisor`

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use common::{eventually, open_connected, phone, relay_with, test_options};
use serde_json::json;
use session_relay::transport::loopback::LoopbackClient;
use session_relay::{
    ConnectionEvent, DisconnectReason, GroupFilter, GroupInfo, RelayError, RelayOptions,
    SessionId, SessionStatus,
};

fn status_of(relay: &session_relay::Relay<LoopbackClient>, id: &SessionId) -> Option<SessionStatus> {
    relay.supervisor().session(id).map(|s| s.status)
}

#[tokio::test(start_paused = true)]
async fn test_open_is_idempotent() {
    let client = Arc::new(LoopbackClient::new());
    let (relay, _) = relay_with(client.clone(), test_options());
    let session_id = open_connected(&relay, "s1").await;

    assert!(!relay.open(session_id.clone(), phone()).await.unwrap());
    assert_eq!(client.connect_attempts(&session_id), 1);
    assert_eq!(relay.sessions().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_session_starts_initializing() {
    let client = Arc::new(LoopbackClient::new().manual_open());
    let (relay, _) = relay_with(client.clone(), test_options());
    let session_id = SessionId::new("s1");

    assert!(relay.open(session_id.clone(), phone()).await.unwrap());
    let session = relay.supervisor().session(&session_id).unwrap();
    assert_eq!(session.status, SessionStatus::Initializing);
    assert_eq!(session.retry_count, 0);
    assert!(session.last_connected_at.is_none());

    assert!(client.emit(&session_id, ConnectionEvent::Opened));
    eventually("connected", || status_of(&relay, &session_id) == Some(SessionStatus::Connected)).await;
    assert!(relay.supervisor().session(&session_id).unwrap().last_connected_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_recoverable_close_reconnects_after_interval() {
    let client = Arc::new(LoopbackClient::new());
    let (relay, _) = relay_with(client.clone(), test_options());
    let session_id = open_connected(&relay, "s1").await;

    assert!(client.emit(&session_id, ConnectionEvent::Closed(DisconnectReason::Code(500))));
    eventually("disconnected", || {
        status_of(&relay, &session_id) == Some(SessionStatus::Disconnected)
    })
    .await;
    assert_eq!(relay.supervisor().session(&session_id).unwrap().retry_count, 1);

    tokio::time::sleep(Duration::from_secs(9)).await;
    assert_eq!(client.connect_attempts(&session_id), 1);
    assert_eq!(status_of(&relay, &session_id), Some(SessionStatus::Disconnected));

    eventually("reconnected", || status_of(&relay, &session_id) == Some(SessionStatus::Connected)).await;
    assert_eq!(client.connect_attempts(&session_id), 2);
    assert_eq!(relay.supervisor().session(&session_id).unwrap().retry_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_close_schedules_one_reconnect() {
    let client = Arc::new(LoopbackClient::new());
    let (relay, _) = relay_with(client.clone(), test_options());
    let session_id = open_connected(&relay, "s1").await;

    client.emit(&session_id, ConnectionEvent::Closed(DisconnectReason::Unknown));
    client.emit(&session_id, ConnectionEvent::Closed(DisconnectReason::Unknown));
    eventually("reconnected", || client.connect_attempts(&session_id) == 2).await;
    eventually("connected", || status_of(&relay, &session_id) == Some(SessionStatus::Connected)).await;

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(client.connect_attempts(&session_id), 2);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_ceiling_leaves_session_disconnected() {
    let client = Arc::new(LoopbackClient::new());
    let options = RelayOptions::builder()
        .pairing_settle_delay(Duration::from_millis(50))
        .max_reconnect_attempts(2)
        .build()
        .unwrap();
    let (relay, _) = relay_with(client.clone(), options);
    let session_id = open_connected(&relay, "s1").await;

    client.fail_next_connects(10);
    client.emit(&session_id, ConnectionEvent::Closed(DisconnectReason::Unknown));

    eventually("two reconnect attempts", || client.connect_attempts(&session_id) == 3).await;
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(client.connect_attempts(&session_id), 3);
    let session = relay.supervisor().session(&session_id).unwrap();
    assert_eq!(session.status, SessionStatus::Disconnected);
    assert_eq!(session.retry_count, 2);
}

#[tokio::test(start_paused = true)]
async fn test_unrecoverable_close_removes_session() {
    for reason in [DisconnectReason::LoggedOut, DisconnectReason::InvalidCredentials] {
        let client = Arc::new(LoopbackClient::new());
        let (relay, _) = relay_with(client.clone(), test_options());
        let session_id = open_connected(&relay, "s1").await;

        assert!(client.emit(&session_id, ConnectionEvent::Closed(reason)));
        eventually("session removed", || relay.supervisor().session(&session_id).is_none()).await;

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(client.connect_attempts(&session_id), 1, "{reason:?}");
        assert!(relay.sessions().is_empty());
    }
}

#[tokio::test(start_paused = true)]
async fn test_status_code_401_is_unrecoverable() {
    let client = Arc::new(LoopbackClient::new());
    let (relay, _) = relay_with(client.clone(), test_options());
    let session_id = open_connected(&relay, "s1").await;

    let reason = DisconnectReason::from_status_code(Some(401));
    client.emit(&session_id, ConnectionEvent::Closed(reason));
    eventually("session removed", || relay.supervisor().session(&session_id).is_none()).await;
}

#[tokio::test(start_paused = true)]
async fn test_credentials_forwarded_in_order() {
    let client = Arc::new(LoopbackClient::new());
    let (relay, store) = relay_with(client.clone(), test_options());
    let session_id = open_connected(&relay, "s1").await;

    for n in 1..=3 {
        client.emit(&session_id, ConnectionEvent::CredentialsUpdated(json!({ "n": n })));
    }
    eventually("three updates", || store.updates.lock().len() == 3).await;

    let updates = store.updates.lock().clone();
    let order: Vec<_> = updates.iter().map(|(_, payload)| payload["n"].clone()).collect();
    assert_eq!(order, vec![json!(1), json!(2), json!(3)]);
    assert!(updates.iter().all(|(id, _)| id == &session_id));
}

#[tokio::test(start_paused = true)]
async fn test_initial_connect_failure_removes_session() {
    let client = Arc::new(LoopbackClient::new());
    client.fail_next_connects(1);
    let (relay, _) = relay_with(client.clone(), test_options());
    let session_id = SessionId::new("s1");

    let result = relay.open(session_id.clone(), phone()).await;
    assert!(matches!(result, Err(RelayError::Connection(_))));
    assert!(relay.supervisor().session(&session_id).is_none());

    // A later open starts from scratch
    assert!(relay.open(session_id.clone(), phone()).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_pair_returns_code() {
    let client = Arc::new(LoopbackClient::new().with_pairing_code("ABCD-1234"));
    let (relay, _) = relay_with(client.clone(), test_options());

    let outcome = relay.pair("+91 98765-43210").await.unwrap();
    assert_eq!(outcome.phone_number.as_str(), "919876543210");
    assert_eq!(outcome.code.as_deref(), Some("ABCD-1234"));
    assert!(outcome.session_id.as_str().starts_with("perm_919876543210_"));
    assert!(relay.supervisor().session(&outcome.session_id).is_some());
}

#[tokio::test(start_paused = true)]
async fn test_pair_without_code() {
    let client = Arc::new(LoopbackClient::new());
    let (relay, _) = relay_with(client, test_options());

    let outcome = relay.pair("919876543210").await.unwrap();
    assert_eq!(outcome.code, None);
}

#[tokio::test(start_paused = true)]
async fn test_pair_rejects_phone_without_digits() {
    let client = Arc::new(LoopbackClient::new());
    let (relay, _) = relay_with(client.clone(), test_options());

    let result = relay.pair("not a number").await;
    assert!(matches!(result, Err(RelayError::Validation(_))));
    assert!(relay.sessions().is_empty());
}

fn sample_groups() -> HashMap<String, GroupInfo> {
    HashMap::from([
        (
            "g3@g.us".to_string(),
            GroupInfo {
                subject: Some("Zeta".to_string()),
                owner_id: Some("919876543210:4@s.whatsapp.net".to_string()),
                participant_count: 12,
            },
        ),
        (
            "g1@g.us".to_string(),
            GroupInfo {
                subject: Some("Alpha".to_string()),
                owner_id: Some("15550100@s.whatsapp.net".to_string()),
                participant_count: 3,
            },
        ),
        (
            "g2@g.us".to_string(),
            GroupInfo {
                subject: None,
                owner_id: None,
                participant_count: 0,
            },
        ),
    ])
}

#[tokio::test(start_paused = true)]
async fn test_groups_sorted_by_subject() {
    let client = Arc::new(LoopbackClient::new());
    client.set_groups(sample_groups());
    let (relay, _) = relay_with(client.clone(), test_options());
    let session_id = open_connected(&relay, "s1").await;

    let groups = relay.supervisor().groups(&session_id, GroupFilter::All).await.unwrap();
    let subjects: Vec<_> = groups.iter().map(|g| g.subject.as_str()).collect();
    assert_eq!(subjects, vec!["Alpha", "No Name", "Zeta"]);
    assert_eq!(groups.iter().filter(|g| g.is_owner).count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_groups_owned_filter() {
    let client = Arc::new(LoopbackClient::new());
    client.set_groups(sample_groups());
    let (relay, _) = relay_with(client.clone(), test_options());
    let session_id = open_connected(&relay, "s1").await;

    let owned = relay.supervisor().groups(&session_id, GroupFilter::Owned).await.unwrap();
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].id, "g3@g.us");
    assert_eq!(owned[0].participant_count, 12);
}

#[tokio::test(start_paused = true)]
async fn test_groups_require_connected_session() {
    let client = Arc::new(LoopbackClient::new().manual_open());
    let (relay, _) = relay_with(client.clone(), test_options());
    let session_id = SessionId::new("s1");
    relay.open(session_id.clone(), phone()).await.unwrap();

    let pending = relay.supervisor().groups(&session_id, GroupFilter::All).await;
    assert!(matches!(pending, Err(RelayError::SessionUnavailable(_))));

    let missing = relay.supervisor().groups(&SessionId::new("nope"), GroupFilter::All).await;
    assert!(matches!(missing, Err(RelayError::SessionNotFound(_))));
}

#[tokio::test(start_paused = true)]
async fn test_purge_ignores_later_events() {
    let client = Arc::new(LoopbackClient::new());
    let (relay, store) = relay_with(client.clone(), test_options());
    let session_id = open_connected(&relay, "s1").await;

    let purged = relay.supervisor().purge(&session_id).unwrap();
    assert_eq!(purged.status, SessionStatus::Connected);

    client.emit(&session_id, ConnectionEvent::Closed(DisconnectReason::Unknown));
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert!(relay.supervisor().session(&session_id).is_none());
    assert_eq!(client.connect_attempts(&session_id), 1);
    assert!(store.updates.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_pending_reconnect() {
    let client = Arc::new(LoopbackClient::new());
    let (relay, _) = relay_with(client.clone(), test_options());
    let session_id = open_connected(&relay, "s1").await;

    client.emit(&session_id, ConnectionEvent::Closed(DisconnectReason::Unknown));
    eventually("disconnected", || {
        status_of(&relay, &session_id) == Some(SessionStatus::Disconnected)
    })
    .await;

    relay.shutdown().await;
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(client.connect_attempts(&session_id), 1);
}

#[tokio::test(start_paused = true)]
async fn test_superseded_connection_events() {
    let client = Arc::new(LoopbackClient::new());
    let (relay, store) = relay_with(client.clone(), test_options());
    let session_id = open_connected(&relay, "s1").await;

    client.emit(&session_id, ConnectionEvent::Closed(DisconnectReason::Unknown));
    eventually("reconnected", || {
        client.connect_attempts(&session_id) == 2
            && status_of(&relay, &session_id) == Some(SessionStatus::Connected)
    })
    .await;

    // State events from the first connection no longer apply
    assert!(client.emit_to_attempt(&session_id, 1, ConnectionEvent::Closed(DisconnectReason::Unknown)));
    assert!(client.emit_to_attempt(&session_id, 1, ConnectionEvent::Closed(DisconnectReason::LoggedOut)));
    assert!(client.emit_to_attempt(&session_id, 1, ConnectionEvent::Opened));
    tokio::time::sleep(Duration::from_secs(30)).await;

    let session = relay.supervisor().session(&session_id).unwrap();
    assert_eq!(session.status, SessionStatus::Connected);
    assert_eq!(session.retry_count, 0);
    assert_eq!(client.connect_attempts(&session_id), 2);

    // Credentials from it are still persisted
    assert!(client.emit_to_attempt(&session_id, 1, ConnectionEvent::CredentialsUpdated(json!({ "n": 1 }))));
    eventually("stale credentials persisted", || store.updates.lock().len() == 1).await;
    assert_eq!(store.updates.lock()[0], (session_id.clone(), json!({ "n": 1 })));
}

#[tokio::test(start_paused = true)]
async fn test_credentials_persisted_after_purge() {
    let client = Arc::new(LoopbackClient::new());
    let (relay, store) = relay_with(client.clone(), test_options());
    let session_id = open_connected(&relay, "s1").await;
    relay.supervisor().purge(&session_id);

    assert!(client.emit(&session_id, ConnectionEvent::CredentialsUpdated(json!({ "n": 1 }))));
    assert!(client.emit(&session_id, ConnectionEvent::Closed(DisconnectReason::Unknown)));
    assert!(client.emit(&session_id, ConnectionEvent::CredentialsUpdated(json!({ "n": 2 }))));
    eventually("both updates persisted", || store.updates.lock().len() == 2).await;

    let payloads: Vec<_> = store.updates.lock().iter().map(|(_, p)| p.clone()).collect();
    assert_eq!(payloads, vec![json!({ "n": 1 }), json!({ "n": 2 })]);
    assert!(relay.supervisor().session(&session_id).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_reopened_session_ignores_old_connection() {
    let client = Arc::new(LoopbackClient::new());
    let (relay, _) = relay_with(client.clone(), test_options());
    let session_id = open_connected(&relay, "s1").await;

    relay.supervisor().purge(&session_id);
    let session_id = open_connected(&relay, "s1").await;
    assert_eq!(client.connect_attempts(&session_id), 2);

    assert!(client.emit_to_attempt(&session_id, 1, ConnectionEvent::Closed(DisconnectReason::LoggedOut)));
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(status_of(&relay, &session_id), Some(SessionStatus::Connected));
}
