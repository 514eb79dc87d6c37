//! Tests for `SessionRegistry` and `TaskRegistry`

use std::sync::Arc;
use std::time::Duration;

use session_relay::{
    PhoneNumber, Session, SessionId, SessionRegistry, SessionStatus, Target, Task, TaskId,
    TaskRegistry, TaskStatus,
};

fn session(id: &str) -> Session {
    Session::new(SessionId::new(id), PhoneNumber::normalize("15550100").unwrap())
}

#[test]
fn test_session_put_get_remove() {
    let registry: SessionRegistry<()> = SessionRegistry::new();
    let id = SessionId::new("s1");

    registry.put(session("s1"));
    assert_eq!(registry.get(&id).unwrap().status, SessionStatus::Initializing);
    assert!(!registry.put_if_absent(session("s1")));
    assert_eq!(registry.len(), 1);

    assert!(registry.update_status(&id, SessionStatus::Disconnected));
    assert_eq!(registry.get(&id).unwrap().status, SessionStatus::Disconnected);
    assert!(!registry.update_status(&SessionId::new("missing"), SessionStatus::Connected));

    assert!(registry.remove(&id).is_some());
    assert!(registry.get(&id).is_none());
    assert!(registry.is_empty());
}

#[test]
fn test_session_list_is_oldest_first() {
    let registry: SessionRegistry<()> = SessionRegistry::new();
    registry.put(session("b"));
    std::thread::sleep(Duration::from_millis(2));
    registry.put(session("a"));

    let ids: Vec<_> = registry.list().into_iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![SessionId::new("b"), SessionId::new("a")]);
}

#[test]
fn test_connections_and_generations() {
    let registry: SessionRegistry<&'static str> = SessionRegistry::new();
    let id = SessionId::new("s1");
    registry.put(session("s1"));

    assert!(registry.lease(&id).is_none());
    assert_eq!(registry.attach_connection(&id, Arc::new("first")), Some(1));
    assert_eq!(registry.attach_connection(&id, Arc::new("second")), Some(2));
    assert_eq!(registry.generation(&id), Some(2));
    assert_eq!(*registry.lease(&id).unwrap().connection, "second");

    // Only connected sessions are offered for keep-alive
    assert!(registry.connected().is_empty());
    registry.update_status(&id, SessionStatus::Connected);
    assert_eq!(registry.connected().len(), 1);

    assert_eq!(registry.attach_connection(&SessionId::new("missing"), Arc::new("x")), None);
}

#[test]
fn test_registry_clones_share_state() {
    let registry: SessionRegistry<()> = SessionRegistry::new();
    let clone = registry.clone();
    clone.put(session("s1"));
    assert!(registry.get(&SessionId::new("s1")).is_some());
}

#[test]
fn test_concurrent_updates_are_not_lost() {
    let registry: SessionRegistry<()> = SessionRegistry::new();
    let id = SessionId::new("s1");
    registry.put(session("s1"));

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            let id = id.clone();
            std::thread::spawn(move || {
                for _ in 0..1000 {
                    registry.update(&id, |s| s.retry_count += 1);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(registry.get(&id).unwrap().retry_count, 8000);
}

#[test]
fn test_task_registry() {
    let registry = TaskRegistry::new();
    let id = TaskId::new("t1");
    registry.put(Task::new(
        id.clone(),
        SessionId::new("s1"),
        Target::individual("15550100"),
        vec!["a".to_string()],
        None,
        Duration::from_secs(1),
    ));

    assert!(registry.is_running(&id));
    assert_eq!(registry.running(), vec![id.clone()]);

    registry.update(&id, |task| task.request_stop());
    assert!(!registry.is_running(&id));
    assert!(registry.running().is_empty());
    assert_eq!(registry.get(&id).unwrap().status, TaskStatus::StopRequested);
    assert_eq!(registry.list().len(), 1);

    let removed = registry.remove(&id).unwrap();
    assert_eq!(removed.task_id, id);
    assert!(registry.get(&id).is_none());
    assert!(registry.is_empty());
    assert!(registry.take_handle(&id).is_none());
}

#[test]
fn test_recreated_session_gets_fresh_generation() {
    let registry: SessionRegistry<()> = SessionRegistry::new();
    let id = SessionId::new("s1");

    registry.put(session("s1"));
    assert_eq!(registry.attach_connection(&id, Arc::new(())), Some(1));
    registry.remove(&id);

    assert!(registry.put_if_absent(session("s1")));
    assert_eq!(registry.generation(&id), Some(0));
    assert_eq!(registry.attach_connection(&id, Arc::new(())), Some(2));

    // Clones draw from the same counter
    let other = SessionId::new("s2");
    let clone = registry.clone();
    clone.put(session("s2"));
    assert_eq!(clone.attach_connection(&other, Arc::new(())), Some(3));
}
