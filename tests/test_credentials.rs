//! Tests for `FileCredentialStore`

use serde_json::json;
use session_relay::{CredentialStore, FileCredentialStore, RelayError, SessionId};
use tempfile::TempDir;

#[test]
fn test_save_and_load() {
    let dir = TempDir::new().unwrap();
    let store = FileCredentialStore::new(dir.path());
    let id = SessionId::new("perm_15550100_1_abcde");

    assert_eq!(store.load(&id).unwrap(), None);

    let payload = json!({ "me": { "id": "15550100@s.whatsapp.net" }, "registered": true });
    store.save(&id, &payload).unwrap();

    let path = store.path_for(&id);
    assert!(path.ends_with("perm_15550100_1_abcde/creds.json"));
    assert!(path.exists());
    assert_eq!(store.load(&id).unwrap(), Some(payload));
}

#[test]
fn test_save_overwrites_previous_payload() {
    let dir = TempDir::new().unwrap();
    let store = FileCredentialStore::new(dir.path().join("nested"));
    let id = SessionId::new("s1");

    store.save(&id, &json!({ "n": 1 })).unwrap();
    store.save(&id, &json!({ "n": 2 })).unwrap();

    assert_eq!(store.load(&id).unwrap(), Some(json!({ "n": 2 })));
    let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("nested").join("s1"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(leftovers, vec!["creds.json"]);
}

#[test]
fn test_rejects_unsafe_session_ids() {
    let dir = TempDir::new().unwrap();
    let store = FileCredentialStore::new(dir.path());

    for bad in ["", ".", "..", "../escape", "a/b"] {
        let result = store.save(&SessionId::new(bad), &json!({}));
        assert!(matches!(result, Err(RelayError::Credentials(_))), "{bad:?}");
    }
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_corrupt_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let store = FileCredentialStore::new(dir.path());
    let id = SessionId::new("s1");

    let path = store.path_for(&id);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{ not json").unwrap();

    assert!(matches!(store.load(&id), Err(RelayError::Json(_))));
}
