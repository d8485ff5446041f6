use chrono::{Duration, Utc};
use stateforge::identity::{ClientRecord, ClientRegistry};
use stateforge::persistence::file::FileBackend;
use stateforge::{ClientIdentityResolver, PersistenceBackend, State};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn seed_client(dir: &Path, registry: &mut ClientRegistry, client_id: &str, days_ago: i64) {
    let seen = Utc::now() - Duration::days(days_ago);
    registry.insert(ClientRecord {
        client_id: client_id.to_string(),
        fingerprint: format!("fp-{client_id}"),
        created_at: seen,
        last_seen: seen,
        user_agent: "ua".to_string(),
        client_ip: "127.0.0.1".to_string(),
    });
    for store in ["Counter", "Cart"] {
        FileBackend::for_store(dir, client_id, store)
            .persist(&State::new().with("n", 1))
            .unwrap();
    }
}

#[test]
fn only_expired_clients_and_their_files_go() {
    let dir = tempdir().unwrap();
    let mut registry = ClientRegistry::load(dir.path());
    seed_client(dir.path(), &mut registry, "client_old", 40);
    seed_client(dir.path(), &mut registry, "client_new", 5);
    registry.save().unwrap();

    let resolver = ClientIdentityResolver::new(dir.path().to_path_buf());
    assert_eq!(resolver.cleanup(Duration::days(30)).unwrap(), 1);

    let registry = ClientRegistry::load(dir.path());
    assert!(registry.get("client_old").is_none());
    assert!(registry.get("client_new").is_some());

    let mut remaining: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    remaining.sort();
    assert_eq!(
        remaining,
        vec!["client_new_Cart.json", "client_new_Counter.json", "clients.json"]
    );
}

#[test]
fn cleanup_on_empty_directory_removes_nothing() {
    let dir = tempdir().unwrap();
    let resolver = ClientIdentityResolver::new(dir.path().to_path_buf());
    assert_eq!(resolver.cleanup(Duration::days(30)).unwrap(), 0);
}

#[test]
fn corrupt_registry_is_treated_as_empty() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("clients.json"), "{ not json").unwrap();

    let resolver = ClientIdentityResolver::new(dir.path().to_path_buf());
    assert_eq!(resolver.cleanup(Duration::days(30)).unwrap(), 0);
    assert!(resolver.clients().is_empty());
}
