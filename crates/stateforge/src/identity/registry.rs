use crate::error::Result;
use crate::persistence::file::write_json_atomic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const REGISTRY_FILE: &str = "clients.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub client_id: String,
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    #[serde(default)]
    pub user_agent: String,
    #[serde(default, alias = "ip")]
    pub client_ip: String,
}

/// The per-installation `clients.json`, mapping client id to record.
///
/// Loading is lenient: a missing, unreadable or corrupt file is an empty
/// registry. Losing the registry only costs fingerprint matches, never data.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    path: PathBuf,
    clients: BTreeMap<String, ClientRecord>,
}

impl ClientRegistry {
    pub fn load(dir: &Path) -> Self {
        let path = dir.join(REGISTRY_FILE);
        let clients = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "corrupt client registry, starting empty");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable client registry, starting empty");
                BTreeMap::new()
            }
        };
        Self { path, clients }
    }

    pub fn save(&self) -> Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        write_json_atomic(dir, &self.path, &self.clients)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, client_id: &str) -> Option<&ClientRecord> {
        self.clients.get(client_id)
    }

    /// First record with a matching fingerprint. Collisions are tolerated.
    pub fn find_by_fingerprint_mut(&mut self, fingerprint: &str) -> Option<&mut ClientRecord> {
        self.clients
            .values_mut()
            .find(|record| record.fingerprint == fingerprint)
    }

    pub fn insert(&mut self, record: ClientRecord) {
        self.clients.insert(record.client_id.clone(), record);
    }

    /// Removes and returns every record last seen before `cutoff`.
    pub fn remove_seen_before(&mut self, cutoff: DateTime<Utc>) -> Vec<ClientRecord> {
        let expired: Vec<String> = self
            .clients
            .values()
            .filter(|r| r.last_seen < cutoff)
            .map(|r| r.client_id.clone())
            .collect();
        expired
            .into_iter()
            .filter_map(|id| self.clients.remove(&id))
            .collect()
    }

    pub fn records(&self) -> impl Iterator<Item = &ClientRecord> {
        self.clients.values()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::tempdir;

    fn record(id: &str, fingerprint: &str, last_seen: DateTime<Utc>) -> ClientRecord {
        ClientRecord {
            client_id: id.to_string(),
            fingerprint: fingerprint.to_string(),
            created_at: last_seen,
            last_seen,
            user_agent: "test-agent".to_string(),
            client_ip: "127.0.0.1".to_string(),
        }
    }

    #[test]
    fn missing_registry_is_empty() {
        let dir = tempdir().unwrap();
        assert!(ClientRegistry::load(dir.path()).is_empty());
    }

    #[test]
    fn corrupt_registry_is_empty() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(REGISTRY_FILE), "[[[").unwrap();
        assert!(ClientRegistry::load(dir.path()).is_empty());
    }

    #[test]
    fn save_and_reload() {
        let dir = tempdir().unwrap();
        let mut registry = ClientRegistry::load(dir.path());
        registry.insert(record("client_a", "fp", Utc::now()));
        registry.save().unwrap();

        let reloaded = ClientRegistry::load(dir.path());
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.get("client_a").unwrap().fingerprint, "fp");
    }

    #[test]
    fn accepts_legacy_ip_field() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(REGISTRY_FILE),
            r#"{"client_x": {"client_id": "client_x", "fingerprint": "f",
                "created_at": "2024-01-01T00:00:00Z", "last_seen": "2024-01-02T00:00:00Z",
                "user_agent": "ua", "ip": "10.0.0.1"}}"#,
        )
        .unwrap();

        let registry = ClientRegistry::load(dir.path());
        assert_eq!(registry.get("client_x").unwrap().client_ip, "10.0.0.1");
    }

    #[test]
    fn remove_seen_before_splits_on_cutoff() {
        let dir = tempdir().unwrap();
        let now = Utc::now();
        let mut registry = ClientRegistry::load(dir.path());
        registry.insert(record("old", "f1", now - Duration::days(40)));
        registry.insert(record("new", "f2", now - Duration::days(5)));

        let removed = registry.remove_seen_before(now - Duration::days(30));
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].client_id, "old");
        assert!(registry.get("new").is_some());
    }
}
