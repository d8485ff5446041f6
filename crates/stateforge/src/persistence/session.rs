use super::{PersistenceBackend, PersistenceKind};
use crate::error::Result;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Session-scoped key/value storage. Entries live as long as the session.
pub trait SessionRepository: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;

    fn put(&self, key: &str, value: Value) -> Result<()>;

    fn forget(&self, key: &str) -> Result<()>;

    fn keys(&self) -> Result<Vec<String>>;
}

/// In-process session bag.
#[derive(Default)]
pub struct MemorySession {
    values: Mutex<HashMap<String, Value>>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every entry, as when the session ends.
    pub fn invalidate(&self) {
        self.values.lock().clear();
    }
}

impl SessionRepository for MemorySession {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn put(&self, key: &str, value: Value) -> Result<()> {
        self.values.lock().insert(key.to_string(), value);
        Ok(())
    }

    fn forget(&self, key: &str) -> Result<()> {
        self.values.lock().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.values.lock().keys().cloned().collect())
    }
}

/// `<prefix>.<client_id>.<store_name>`
pub fn session_key(prefix: &str, client_id: &str, store_name: &str) -> String {
    format!("{}.{}.{}", prefix, client_id, store_name)
}

/// Deletes every session key belonging to `client_id` under `prefix`.
pub fn forget_client_keys(
    session: &dyn SessionRepository,
    prefix: &str,
    client_id: &str,
) -> Result<usize> {
    let scope = format!("{}.{}.", prefix, client_id);
    let mut removed = 0;
    for key in session.keys()? {
        if key.starts_with(&scope) {
            session.forget(&key)?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Snapshot stored in the session, without expiry of its own.
pub struct SessionBackend {
    session: Arc<dyn SessionRepository>,
    key: String,
}

impl SessionBackend {
    pub fn new(session: Arc<dyn SessionRepository>, key: String) -> Self {
        Self { session, key }
    }
}

impl PersistenceBackend for SessionBackend {
    fn kind(&self) -> PersistenceKind {
        PersistenceKind::Session
    }

    fn address(&self) -> String {
        self.key.clone()
    }

    fn read_raw(&self) -> Result<Option<Value>> {
        self.session.get(&self.key)
    }

    fn write_raw(&self, payload: Value) -> Result<()> {
        self.session.put(&self.key, payload)
    }

    fn forget(&self) -> Result<()> {
        self.session.forget(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::State;
    use serde_json::json;

    #[test]
    fn key_layout() {
        assert_eq!(session_key("sf", "c1", "Cart"), "sf.c1.Cart");
    }

    #[test]
    fn persist_and_load_through_session() {
        let session = Arc::new(MemorySession::new());
        let backend = SessionBackend::new(session.clone(), session_key("sf", "c1", "Cart"));
        backend.persist(&State::new().with("items", json!(["a"]))).unwrap();

        let snap = backend.load().unwrap().unwrap();
        assert_eq!(snap.state.get("items"), Some(&json!(["a"])));
    }

    #[test]
    fn invalidate_drops_snapshot() {
        let session = Arc::new(MemorySession::new());
        let backend = SessionBackend::new(session.clone(), session_key("sf", "c1", "Cart"));
        backend.persist(&State::new().with("items", json!([]))).unwrap();

        session.invalidate();
        assert!(backend.load().unwrap().is_none());
    }

    #[test]
    fn forget_client_keys_is_scoped() {
        let session = MemorySession::new();
        session.put("sf.c1.A", json!(1)).unwrap();
        session.put("sf.c1.B", json!(1)).unwrap();
        session.put("sf.c10.A", json!(1)).unwrap();
        session.put("other", json!(1)).unwrap();

        assert_eq!(forget_client_keys(&session, "sf", "c1").unwrap(), 2);
        let mut keys = session.keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["other".to_string(), "sf.c10.A".to_string()]);
    }
}
