use super::{PersistenceBackend, PersistenceKind};
use crate::error::{Result, StateForgeError};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Key/value cache with per-entry expiry.
///
/// The host application can plug its own cache in; [`MemoryCache`] is the
/// built-in, process-local implementation.
pub trait CacheRepository: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Stores `value` under `key`. `None` never expires.
    fn put(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()>;

    fn forget(&self, key: &str) -> Result<()>;

    fn has(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}

struct CacheEntry {
    value: Value,
    expires_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// In-process cache. Expired entries are evicted on read of their key and
/// swept on every write.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    simulate_write_error: Mutex<bool>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Utc::now();
        self.entries
            .lock()
            .values()
            .filter(|e| !e.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enable write error simulation for testing error handling.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        *self.simulate_write_error.lock() = simulate;
    }
}

impl CacheRepository for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let mut entries = self.entries.lock();
        let expired = match entries.get(key) {
            None => return Ok(None),
            Some(entry) => entry.is_expired(Utc::now()),
        };
        if expired {
            entries.remove(key);
            return Ok(None);
        }
        Ok(entries.get(key).map(|e| e.value.clone()))
    }

    fn put(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()> {
        if *self.simulate_write_error.lock() {
            return Err(StateForgeError::Store("Simulated write error".to_string()));
        }
        let now = Utc::now();
        // An unrepresentable TTL is treated as "never expires".
        let expires_at = ttl.and_then(|ttl| {
            chrono::Duration::from_std(ttl)
                .ok()
                .and_then(|d| now.checked_add_signed(d))
        });
        let mut entries = self.entries.lock();
        entries.retain(|_, entry| !entry.is_expired(now));
        entries.insert(key.to_string(), CacheEntry { value, expires_at });
        Ok(())
    }

    fn forget(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// `<prefix>:<client_id>:<store_name>`
pub fn cache_key(prefix: &str, client_id: &str, store_name: &str) -> String {
    format!("{}:{}:{}", prefix, client_id, store_name)
}

/// Snapshot stored in a [`CacheRepository`] with a TTL.
pub struct CacheBackend {
    cache: Arc<dyn CacheRepository>,
    key: String,
    ttl: Option<Duration>,
}

impl CacheBackend {
    pub fn new(cache: Arc<dyn CacheRepository>, key: String, ttl: Option<Duration>) -> Self {
        Self { cache, key, ttl }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }
}

impl PersistenceBackend for CacheBackend {
    fn kind(&self) -> PersistenceKind {
        PersistenceKind::Cache
    }

    fn address(&self) -> String {
        self.key.clone()
    }

    fn read_raw(&self) -> Result<Option<Value>> {
        self.cache.get(&self.key)
    }

    fn write_raw(&self, payload: Value) -> Result<()> {
        self.cache.put(&self.key, payload, self.ttl)
    }

    fn forget(&self) -> Result<()> {
        self.cache.forget(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::State;
    use serde_json::json;

    fn backend(cache: &Arc<MemoryCache>, ttl: Option<Duration>) -> CacheBackend {
        CacheBackend::new(cache.clone(), cache_key("stateforge", "c1", "Counter"), ttl)
    }

    #[test]
    fn key_layout() {
        assert_eq!(cache_key("sf", "c1", "Cart"), "sf:c1:Cart");
    }

    #[test]
    fn persist_and_load_through_cache() {
        let cache = Arc::new(MemoryCache::new());
        let backend = backend(&cache, Some(Duration::from_secs(60)));
        backend.persist(&State::new().with("count", 4)).unwrap();

        assert!(cache.has("stateforge:c1:Counter").unwrap());
        let snap = backend.load().unwrap().unwrap();
        assert_eq!(snap.state.get("count"), Some(&json!(4)));
    }

    #[test]
    fn expired_entries_are_absent() {
        let cache = Arc::new(MemoryCache::new());
        let backend = backend(&cache, Some(Duration::ZERO));
        backend.persist(&State::new().with("count", 4)).unwrap();

        assert!(backend.load().unwrap().is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn writes_sweep_unread_expired_entries() {
        let cache = MemoryCache::new();
        for i in 0..10 {
            cache
                .put(&format!("stale:{i}"), json!(i), Some(Duration::ZERO))
                .unwrap();
        }
        cache.put("fresh", json!("x"), None).unwrap();

        let stored: Vec<String> = cache.entries.lock().keys().cloned().collect();
        assert_eq!(stored, vec!["fresh".to_string()]);
    }

    #[test]
    fn no_ttl_never_expires() {
        let cache = MemoryCache::new();
        cache.put("k", json!(1), None).unwrap();
        assert_eq!(cache.get("k").unwrap(), Some(json!(1)));
    }

    #[test]
    fn write_errors_propagate() {
        let cache = Arc::new(MemoryCache::new());
        cache.set_simulate_write_error(true);
        let backend = backend(&cache, None);

        let result = backend.persist(&State::new().with("count", 1));
        assert!(matches!(result, Err(StateForgeError::Store(_))));
    }

    #[test]
    fn forget_removes_entry() {
        let cache = Arc::new(MemoryCache::new());
        let backend = backend(&cache, None);
        backend.persist(&State::new().with("count", 1)).unwrap();
        backend.forget().unwrap();
        assert!(backend.load().unwrap().is_none());
    }
}
