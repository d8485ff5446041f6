use super::cache::{cache_key, CacheBackend, CacheRepository};
use super::file::{remove_client_files, FileBackend};
use super::session::{forget_client_keys, session_key, SessionBackend, SessionRepository};
use super::{PersistenceBackend, PersistenceKind};
use crate::config::StateForgeConfig;
use crate::error::Result;
use crate::manager::StoreOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Builds persistence backends for `(client_id, store_name)` pairs.
///
/// Holds the configured defaults plus shared handles to the cache and session
/// repositories. Cheap to clone; one clone per request is the expected usage.
#[derive(Clone)]
pub struct BackendFactory {
    storage_dir: PathBuf,
    cache: Arc<dyn CacheRepository>,
    session: Arc<dyn SessionRepository>,
    cache_prefix: String,
    cache_ttl: Duration,
    session_prefix: String,
}

impl BackendFactory {
    pub fn new(
        storage_dir: PathBuf,
        cache: Arc<dyn CacheRepository>,
        session: Arc<dyn SessionRepository>,
    ) -> Self {
        Self {
            storage_dir,
            cache,
            session,
            cache_prefix: "stateforge".to_string(),
            cache_ttl: Duration::from_secs(60 * 60 * 24 * 30),
            session_prefix: "stateforge".to_string(),
        }
    }

    pub fn from_config(
        config: &StateForgeConfig,
        cache: Arc<dyn CacheRepository>,
        session: Arc<dyn SessionRepository>,
    ) -> Self {
        Self {
            storage_dir: config.storage_dir(),
            cache,
            session,
            cache_prefix: config.persistence.cache.prefix.clone(),
            cache_ttl: config.cache_ttl(),
            session_prefix: config.persistence.session.prefix.clone(),
        }
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// `None` for [`PersistenceKind::None`]; otherwise a backend addressed by
    /// `(client_id, store_name)`, with `options` overriding prefixes and TTL.
    pub fn build(
        &self,
        kind: PersistenceKind,
        client_id: &str,
        store_name: &str,
        options: &StoreOptions,
    ) -> Option<Box<dyn PersistenceBackend>> {
        match kind {
            PersistenceKind::File => Some(Box::new(FileBackend::for_store(
                &self.storage_dir,
                client_id,
                store_name,
            ))),
            PersistenceKind::Cache => {
                let prefix = options.cache_prefix.as_deref().unwrap_or(&self.cache_prefix);
                let ttl = options.cache_ttl.unwrap_or(self.cache_ttl);
                Some(Box::new(CacheBackend::new(
                    self.cache.clone(),
                    cache_key(prefix, client_id, store_name),
                    Some(ttl),
                )))
            }
            PersistenceKind::Session => {
                let prefix = options
                    .session_prefix
                    .as_deref()
                    .unwrap_or(&self.session_prefix);
                Some(Box::new(SessionBackend::new(
                    self.session.clone(),
                    session_key(prefix, client_id, store_name),
                )))
            }
            PersistenceKind::None => None,
        }
    }

    /// Best-effort removal of a store's snapshot from all three media, at
    /// their default addresses.
    pub fn forget_store(&self, client_id: &str, store_name: &str) -> Result<()> {
        let options = StoreOptions::default();
        for kind in [
            PersistenceKind::File,
            PersistenceKind::Cache,
            PersistenceKind::Session,
        ] {
            if let Some(backend) = self.build(kind, client_id, store_name, &options) {
                backend.forget()?;
            }
        }
        Ok(())
    }

    /// Removes every file and session entry of `client_id`, plus the cache
    /// entries of `store_names` (cache keys cannot be enumerated).
    pub fn forget_client<'a>(
        &self,
        client_id: &str,
        store_names: impl IntoIterator<Item = &'a str>,
    ) -> Result<()> {
        let files = remove_client_files(&self.storage_dir, client_id)?;
        let sessions = forget_client_keys(self.session.as_ref(), &self.session_prefix, client_id)?;
        for name in store_names {
            self.cache
                .forget(&cache_key(&self.cache_prefix, client_id, name))?;
        }
        tracing::debug!(%client_id, files, sessions, "cleared client persistence");
        Ok(())
    }
}
