use crate::config::StateForgeConfig;
use crate::identity::ClientIdentityResolver;
use crate::manager::StoreManager;
use crate::persistence::cache::MemoryCache;
use crate::persistence::factory::BackendFactory;
use crate::persistence::session::MemorySession;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub struct TestEnv {
    // Keeps the directory alive for the duration of the test.
    pub _temp_dir: TempDir,
    pub root: PathBuf,
    pub cache: Arc<MemoryCache>,
    pub session: Arc<MemorySession>,
    pub config: StateForgeConfig,
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
        let root = temp_dir.path().to_path_buf();
        let mut config = StateForgeConfig::default();
        config.set_storage_dir(root.clone());
        Self {
            _temp_dir: temp_dir,
            root,
            cache: Arc::new(MemoryCache::new()),
            session: Arc::new(MemorySession::new()),
            config,
        }
    }

    pub fn factory(&self) -> BackendFactory {
        BackendFactory::from_config(&self.config, self.cache.clone(), self.session.clone())
    }

    pub fn resolver(&self) -> ClientIdentityResolver {
        ClientIdentityResolver::from_config(&self.config)
    }

    pub fn manager(&self, client_id: &str) -> StoreManager {
        StoreManager::for_client(client_id, self.factory())
            .with_default_persistence(self.config.default.persistence.clone())
    }
}
