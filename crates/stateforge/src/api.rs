//! # API Facade
//!
//! [`StateForge`] is the single entry point a host application holds for its
//! whole lifetime. It owns the configuration, the identity resolver, the shared
//! cache and session repositories, and the registry of store definitions. Per
//! request it hands out a fresh [`StoreManager`]:
//!
//! ```text
//! let forge = StateForge::new(config, cache, session);   // at startup
//!
//! let mut stores = forge.begin_request(&request)?;        // per request
//! stores.create(Counter, &StoreOptions::default())?.set_state(inc)?;
//! if let Some(cookie) = stores.pending_cookie() { /* Set-Cookie */ }
//! ```
//!
//! The facade does no I/O of its own beyond what the resolver and the backends
//! do, and never prints. Administrative entry points (`cleanup`, `clients`) are
//! here so the CLI and a scheduler share one code path.

use crate::config::StateForgeConfig;
use crate::error::Result;
use crate::identity::registry::ClientRecord;
use crate::identity::{ClientIdentityResolver, ClientRequest};
use crate::manager::StoreManager;
use crate::persistence::cache::CacheRepository;
use crate::persistence::factory::BackendFactory;
use crate::persistence::session::SessionRepository;
use crate::registry::StoreRegistry;
use crate::store::StoreDefinition;
use std::sync::Arc;

pub struct StateForge {
    config: StateForgeConfig,
    resolver: ClientIdentityResolver,
    factory: BackendFactory,
    registry: StoreRegistry,
}

impl StateForge {
    pub fn new(
        config: StateForgeConfig,
        cache: Arc<dyn CacheRepository>,
        session: Arc<dyn SessionRepository>,
    ) -> Self {
        let resolver = ClientIdentityResolver::from_config(&config);
        let factory = BackendFactory::from_config(&config, cache, session);
        Self {
            config,
            resolver,
            factory,
            registry: StoreRegistry::new(),
        }
    }

    pub fn config(&self) -> &StateForgeConfig {
        &self.config
    }

    pub fn resolver(&self) -> &ClientIdentityResolver {
        &self.resolver
    }

    pub fn registry(&self) -> &StoreRegistry {
        &self.registry
    }

    /// Makes `definition` available to [`StoreManager::create_named`].
    pub fn register<D: StoreDefinition>(&mut self, definition: D) -> &mut Self {
        self.registry.register(definition);
        self
    }

    /// Resolves the client and returns a manager scoped to this request.
    pub fn begin_request(&self, request: &ClientRequest) -> Result<StoreManager> {
        Ok(StoreManager::new(&self.resolver, request, self.factory.clone())?
            .with_default_persistence(self.config.default.persistence.clone())
            .with_registry(self.registry.clone()))
    }

    /// Manager for a client id obtained elsewhere (a job queue, a test).
    pub fn manager_for(&self, client_id: &str) -> StoreManager {
        StoreManager::for_client(client_id, self.factory.clone())
            .with_default_persistence(self.config.default.persistence.clone())
            .with_registry(self.registry.clone())
    }

    /// Removes clients not seen for `days` days (configured default when
    /// `None`). Returns how many were removed.
    pub fn cleanup(&self, days: Option<u32>) -> Result<usize> {
        let days = days.unwrap_or(self.config.client.cleanup_after_days);
        self.resolver.cleanup(chrono::Duration::days(i64::from(days)))
    }

    pub fn clients(&self) -> Vec<ClientRecord> {
        self.resolver.clients()
    }
}
