//! # Store Manager
//!
//! One [`StoreManager`] serves one request for one client. It owns the live
//! [`StateStore`]s of that client, keyed by store name, and wires each of them
//! to a persistence backend when it is first created:
//!
//! ```text
//! request ──► ClientIdentityResolver ──► client_id
//!                                          │
//! create(Counter, options) ────────────────┤
//!   ├─ cached?  ──► return it              │
//!   └─ new StateStore(Counter)             ▼
//!        └─ attach BackendFactory::build(kind, client_id, "Counter")
//! ```
//!
//! The persistence kind comes from `options.persistence` or, failing that, the
//! configured default. It is validated before anything is cached, so a bad
//! selector never leaves a half-built store behind.
//!
//! ## Reset
//!
//! `reset(Some(name))` resets the store, drops it from the manager and forgets
//! its snapshot on every medium. `reset(None)` does the same for every live
//! store, then sweeps the client's whole footprint: all of its files, all of
//! its session keys, and the cache entries of every known store name.

use crate::error::{Result, StateForgeError};
use crate::identity::{ClientIdentityResolver, ClientRequest, IdentityCookie};
use crate::persistence::factory::BackendFactory;
use crate::persistence::PersistenceKind;
use crate::registry::StoreRegistry;
use crate::store::{StateStore, StoreDefinition};
use serde::Serialize;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

/// Per-store overrides of the configured persistence settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreOptions {
    pub persistence: Option<String>,
    pub cache_prefix: Option<String>,
    pub cache_ttl: Option<Duration>,
    pub session_prefix: Option<String>,
}

impl StoreOptions {
    pub fn persistence(kind: impl Into<String>) -> Self {
        Self {
            persistence: Some(kind.into()),
            ..Self::default()
        }
    }

    pub fn with_cache_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cache_prefix = Some(prefix.into());
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn with_session_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.session_prefix = Some(prefix.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreInfo {
    pub client_id: String,
    pub active_stores: Vec<String>,
    pub persistence_stats: BTreeMap<PersistenceKind, usize>,
}

pub struct StoreManager {
    client_id: String,
    pending_cookie: Option<IdentityCookie>,
    default_persistence: String,
    factory: BackendFactory,
    registry: StoreRegistry,
    stores: BTreeMap<String, StateStore>,
}

impl StoreManager {
    /// Resolves the client behind `request` and prepares a manager for it.
    pub fn new(
        resolver: &ClientIdentityResolver,
        request: &ClientRequest,
        factory: BackendFactory,
    ) -> Result<Self> {
        let identity = resolver.resolve(request)?;
        let pending_cookie = identity
            .needs_cookie()
            .then(|| resolver.cookie(&identity.client_id));
        let mut manager = Self::for_client(identity.client_id, factory);
        manager.pending_cookie = pending_cookie;
        Ok(manager)
    }

    /// A manager for an already known client id.
    pub fn for_client(client_id: impl Into<String>, factory: BackendFactory) -> Self {
        Self {
            client_id: client_id.into(),
            pending_cookie: None,
            default_persistence: PersistenceKind::File.to_string(),
            factory,
            registry: StoreRegistry::new(),
            stores: BTreeMap::new(),
        }
    }

    pub fn with_default_persistence(mut self, kind: impl Into<String>) -> Self {
        self.default_persistence = kind.into();
        self
    }

    pub fn with_registry(mut self, registry: StoreRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// The identity cookie to attach to the response, if the request did not
    /// carry one.
    pub fn pending_cookie(&self) -> Option<&IdentityCookie> {
        self.pending_cookie.as_ref()
    }

    fn resolve_kind(&self, options: &StoreOptions) -> Result<PersistenceKind> {
        options
            .persistence
            .as_deref()
            .unwrap_or(&self.default_persistence)
            .parse()
    }

    pub fn create<D: StoreDefinition>(
        &mut self,
        definition: D,
        options: &StoreOptions,
    ) -> Result<&mut StateStore> {
        self.create_shared(Arc::new(definition), options)
    }

    /// Returns the live store of that name, or builds and caches a new one.
    pub fn create_shared(
        &mut self,
        definition: Arc<dyn StoreDefinition>,
        options: &StoreOptions,
    ) -> Result<&mut StateStore> {
        let kind = self.resolve_kind(options)?;
        let name = definition.name().to_string();
        if name.is_empty() {
            return Err(StateForgeError::StoreClassInvalid(
                "store definition has an empty name".to_string(),
            ));
        }

        match self.stores.entry(name) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let mut store = StateStore::new(definition);
                if let Some(backend) =
                    self.factory
                        .build(kind, &self.client_id, entry.key(), options)
                {
                    store.attach_persistence(backend);
                }
                store.refresh()?;
                tracing::info!(
                    client_id = %self.client_id,
                    store = %entry.key(),
                    persistence = %kind,
                    "store created"
                );
                Ok(entry.insert(store))
            }
        }
    }

    /// Creates a store from the registry by name.
    pub fn create_named(&mut self, name: &str, options: &StoreOptions) -> Result<&mut StateStore> {
        let definition = self.registry.get(name).ok_or_else(|| {
            StateForgeError::StoreClassInvalid(format!("Store {name} is not registered"))
        })?;
        self.create_shared(definition, options)
    }

    pub fn get(&mut self, name: &str) -> Option<&mut StateStore> {
        self.stores.get_mut(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.stores.contains_key(name)
    }

    pub fn all(&self) -> impl Iterator<Item = &StateStore> {
        self.stores.values()
    }

    pub fn reset(&mut self, name: Option<&str>) -> Result<()> {
        match name {
            Some(name) => self.reset_store(name),
            None => {
                let live: Vec<String> = self.stores.keys().cloned().collect();
                for name in &live {
                    self.reset_store(name)?;
                }
                let known: BTreeSet<&str> = live
                    .iter()
                    .map(String::as_str)
                    .chain(self.registry.names())
                    .collect();
                self.factory.forget_client(&self.client_id, known)?;
                tracing::info!(client_id = %self.client_id, "all stores reset");
                Ok(())
            }
        }
    }

    fn reset_store(&mut self, name: &str) -> Result<()> {
        if let Some(mut store) = self.stores.remove(name) {
            store.reset()?;
        }
        self.factory.forget_store(&self.client_id, name)?;
        tracing::info!(client_id = %self.client_id, store = %name, "store reset");
        Ok(())
    }

    /// Swaps the persistence medium of a live store, keeping its state and
    /// user middleware. Unknown store names are ignored.
    pub fn set_persistence(&mut self, name: &str, kind: &str, options: &StoreOptions) -> Result<()> {
        let kind: PersistenceKind = kind.parse()?;
        let Some(store) = self.stores.get_mut(name) else {
            return Ok(());
        };

        store.detach_persistence();
        if let Some(backend) = self.factory.build(kind, &self.client_id, name, options) {
            store.attach_persistence(backend);
        }
        tracing::debug!(client_id = %self.client_id, store = %name, persistence = %kind, "persistence changed");
        Ok(())
    }

    pub fn store_info(&self) -> StoreInfo {
        let mut persistence_stats: BTreeMap<PersistenceKind, usize> =
            PersistenceKind::ALL.iter().map(|kind| (*kind, 0)).collect();
        for store in self.stores.values() {
            *persistence_stats.entry(store.persistence_kind()).or_default() += 1;
        }
        StoreInfo {
            client_id: self.client_id.clone(),
            active_stores: self.stores.keys().cloned().collect(),
            persistence_stats,
        }
    }
}
