//! # Stateforge
//!
//! Per-visitor state stores for web applications. A store is a small, named,
//! observable state container; each anonymous visitor gets their own copy of it,
//! and that copy survives across requests in a file, a cache or the session.
//!
//! ## Architecture
//!
//! ```text
//!  host (web framework, CLI)
//!        │
//!        ▼
//!  api::StateForge ── config, resolver, registry, shared cache/session
//!        │ begin_request(&ClientRequest)
//!        ▼
//!  manager::StoreManager ── one per request, owns the client's live stores
//!        │ create(definition, options)
//!        ▼
//!  store::StateStore ── state + listeners + middleware chain
//!        │ set_state(updater)
//!        ▼
//!  middleware::PersistMiddleware ── refresh → updater → persist
//!        │
//!        ▼
//!  persistence::{File,Cache,Session}Backend ── snapshot::Snapshot on a medium
//! ```
//!
//! The library never prints and never exits. Diagnostics go through `tracing`;
//! failures come back as [`StateForgeError`].
//!
//! ## Data, Not Behaviour
//!
//! State values are [`Field`]s. Plain data is a JSON value and is what gets
//! persisted. Callables and object references live only in memory: they are
//! never written, and a refresh from storage never overwrites them.
//!
//! ## Snapshots
//!
//! Every persist writes `{state, updated_at, checksum}`, where the checksum is a
//! hash of the key names only. A stored snapshot whose checksum no longer
//! matches its own keys is ignored on load, and the store starts from its
//! in-memory state instead.
//!
//! ## Concurrency
//!
//! Requests for the same client and store race on the shared medium. The last
//! persist wins, for the whole snapshot. There is no locking.

pub mod api;
pub mod config;
pub mod error;
pub mod identity;
pub mod init;
pub mod manager;
pub mod middleware;
pub mod model;
pub mod persistence;
pub mod registry;
pub mod scaffold;
pub mod snapshot;
pub mod store;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use api::StateForge;
pub use config::StateForgeConfig;
pub use error::{Result, StateForgeError};
pub use identity::{ClientIdentityResolver, ClientRequest, IdentityCookie};
pub use manager::{StoreInfo, StoreManager, StoreOptions};
pub use middleware::{from_fn, Middleware, Updater};
pub use model::{Field, State};
pub use persistence::{PersistenceBackend, PersistenceKind};
pub use registry::StoreRegistry;
pub use snapshot::Snapshot;
pub use store::{StateStore, StoreDefinition, Subscription};
