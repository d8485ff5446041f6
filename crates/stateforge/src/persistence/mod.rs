//! # Persistence Layer
//!
//! A store's snapshot can live in one of three media. Each medium gets one
//! [`PersistenceBackend`] implementation, addressed by `(client_id, store_name)`:
//!
//! | Kind | Address | Expiry |
//! |------|---------|--------|
//! | [`file::FileBackend`] | `<dir>/<client_id>_<store>.json` | none (cleanup sweep only) |
//! | [`cache::CacheBackend`] | `<prefix>:<client_id>:<store>` | TTL, default 30 days |
//! | [`session::SessionBackend`] | `<prefix>.<client_id>.<store>` | session lifetime |
//!
//! Implementors only provide raw `read_raw` / `write_raw` / `forget`; the
//! provided methods implement the shared contract on top of them:
//!
//! - [`load`](PersistenceBackend::load): fetch, parse, and gate on the
//!   structural checksum. Anything malformed or inconsistent is `None`.
//! - [`persist`](PersistenceBackend::persist): capture a [`Snapshot`] and
//!   overwrite the address.
//! - [`refresh`](PersistenceBackend::refresh): fold a loadable snapshot into the
//!   live state, leaving behaviour fields untouched (see [`State::absorb`]).
//!
//! ## Absent vs Unreadable
//!
//! `read_raw` returns `Ok(None)` when nothing is stored and `Err` only for real
//! I/O failures. Payloads that exist but cannot be parsed are logged and treated
//! as absent: visitor state degrades to "start fresh" rather than failing the
//! request.
//!
//! ## Concurrency
//!
//! There is no locking. Two requests for the same client and store race, and the
//! last `persist` wins for the whole snapshot.

use crate::error::{Result, StateForgeError};
use crate::model::State;
use crate::snapshot::Snapshot;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

pub mod cache;
pub mod factory;
pub mod file;
pub mod session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceKind {
    File,
    Cache,
    Session,
    None,
}

impl PersistenceKind {
    pub const ALL: [PersistenceKind; 4] = [
        PersistenceKind::File,
        PersistenceKind::Cache,
        PersistenceKind::Session,
        PersistenceKind::None,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PersistenceKind::File => "file",
            PersistenceKind::Cache => "cache",
            PersistenceKind::Session => "session",
            PersistenceKind::None => "none",
        }
    }
}

impl FromStr for PersistenceKind {
    type Err = StateForgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "file" => Ok(PersistenceKind::File),
            "cache" => Ok(PersistenceKind::Cache),
            "session" => Ok(PersistenceKind::Session),
            "none" => Ok(PersistenceKind::None),
            other => Err(StateForgeError::InvalidPersistenceKind(other.to_string())),
        }
    }
}

impl fmt::Display for PersistenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniform load/persist contract over a storage medium.
pub trait PersistenceBackend: Send + Sync {
    fn kind(&self) -> PersistenceKind;

    /// Medium-specific address (file path, cache key, session key).
    fn address(&self) -> String;

    /// Raw payload at the address. `Ok(None)` if nothing is stored.
    fn read_raw(&self) -> Result<Option<Value>>;

    /// Overwrites the address with `payload`.
    fn write_raw(&self, payload: Value) -> Result<()>;

    /// Deletes whatever is stored at the address. Missing data is not an error.
    fn forget(&self) -> Result<()>;

    fn load(&self) -> Result<Option<Snapshot>> {
        let Some(raw) = self.read_raw()? else {
            return Ok(None);
        };

        let Some(snapshot) = Snapshot::from_value(raw) else {
            tracing::warn!(address = %self.address(), "discarding malformed snapshot");
            return Ok(None);
        };

        if !snapshot.is_consistent() {
            tracing::warn!(address = %self.address(), "discarding snapshot with stale checksum");
            return Ok(None);
        }

        Ok(Some(snapshot))
    }

    fn persist(&self, state: &State) -> Result<Snapshot> {
        let snapshot = Snapshot::capture(state);
        self.write_raw(snapshot.to_value()?)?;
        tracing::debug!(
            address = %self.address(),
            keys = snapshot.state.len(),
            "persisted snapshot"
        );
        Ok(snapshot)
    }

    fn refresh(&self, mut current: State) -> Result<State> {
        if let Some(snapshot) = self.load()? {
            let merged = current.absorb(&snapshot.state);
            tracing::debug!(address = %self.address(), merged, "refreshed state");
        }
        Ok(current)
    }
}
