//! # Configuration
//!
//! Stateforge configuration is managed by [`clapfig`], which handles layered loading
//! from TOML files, environment variables, and programmatic overrides.
//!
//! ## Storage Hierarchy
//!
//! Configuration is resolved in priority order:
//! 1. **Environment variables**: `STATEFORGE__DEFAULT__PERSISTENCE`, etc.
//! 2. **Config files**: `stateforge.toml` in each search path, later paths win.
//! 3. **Compiled Defaults**: Built-in fallbacks via `#[config(default = ...)]`.
//!
//! ## Available Settings
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `default.persistence` | `file` | Medium for new stores: `file`, `cache`, `session`, `none` |
//! | `persistence.file.path` | OS data dir | Directory for store files and `clients.json` |
//! | `persistence.cache.prefix` | `stateforge` | Cache key prefix |
//! | `persistence.cache.ttl_secs` | `2592000` | Cache entry lifetime (30 days) |
//! | `persistence.session.prefix` | `stateforge` | Session key prefix |
//! | `client.cookie_name` | `stateforge_client_id` | Identity cookie name |
//! | `client.cookie_lifetime_mins` | `525600` | Identity cookie lifetime (1 year) |
//! | `client.cleanup_after_days` | `30` | Default `--days` for `stateforge cleanup` |
//!
//! The persistence selector is a plain string on purpose: an unknown value is
//! reported as `InvalidPersistenceKind` when a store is created with it, not
//! when the file is loaded.

use confique::Config;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment override for the storage directory, mainly for tests.
pub const DATA_DIR_ENV: &str = "STATEFORGE_DATA";

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StateForgeConfig {
    #[config(nested)]
    pub default: DefaultConfig,

    #[config(nested)]
    pub persistence: PersistenceConfig,

    #[config(nested)]
    pub client: ClientConfig,
}

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DefaultConfig {
    /// Persistence medium for stores created without an explicit override.
    #[config(default = "file")]
    pub persistence: String,
}

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PersistenceConfig {
    #[config(nested)]
    pub file: FileConfig,

    #[config(nested)]
    pub cache: CacheConfig,

    #[config(nested)]
    pub session: SessionConfig,
}

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FileConfig {
    /// Storage directory. When absent, the OS data directory is used.
    pub path: Option<PathBuf>,
}

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    #[config(default = "stateforge")]
    pub prefix: String,

    #[config(default = 2592000)]
    pub ttl_secs: u64,
}

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    #[config(default = "stateforge")]
    pub prefix: String,
}

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    #[config(default = "stateforge_client_id")]
    pub cookie_name: String,

    #[config(default = 525600)]
    pub cookie_lifetime_mins: u64,

    #[config(default = 30)]
    pub cleanup_after_days: u32,
}

impl Default for StateForgeConfig {
    fn default() -> Self {
        Self {
            default: DefaultConfig::default(),
            persistence: PersistenceConfig::default(),
            client: ClientConfig::default(),
        }
    }
}

impl Default for DefaultConfig {
    fn default() -> Self {
        Self {
            persistence: "file".to_string(),
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            file: FileConfig::default(),
            cache: CacheConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self { path: None }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prefix: "stateforge".to_string(),
            ttl_secs: 60 * 60 * 24 * 30,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            prefix: "stateforge".to_string(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            cookie_name: "stateforge_client_id".to_string(),
            cookie_lifetime_mins: 60 * 24 * 365,
            cleanup_after_days: 30,
        }
    }
}

impl StateForgeConfig {
    /// Resolve the storage directory:
    /// 1. `persistence.file.path` if configured
    /// 2. `STATEFORGE_DATA` environment variable
    /// 3. OS-appropriate data directory via the `directories` crate
    /// 4. `./.stateforge` when no home directory can be determined
    pub fn storage_dir(&self) -> PathBuf {
        if let Some(path) = &self.persistence.file.path {
            return path.clone();
        }
        std::env::var(DATA_DIR_ENV)
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                ProjectDirs::from("com", "stateforge", "stateforge")
                    .map(|dirs| dirs.data_dir().to_path_buf())
            })
            .unwrap_or_else(|| PathBuf::from(".stateforge"))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.persistence.cache.ttl_secs)
    }

    /// Saturates at the largest representable duration.
    pub fn cookie_lifetime(&self) -> chrono::Duration {
        i64::try_from(self.client.cookie_lifetime_mins)
            .ok()
            .and_then(chrono::Duration::try_minutes)
            .unwrap_or(chrono::Duration::MAX)
    }

    pub fn set_storage_dir(&mut self, path: impl Into<PathBuf>) {
        self.persistence.file.path = Some(path.into());
    }
}
