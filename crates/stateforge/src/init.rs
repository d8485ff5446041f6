//! # Configuration Loading
//!
//! Hosts (and the CLI) call [`load_config`] once at startup. Each directory in
//! `search_dirs` may hold a `stateforge.toml`; files are merged in order, so a
//! later directory overrides an earlier one. `STATEFORGE__*` environment
//! variables sit on top of the files.
//!
//! A broken or missing config never aborts startup: the compiled defaults are
//! used instead.

use crate::config::StateForgeConfig;
use clapfig::{Clapfig, SearchMode, SearchPath};
use directories::ProjectDirs;
use std::path::PathBuf;

pub const APP_NAME: &str = "stateforge";
pub const CONFIG_FILE: &str = "stateforge.toml";

/// The per-user config directory, when one can be determined.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "stateforge", "stateforge").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Default search order: per-user config directory, then the working directory.
pub fn default_search_dirs() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = global_config_dir().into_iter().collect();
    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd);
    }
    dirs
}

pub fn load_config(search_dirs: &[PathBuf]) -> StateForgeConfig {
    let search_paths: Vec<SearchPath> = search_dirs
        .iter()
        .cloned()
        .map(SearchPath::Path)
        .collect();

    match Clapfig::builder()
        .app_name(APP_NAME)
        .file_name(CONFIG_FILE)
        .search_paths(search_paths)
        .search_mode(SearchMode::Merge)
        .load()
    {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %e, "failed to load configuration, using defaults");
            StateForgeConfig::default()
        }
    }
}
