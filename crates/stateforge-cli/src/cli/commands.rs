use super::setup::ConfigCommands;
use anyhow::Context;
use chrono::Utc;
use clapfig::{Clapfig, ConfigAction, SearchPath};
use console::style;
use stateforge::init::{default_search_dirs, APP_NAME, CONFIG_FILE};
use stateforge::persistence::cache::MemoryCache;
use stateforge::persistence::session::MemorySession;
use stateforge::{scaffold, StateForge, StateForgeConfig};
use std::path::Path;
use std::sync::Arc;

/// Offline facade: the CLI has no cache or session backend to reach, so those
/// media are in-memory and empty. Only the file medium is real here.
fn forge(config: StateForgeConfig) -> StateForge {
    StateForge::new(
        config,
        Arc::new(MemoryCache::new()),
        Arc::new(MemorySession::new()),
    )
}

pub fn cleanup(config: StateForgeConfig, days: Option<u32>) -> anyhow::Result<()> {
    let days = days.unwrap_or(config.client.cleanup_after_days);
    let storage = config.storage_dir();
    let removed = forge(config)
        .cleanup(Some(days))
        .with_context(|| format!("cleanup failed in {}", storage.display()))?;

    println!(
        "{} Removed {} expired client(s) not seen in {} days",
        style("✓").green(),
        removed,
        days
    );
    Ok(())
}

pub fn clients(config: StateForgeConfig) -> anyhow::Result<()> {
    let clients = forge(config).clients();
    if clients.is_empty() {
        println!("{}", style("No clients registered").dim());
        return Ok(());
    }

    let now = Utc::now();
    for client in &clients {
        let age = (now - client.last_seen).num_days();
        println!(
            "{}  {} ({}d ago)  {}  {}",
            style(&client.client_id).bold(),
            style(client.last_seen.format("%Y-%m-%d %H:%M")).cyan(),
            age,
            client.client_ip,
            style(&client.user_agent).dim()
        );
    }
    println!("{} client(s)", clients.len());
    Ok(())
}

pub fn make_store(name: &str, dir: &Path) -> anyhow::Result<()> {
    let path = scaffold::write_store(dir, name)?;
    println!(
        "{} Store created: {}",
        style("✓").green(),
        path.display()
    );
    println!("Register it with StateForge::register to create it by name.");
    Ok(())
}

pub fn config(config: &StateForgeConfig, action: Option<&ConfigCommands>) -> anyhow::Result<()> {
    match action {
        None => {
            print!("{}", toml::to_string_pretty(config)?);
            Ok(())
        }
        Some(ConfigCommands::Get { key }) => {
            let search_paths: Vec<SearchPath> = default_search_dirs()
                .into_iter()
                .map(SearchPath::Path)
                .collect();
            let action = ConfigAction::Get { key: key.clone(), scope: None };
            let result = Clapfig::builder::<StateForgeConfig>()
                .app_name(APP_NAME)
                .file_name(CONFIG_FILE)
                .search_paths(search_paths)
                .no_env()
                .strict(false)
                .handle(&action)
                .map_err(|e| anyhow::anyhow!(e.to_string()))?;
            println!("{result}");
            Ok(())
        }
    }
}
