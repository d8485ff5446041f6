use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "stateforge",
    bin_name = "stateforge",
    version,
    disable_help_subcommand = true
)]
#[command(about = "Maintenance tooling for stateforge client stores", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Storage directory (overrides config and STATEFORGE_DATA)
    #[arg(long, global = true, value_name = "PATH", help_heading = "Options")]
    pub data: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true, help_heading = "Options")]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Remove clients not seen recently, with their store files
    #[command(display_order = 1)]
    Cleanup {
        /// Age in days after which a client expires [default: client.cleanup_after_days]
        #[arg(long)]
        days: Option<u32>,
    },

    /// List registered clients, most recently seen first
    #[command(alias = "ls", display_order = 2)]
    Clients,

    /// Generate a new store definition
    #[command(display_order = 3)]
    MakeStore {
        /// Store name, e.g. "shopping-cart"
        name: String,

        /// Target directory
        #[arg(long, default_value = "src/stores")]
        dir: PathBuf,
    },

    /// Show the effective configuration
    #[command(display_order = 4)]
    Config {
        #[command(subcommand)]
        action: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print a single value, e.g. `default.persistence`
    Get { key: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cleanup_days() {
        let cli = Cli::try_parse_from(["stateforge", "cleanup", "--days", "7"]).unwrap();
        assert!(matches!(cli.command, Commands::Cleanup { days: Some(7) }));
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["stateforge", "clients", "--data", "/tmp/sf", "-v"]).unwrap();
        assert_eq!(cli.data, Some(PathBuf::from("/tmp/sf")));
        assert!(cli.verbose);
    }

    #[test]
    fn make_store_default_dir() {
        let cli = Cli::try_parse_from(["stateforge", "make-store", "cart"]).unwrap();
        match cli.command {
            Commands::MakeStore { name, dir } => {
                assert_eq!(name, "cart");
                assert_eq!(dir, PathBuf::from("src/stores"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["stateforge"]).is_err());
    }
}
