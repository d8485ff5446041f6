//! # Stateforge CLI
//!
//! Operator tooling around the `stateforge` library. The binary is thin: this
//! file only invokes `cli::run()` and handles process termination.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  CLI Layer (crates/stateforge-cli/src/cli/)          │
//! │  - clap argument parsing (setup.rs)                  │
//! │  - logging + config wiring (mod.rs)                  │
//! │  - one handler per subcommand (commands.rs)          │
//! └──────────────────────────────────────────────────────┘
//!                          │
//!                          ▼
//! ┌──────────────────────────────────────────────────────┐
//! │  Library (crates/stateforge)                         │
//! │  - StateForge facade: cleanup, clients               │
//! │  - scaffold: store source generation                 │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! `stateforge cleanup` is meant to run from a scheduler; it exits non-zero only
//! when the storage directory cannot be read or written.

mod cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
