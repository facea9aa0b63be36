//! Redline CLI application
//!
//! Operator tooling for the change tracking engine: list and inspect the
//! change sets agent runs produced, revert them at hunk, file, or run
//! granularity, and track a space live while an agent works in it.
//!
//! # Usage
//!
//! ```bash
//! redline runs --session main            # List change sets for a session
//! redline show main~r1                   # Colored diff of one change set
//! redline revert main~r1 --all           # Restore every file to pre-run state
//! redline undo main~r1                   # Revert and record a redoable undo
//! redline watch --session main           # Track edits until Ctrl-C
//! redline prune                          # Drop change sets past retention
//! ```
//!
//! Set `RUST_LOG=debug` for verbose engine logging.

mod args;
mod commands;
mod router;
mod watcher;

use clap::Parser;

pub use args::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with environment-based filtering
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    router::route(cli).await
}
