//! Command routing logic for CLI

use crate::args::{Cli, Commands};
use crate::commands;

/// Route CLI commands to their respective handlers
pub async fn route(cli: Cli) -> anyhow::Result<()> {
    let space = cli.space;
    match cli.command {
        Commands::Runs { session, limit } => {
            commands::runs::execute(&space, &session, limit).await
        }
        Commands::Show { id, path } => {
            commands::show::execute(&space, &id, path.as_deref()).await
        }
        Commands::Revert {
            id,
            all,
            path,
            hunk,
        } => commands::revert::execute(&space, &id, all, path, hunk).await,
        Commands::Undo { id } => commands::undo::execute(&space, &id).await,
        Commands::Prune { session } => {
            commands::prune::execute(&space, session.as_deref()).await
        }
        Commands::Watch {
            session,
            run,
            debounce_ms,
        } => commands::watch::execute(&space, &session, run, debounce_ms).await,
    }
}
