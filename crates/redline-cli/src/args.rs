//! CLI argument definitions using clap
//!
//! Command surface:
//! - redline runs --session <s>       # List change sets for a session
//! - redline show <id>                # Colored diff of one change set
//! - redline revert <id> --all        # Restore every file to pre-run state
//! - redline undo <id>                # Revert and record a redoable undo
//! - redline prune                    # Drop change sets past retention
//! - redline watch --session <s>      # Record edits live until Ctrl-C

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "redline")]
#[command(about = "Track and revert agent edits to a markdown space")]
#[command(
    long_about = r#"Redline - change tracking and revert for agent-edited markdown spaces

USAGE:
  redline runs --session <s>           # List change sets for a session
  redline show <id>                    # Show one change set as a colored diff
  redline revert <id> --all            # Restore every file to its pre-run state
  redline revert <id> --path <p>       # Restore one file
  redline undo <id>                    # Revert a run and record a redoable undo
  redline watch --session <s>          # Record edits live until Ctrl-C
  redline prune [--session <s>]        # Drop change sets past the retention window

Change set ids are printed by 'runs' and 'watch'. The space directory
defaults to the current directory; override with --space or REDLINE_SPACE.

For detailed help: redline --help"#
)]
#[command(version)]
pub struct Cli {
    /// Root directory of the markdown space
    #[arg(long, global = true, env = "REDLINE_SPACE", default_value = ".")]
    pub space: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List change sets recorded for a session, most recent first
    Runs {
        /// Session key to list
        #[arg(long, short)]
        session: String,

        /// Show at most this many change sets
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// Show a change set as a colored unified diff
    Show {
        /// Change set id (as printed by 'runs')
        id: String,

        /// Only show this page
        #[arg(long)]
        path: Option<String>,
    },

    /// Revert a change set at run, file, or hunk granularity
    Revert {
        /// Change set id (as printed by 'runs')
        id: String,

        /// Restore every file in the change set
        #[arg(long, conflicts_with_all = ["path", "hunk"])]
        all: bool,

        /// Restore only this page
        #[arg(long)]
        path: Option<String>,

        /// Undo only this hunk of --path (hunk ids are printed by 'show')
        #[arg(long, requires = "path")]
        hunk: Option<String>,
    },

    /// Revert a whole change set and record its inverse for redo
    Undo {
        /// Change set id (as printed by 'runs')
        id: String,
    },

    /// Remove change sets older than the retention window
    Prune {
        /// Only prune this session
        #[arg(long, short)]
        session: Option<String>,
    },

    /// Record agent edits live until Ctrl-C
    Watch {
        /// Session key to record under
        #[arg(long, short)]
        session: String,

        /// Run id (generated when omitted)
        #[arg(long)]
        run: Option<String>,

        /// Debounce window for file events, in milliseconds
        #[arg(long, default_value_t = 500)]
        debounce_ms: u64,
    },
}
