//! Revert a change set at run, file, or hunk granularity

use anyhow::bail;
use colored::Colorize;
use redline_core::{ChangeSetId, RevertTarget};
use std::path::Path;

use super::build_engine;

/// Revert through the recorder and report the outcome
pub async fn execute(
    space: &Path,
    id: &str,
    all: bool,
    path: Option<String>,
    hunk: Option<String>,
) -> anyhow::Result<()> {
    let target = if all {
        RevertTarget::All
    } else if let Some(path) = path {
        match hunk {
            Some(hunk_id) => RevertTarget::Hunk { path, hunk_id },
            None => RevertTarget::File { path },
        }
    } else {
        bail!("specify --all or --path <page> (see 'redline revert --help')");
    };

    let engine = build_engine(space);
    let id = ChangeSetId::from_string(id);
    let Some(outcome) = engine.recorder.revert_by_id(&id, target).await? else {
        println!("{}", format!("No change set '{}' found.", id).yellow());
        return Ok(());
    };

    if outcome.applied {
        println!("{}", "Revert applied.".green());
        println!(
            "{}",
            format!(
                "Change set {} now carries +{} -{}.",
                outcome.change_set.id.as_str(),
                outcome.change_set.totals.additions,
                outcome.change_set.totals.deletions
            )
            .dimmed()
        );
    } else {
        println!(
            "{}",
            "Revert not applied: target missing, oversized, or content has diverged.".yellow()
        );
        println!(
            "{}",
            "Files where the recorded state no longer fits were left untouched.".dimmed()
        );
    }
    Ok(())
}
