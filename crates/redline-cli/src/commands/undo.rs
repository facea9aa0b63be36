//! Revert a whole change set and record its inverse for redo

use colored::Colorize;
use redline_core::{ChangeSetId, RevertTarget};
use std::path::Path;

use super::build_engine;

/// Restore every file of a change set, then persist the inverse change set
pub async fn execute(space: &Path, id: &str) -> anyhow::Result<()> {
    let engine = build_engine(space);
    let id = ChangeSetId::from_string(id);
    let Some(original) = engine.recorder.load_by_id_with_hunks(&id).await? else {
        println!("{}", format!("No change set '{}' found.", id).yellow());
        return Ok(());
    };

    // The revert rewrites the entries in place, so the inverse must be
    // synthesized from a pre-revert snapshot.
    let snapshot = original.clone();
    let outcome = engine
        .recorder
        .revert_change_set(original, RevertTarget::All)
        .await?;

    if !outcome.applied {
        println!(
            "{}",
            "Undo incomplete: some files could not be restored.".yellow()
        );
        println!("{}", "No inverse change set was recorded.".dimmed());
        return Ok(());
    }

    let undo = engine.recorder.build_undo_change_set(&snapshot).await?;
    println!("{}", "Undo applied.".green());
    println!(
        "Recorded inverse change set {}.",
        undo.id.as_str().bright_cyan()
    );
    println!(
        "{}",
        format!("Use 'redline revert {} --all' to redo.", undo.id).dimmed()
    );
    Ok(())
}
