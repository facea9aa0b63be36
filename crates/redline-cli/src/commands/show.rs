//! Show one change set as a colored unified diff

use colored::Colorize;
use redline_core::track::ChangeFileEntry;
use redline_core::{ChangeSetId, RunStatus};
use std::path::Path;

use super::{build_engine, format_relative_time};

/// Print a change set's metadata and per-file diffs
pub async fn execute(space: &Path, id: &str, path: Option<&str>) -> anyhow::Result<()> {
    let engine = build_engine(space);
    let id = ChangeSetId::from_string(id);
    let Some(change_set) = engine.recorder.load_by_id_with_hunks(&id).await? else {
        println!("{}", format!("No change set '{}' found.", id).yellow());
        return Ok(());
    };

    let status = match change_set.status {
        RunStatus::Active => "active".bright_green(),
        RunStatus::Completed => "completed".bright_blue(),
        RunStatus::Undo => "undo".bright_magenta(),
    };
    println!(
        "\n{} {} {}",
        change_set.id.as_str().bright_cyan().bold(),
        status,
        format_relative_time(change_set.effective_time()).dimmed()
    );
    println!(
        "{}",
        format!(
            "session '{}', run '{}'",
            change_set.session_key, change_set.run_id
        )
        .dimmed()
    );
    println!(
        "{} {} {}",
        format!("+{}", change_set.totals.additions).green(),
        format!("-{}", change_set.totals.deletions).red(),
        format!("across {} file(s)", change_set.totals.files_changed).dimmed()
    );

    let mut shown = 0;
    for entry in &change_set.files {
        if path.is_some_and(|p| p != entry.path) {
            continue;
        }
        print_file_entry(entry);
        shown += 1;
    }

    if shown == 0 {
        if let Some(path) = path {
            println!("\n{}", format!("No entry for '{}'.", path).yellow());
        } else {
            println!("\n{}", "No files were changed.".dimmed());
        }
    }
    Ok(())
}

fn print_file_entry(entry: &ChangeFileEntry) {
    let transition = match (entry.exists_before, entry.exists_after) {
        (false, true) => " (created)",
        (true, false) => " (deleted)",
        (false, false) => " (created and removed)",
        (true, true) => "",
    };
    println!("\n{}{}", entry.path.bold(), transition.dimmed());

    if entry.too_large {
        println!("  {}", "Content too large; diff not recorded.".yellow());
        return;
    }

    let Some(hunks) = &entry.hunks else {
        return;
    };
    if hunks.is_empty() {
        println!("  {}", "No line changes.".dimmed());
        return;
    }
    for hunk in hunks {
        println!(
            "{}",
            format!(
                "@@ -{},{} +{},{} @@  [{}]",
                hunk.old_start, hunk.old_lines, hunk.new_start, hunk.new_lines, hunk.id
            )
            .cyan()
        );
        for line in &hunk.lines {
            let rendered = line.trim_end_matches(['\r', '\n']);
            match line.chars().next() {
                Some('+') => println!("{}", rendered.green()),
                Some('-') => println!("{}", rendered.red()),
                _ => println!("{}", rendered),
            }
        }
    }
}
