//! List change sets recorded for a session

use colored::Colorize;
use redline_core::RunStatus;
use std::path::Path;

use super::{build_engine, format_relative_time};

/// List change-set summaries, most recent first
pub async fn execute(space: &Path, session: &str, limit: Option<usize>) -> anyhow::Result<()> {
    let engine = build_engine(space);
    let mut summaries = engine.recorder.list_change_sets(session).await?;
    if let Some(limit) = limit {
        summaries.truncate(limit);
    }

    if summaries.is_empty() {
        println!("{}", "No change sets found.".yellow());
        println!(
            "{}",
            format!("Tip: 'redline watch --session {}' records new runs.", session).dimmed()
        );
        return Ok(());
    }

    println!(
        "\n{}",
        format!("Change sets for '{}'", session).bold().underline()
    );
    println!(
        "{}",
        format!("Showing {} change set(s)", summaries.len()).dimmed()
    );
    println!();

    for summary in &summaries {
        let status = match summary.status {
            RunStatus::Active => "active".bright_green(),
            RunStatus::Completed => "completed".bright_blue(),
            RunStatus::Undo => "undo".bright_magenta(),
        };
        println!(
            "  {} {} {}",
            summary.id.as_str().bright_cyan(),
            status,
            format_relative_time(summary.effective_time()).dimmed()
        );
        println!(
            "    {} {} {}",
            format!("+{}", summary.totals.additions).green(),
            format!("-{}", summary.totals.deletions).red(),
            format!("{} file(s)", summary.totals.files_changed).dimmed()
        );
        for file in &summary.files {
            if file.too_large {
                println!("      {} {}", file.path.dimmed(), "(too large)".yellow());
            } else {
                println!(
                    "      {} {}",
                    file.path.dimmed(),
                    format!("+{} -{}", file.additions, file.deletions).dimmed()
                );
            }
        }
    }

    println!();
    println!(
        "{}",
        "Use 'redline show <id>' to inspect a change set.".dimmed()
    );
    Ok(())
}
