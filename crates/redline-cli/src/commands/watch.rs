//! Record agent edits live until Ctrl-C
//!
//! Stand-in for the product's watcher + run gateway pair: starts a run
//! (ensure, orphan sweep, baseline), records debounced page events as they
//! arrive, and finalizes the change set on Ctrl-C.

use colored::Colorize;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

use super::build_engine;
use crate::watcher::{SpaceWatcher, SpaceWatcherConfig};

pub async fn execute(
    space: &Path,
    session: &str,
    run: Option<String>,
    debounce_ms: u64,
) -> anyhow::Result<()> {
    let engine = build_engine(space);
    let run_id = run.unwrap_or_else(|| format!("run_{}", Uuid::new_v4().simple()));

    let change_set = engine
        .recorder
        .ensure_change_set(session, &run_id, None, None)
        .await?;
    let orphans = engine
        .recorder
        .finalize_orphaned_runs(session, &run_id)
        .await?;
    if !orphans.is_empty() {
        println!(
            "{}",
            format!("Closed {} orphaned run(s).", orphans.len()).dimmed()
        );
    }
    engine
        .baselines
        .build(session, &run_id, engine.pages.as_ref())
        .await?;

    let config = SpaceWatcherConfig {
        debounce: Duration::from_millis(debounce_ms),
    };
    let mut watcher = SpaceWatcher::new(space, config)?;

    println!(
        "{}",
        format!("Recording to {}", change_set.id.as_str().bright_cyan()).bold()
    );
    println!("{}", "Press Ctrl-C to finish the run.".dimmed());

    loop {
        tokio::select! {
            maybe_event = watcher.next_event() => {
                let Some(event) = maybe_event else { break };
                let path = event.path.clone();
                match engine.recorder.record_file_event(session, &run_id, event).await {
                    Ok(change_set) => {
                        if let Some(entry) = change_set.file_entry(&path) {
                            if entry.too_large {
                                println!(
                                    "  {} {}",
                                    path,
                                    "(too large; content not recorded)".yellow()
                                );
                            } else {
                                let (additions, deletions) = entry
                                    .stats
                                    .map(|s| (s.additions, s.deletions))
                                    .unwrap_or((0, 0));
                                println!(
                                    "  {} {} {}",
                                    path,
                                    format!("+{}", additions).green(),
                                    format!("-{}", deletions).red()
                                );
                            }
                        }
                    }
                    Err(e) => {
                        eprintln!("{}", format!("Failed to record {}: {}", path, e).red());
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    match engine
        .recorder
        .finalize_change_set(session, &run_id, None)
        .await?
    {
        Some(change_set) => {
            println!();
            println!(
                "{}",
                format!(
                    "Run complete: {} file(s), +{} -{}",
                    change_set.totals.files_changed,
                    change_set.totals.additions,
                    change_set.totals.deletions
                )
                .bold()
            );
            println!(
                "{}",
                format!("Use 'redline show {}' to inspect it.", change_set.id).dimmed()
            );
        }
        None => println!("{}", "Run had no change set to finalize.".yellow()),
    }
    Ok(())
}
