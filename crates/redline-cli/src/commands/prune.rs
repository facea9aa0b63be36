//! Remove change sets older than the retention window

use colored::Colorize;
use std::path::Path;

use super::build_engine;

pub async fn execute(space: &Path, session: Option<&str>) -> anyhow::Result<()> {
    let engine = build_engine(space);
    let removed = engine.recorder.prune_old_change_sets(session).await?;
    if removed == 0 {
        println!("{}", "Nothing to prune.".dimmed());
    } else {
        println!(
            "{}",
            format!("Removed {} change set(s) past the retention window.", removed).green()
        );
    }
    Ok(())
}
