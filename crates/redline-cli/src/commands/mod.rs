//! CLI commands

use redline_core::{BaselineStore, ChangeRecorder, FsPageStore, TrackerConfig};
use std::path::Path;
use std::sync::Arc;

pub mod prune;
pub mod revert;
pub mod runs;
pub mod show;
pub mod undo;
pub mod watch;

/// Engine wired over a space directory
pub struct Engine {
    pub recorder: ChangeRecorder,
    pub pages: Arc<FsPageStore>,
    pub baselines: Arc<BaselineStore>,
}

/// Build the engine every command runs against
pub fn build_engine(space: &Path) -> Engine {
    let config = TrackerConfig::new(space);
    let pages = Arc::new(FsPageStore::new(space));
    let baselines = Arc::new(BaselineStore::new(config.max_snapshot_bytes));
    let recorder = ChangeRecorder::new(config, pages.clone(), baselines.clone());
    Engine {
        recorder,
        pages,
        baselines,
    }
}

/// Format relative time like "5 mins ago", "2 hours ago", etc.
pub fn format_relative_time(time: chrono::DateTime<chrono::Utc>) -> String {
    let now = chrono::Utc::now();
    let duration = now.signed_duration_since(time);

    if duration.num_seconds() < 60 {
        "just now".to_string()
    } else if duration.num_minutes() < 60 {
        let mins = duration.num_minutes();
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if duration.num_hours() < 24 {
        let hours = duration.num_hours();
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if duration.num_days() < 7 {
        let days = duration.num_days();
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        let weeks = duration.num_weeks();
        format!("{} week{} ago", weeks, if weeks == 1 { "" } else { "s" })
    }
}
