//! Change tracking and revert engine
//!
//! This module records what an agent run changed in a workspace and makes
//! those changes inspectable and reversible:
//! - One change set per (sessionKey, runId), merged from watcher events
//! - Full before/after snapshots per file, diff stats, lazy hunks
//! - Reverts at hunk, file, or whole-change-set granularity
//! - Synthesized `undo` change sets that make an undo itself redoable
//!
//! # Overview
//!
//! A run begins with [`ChangeRecorder::ensure_change_set`] plus a
//! [`BaselineStore::build`] snapshot of the workspace. File events are fed
//! through [`ChangeRecorder::record_file_event`], which merges them into one
//! entry per path and persists after every event, so a crash never loses
//! more than the in-flight update. Ending a run is
//! [`ChangeRecorder::finalize_change_set`]; runs whose end was lost are
//! swept by [`ChangeRecorder::finalize_orphaned_runs`].
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use redline_core::{
//!     BaselineStore, ChangeRecorder, FsPageStore, PageEvent, PageEventKind,
//!     RevertTarget, TrackerConfig,
//! };
//!
//! let config = TrackerConfig::new("./space");
//! let pages = Arc::new(FsPageStore::new(&config.space_root));
//! let baselines = Arc::new(BaselineStore::new(config.max_snapshot_bytes));
//! let recorder = ChangeRecorder::new(config, pages.clone(), baselines.clone());
//!
//! recorder.ensure_change_set("main", "r1", None, None).await?;
//! baselines.build("main", "r1", pages.as_ref()).await?;
//!
//! let event = PageEvent::new("notes.md", PageEventKind::FileChanged);
//! recorder.record_file_event("main", "r1", event).await?;
//!
//! let cs = recorder.finalize_change_set("main", "r1", None).await?.unwrap();
//! recorder.revert_change_set(cs, RevertTarget::All).await?;
//! ```
//!
//! # Storage
//!
//! Change sets live under `{space}/.redline/changes/` by default:
//! ```text
//! .redline/changes/
//!   {encoded_session}/
//!     {encoded_run}.json    # One full change set document
//!     index.json            # Session summaries, most recent first
//! ```

pub mod baseline;
pub mod diff;
pub mod recorder;
pub mod store;
pub mod types;

pub use baseline::{BaselineEntry, BaselineStore};
pub use diff::{
    PatchError, apply_reverse_patch, build_reverse_patch, compute_hunks, compute_stats,
};
pub use recorder::ChangeRecorder;
pub use store::ChangeSetStore;
pub use types::{
    ChangeFileEntry, ChangeHunk, ChangeSet, ChangeSetId, ChangeSetSummary, ChangeTotals,
    FileStats, FileSummary, PageEvent, PageEventKind, RevertOutcome, RevertTarget, RunStatus,
};
