//! Redline Core Library
//!
//! Change-tracking and revert engine for markdown spaces edited by autonomous
//! agents. Tracks per-run file changes against a pre-run baseline, computes
//! line-level diffs, and reverts edits at hunk, file, or run granularity.

pub mod config;
pub mod error;
pub mod pages;
pub mod track;

// Re-export commonly used types
pub use config::TrackerConfig;
pub use error::{RedlineError, RedlineResult};
pub use pages::{FsPageStore, MemoryPageStore, PageStore};
pub use track::{
    BaselineStore, ChangeRecorder, ChangeSet, ChangeSetId, ChangeSetStore, ChangeSetSummary,
    PageEvent, PageEventKind, RevertOutcome, RevertTarget, RunStatus,
};
