//! Tracker configuration

use std::path::PathBuf;

/// Files larger than this (in bytes) are recorded without content, stats, or hunks.
pub const DEFAULT_MAX_SNAPSHOT_BYTES: usize = 1_000_000;

/// Change sets older than this are removed by pruning.
pub const DEFAULT_RETENTION_DAYS: i64 = 30;

/// Configuration for the change-tracking engine
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Root directory of the markdown space being tracked
    pub space_root: PathBuf,
    /// Directory holding persisted change sets and indexes
    pub state_dir: PathBuf,
    /// Snapshot size ceiling; larger files degrade to too-large entries
    pub max_snapshot_bytes: usize,
    /// Retention window for pruning, in days
    pub retention_days: i64,
    /// Extra read attempts when a watcher event outruns the write
    pub read_retry_attempts: u32,
    /// Base delay between read retries, in milliseconds
    pub read_retry_delay_ms: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::new(".")
    }
}

impl TrackerConfig {
    /// Create config rooted at a space directory
    pub fn new(space_root: impl Into<PathBuf>) -> Self {
        let root = space_root.into();
        Self {
            state_dir: root.join(".redline/changes"),
            space_root: root,
            max_snapshot_bytes: DEFAULT_MAX_SNAPSHOT_BYTES,
            retention_days: DEFAULT_RETENTION_DAYS,
            read_retry_attempts: 2,
            read_retry_delay_ms: 40,
        }
    }

    /// Set the state directory
    pub fn with_state_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_dir = path.into();
        self
    }

    /// Set the snapshot size ceiling
    pub fn with_max_snapshot_bytes(mut self, bytes: usize) -> Self {
        self.max_snapshot_bytes = bytes;
        self
    }

    /// Set the retention window
    pub fn with_retention_days(mut self, days: i64) -> Self {
        self.retention_days = days;
        self
    }

    /// Set the read retry policy
    pub fn with_read_retry(mut self, attempts: u32, delay_ms: u64) -> Self {
        self.read_retry_attempts = attempts;
        self.read_retry_delay_ms = delay_ms;
        self
    }
}
