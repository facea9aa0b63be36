//! Change-tracking type definitions
//!
//! This module defines the persisted data model: change sets, per-file
//! entries, hunks, summaries, and the events that drive recording. Documents
//! are serialized as camelCase JSON, matching the on-disk contract consumed
//! by the web surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Characters stored verbatim in encoded identifier components; everything
/// else becomes `%XX`. The set excludes `.` and `~`, so encoded components
/// can never collide with the id separator, dotted file artifacts, or
/// traversal sequences.
fn is_safe_id_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

/// Encode one identifier component (session key or run id) to a
/// filesystem-safe token.
pub(crate) fn encode_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for b in raw.bytes() {
        if is_safe_id_byte(b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

/// Decode a token produced by [`encode_component`]; None on malformed input.
pub(crate) fn decode_component(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes.get(i + 1..i + 3)?;
            let hex = std::str::from_utf8(hex).ok()?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

/// Identifier of a change set, reversibly derived from (sessionKey, runId)
///
/// The encoded form is `{session}~{run}` with both components
/// percent-encoded, so a single opaque token addresses a change set at the
/// API boundary and still decodes back to its parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeSetId(pub String);

impl ChangeSetId {
    /// Derive the id for a (sessionKey, runId) pair
    pub fn from_parts(session_key: &str, run_id: &str) -> Self {
        Self(format!(
            "{}~{}",
            encode_component(session_key),
            encode_component(run_id)
        ))
    }

    /// Wrap an already-encoded id
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Recover (sessionKey, runId); None when the token is malformed
    pub fn parse(&self) -> Option<(String, String)> {
        let (session, run) = self.0.split_once('~')?;
        if run.contains('~') {
            return None;
        }
        Some((decode_component(session)?, decode_component(run)?))
    }

    /// Get the id as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChangeSetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a change set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Run in progress, entries still being recorded
    Active,
    /// Run closed, totals final
    Completed,
    /// Synthesized inverse of a completed change set
    Undo,
}

/// Kind of raw file-system notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageEventKind {
    FileAdded,
    FileChanged,
    FileRemoved,
}

/// One watcher notification, forwarded into the recorder
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageEvent {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: PageEventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl PageEvent {
    pub fn new(path: impl Into<String>, kind: PageEventKind) -> Self {
        Self {
            path: path.into(),
            kind,
            timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Line-diff counts for one file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStats {
    pub additions: u64,
    pub deletions: u64,
}

/// Aggregated counts over a change set, always recomputed from its files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeTotals {
    pub additions: u64,
    pub deletions: u64,
    pub files_changed: u64,
}

/// One contiguous region of line changes within a file entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeHunk {
    /// Stable identifier: `{path}:{oldStart}:{newStart}:{index}`
    pub id: String,
    /// 1-based first line of the hunk in the before text
    pub old_start: u64,
    /// Line count of the hunk in the before text
    pub old_lines: u64,
    /// 1-based first line of the hunk in the after text
    pub new_start: u64,
    /// Line count of the hunk in the after text
    pub new_lines: u64,
    /// Prefixed diff lines (`+`, `-`, or space), each keeping its own ending
    pub lines: Vec<String>,
}

/// Per-file state within a change set
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeFileEntry {
    /// Relative, validated page path
    pub path: String,
    /// Full text before the run ("" when the file did not exist)
    pub before_content: String,
    /// Full text after the latest recorded event ("" when removed)
    pub after_content: String,
    pub exists_before: bool,
    pub exists_after: bool,
    /// Either snapshot exceeded the size ceiling; stats and hunks suppressed
    pub too_large: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<FileStats>,
    /// Memoized hunks, computed on first enriched load
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hunks: Option<Vec<ChangeHunk>>,
}

impl ChangeFileEntry {
    /// Entry seeded from a known before-state
    pub fn new(path: impl Into<String>, exists_before: bool, before_content: String) -> Self {
        Self {
            path: path.into(),
            before_content,
            after_content: String::new(),
            exists_before,
            exists_after: true,
            too_large: false,
            stats: None,
            hunks: None,
        }
    }
}

/// The unit of tracked work for one (sessionKey, runId) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSet {
    pub id: ChangeSetId,
    pub session_key: String,
    pub run_id: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    /// Ordered by first touch, unique per path
    pub files: Vec<ChangeFileEntry>,
    pub totals: ChangeTotals,
}

impl ChangeSet {
    /// Create an active change set starting now
    pub fn new(session_key: impl Into<String>, run_id: impl Into<String>) -> Self {
        let session_key = session_key.into();
        let run_id = run_id.into();
        let now = Utc::now();
        Self {
            id: ChangeSetId::from_parts(&session_key, &run_id),
            session_key,
            run_id,
            status: RunStatus::Active,
            started_at: now,
            ended_at: None,
            updated_at: now,
            files: Vec::new(),
            totals: ChangeTotals::default(),
        }
    }

    /// Set the initial status
    pub fn with_status(mut self, status: RunStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the start timestamp
    pub fn with_started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self.updated_at = started_at;
        self
    }

    /// Find a file entry by path
    pub fn file_entry(&self, path: &str) -> Option<&ChangeFileEntry> {
        self.files.iter().find(|f| f.path == path)
    }

    /// Find a file entry by path, mutably
    pub fn file_entry_mut(&mut self, path: &str) -> Option<&mut ChangeFileEntry> {
        self.files.iter_mut().find(|f| f.path == path)
    }

    /// Recompute totals from the file entries
    pub fn recompute_totals(&mut self) {
        let mut totals = ChangeTotals {
            files_changed: self.files.len() as u64,
            ..Default::default()
        };
        for file in &self.files {
            if let Some(stats) = &file.stats {
                totals.additions += stats.additions;
                totals.deletions += stats.deletions;
            }
        }
        self.totals = totals;
    }

    /// Stamp the last-modified time
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// The instant used for ordering and retention
    pub fn effective_time(&self) -> DateTime<Utc> {
        self.ended_at.unwrap_or(self.started_at)
    }
}

/// Per-file projection used in summaries
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSummary {
    pub path: String,
    pub additions: u64,
    pub deletions: u64,
    pub too_large: bool,
}

/// Projection of a change set without full content, used for listing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSetSummary {
    pub id: ChangeSetId,
    pub session_key: String,
    pub run_id: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub totals: ChangeTotals,
    pub files: Vec<FileSummary>,
}

impl ChangeSetSummary {
    /// The instant used for ordering and retention
    pub fn effective_time(&self) -> DateTime<Utc> {
        self.ended_at.unwrap_or(self.started_at)
    }
}

impl From<&ChangeSet> for ChangeSetSummary {
    fn from(change_set: &ChangeSet) -> Self {
        Self {
            id: change_set.id.clone(),
            session_key: change_set.session_key.clone(),
            run_id: change_set.run_id.clone(),
            status: change_set.status,
            started_at: change_set.started_at,
            ended_at: change_set.ended_at,
            totals: change_set.totals,
            files: change_set
                .files
                .iter()
                .map(|f| FileSummary {
                    path: f.path.clone(),
                    additions: f.stats.map(|s| s.additions).unwrap_or(0),
                    deletions: f.stats.map(|s| s.deletions).unwrap_or(0),
                    too_large: f.too_large,
                })
                .collect(),
        }
    }
}

/// Granularity of a revert request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevertTarget {
    /// Undo one hunk by applying its reverse patch to the live page
    Hunk { path: String, hunk_id: String },
    /// Restore one file to its before-state
    File { path: String },
    /// Restore every file in the change set
    All,
}

/// Result of a revert request
#[derive(Debug, Clone)]
pub struct RevertOutcome {
    /// False when the target was missing or the patch no longer applied
    pub applied: bool,
    /// The change set after the revert (unchanged when not applied)
    pub change_set: ChangeSet,
}
