//! On-disk change-set persistence
//!
//! Layout: one directory per session (encoded name) holding one JSON
//! document per run plus an `index.json` summary array. The index is the
//! fast path for listing; when it is missing or empty it is rebuilt from the
//! run documents and written back. Corrupt documents are treated as absent
//! so the rebuild self-heals instead of failing.
//!
//! Writes are plain read-modify-write with no cross-request locking; two
//! writers hitting the same run document race last-write-wins. Accepted for
//! the one-active-run-per-session workload; a per-(session, run) mutex or a
//! revision counter on the document are the alternatives if that changes.

use chrono::{Duration, Utc};
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, warn};

use super::types::{ChangeSet, ChangeSetId, ChangeSetSummary, decode_component, encode_component};
use crate::error::{RedlineError, RedlineResult};

/// Reserved summary-index file name inside each session directory
pub const INDEX_FILE: &str = "index.json";

/// File-backed store for change sets and session indexes
pub struct ChangeSetStore {
    state_dir: PathBuf,
    retention_days: i64,
}

impl ChangeSetStore {
    /// Create a store over a state directory
    pub fn new(state_dir: impl Into<PathBuf>, retention_days: i64) -> Self {
        Self {
            state_dir: state_dir.into(),
            retention_days,
        }
    }

    fn session_dir(&self, session_key: &str) -> PathBuf {
        self.state_dir.join(encode_component(session_key))
    }

    fn run_path(&self, session_key: &str, run_id: &str) -> PathBuf {
        self.session_dir(session_key)
            .join(format!("{}.json", encode_component(run_id)))
    }

    fn index_path(&self, session_key: &str) -> PathBuf {
        self.session_dir(session_key).join(INDEX_FILE)
    }

    async fn ensure_session_dir(&self, session_key: &str) -> RedlineResult<()> {
        fs::create_dir_all(self.session_dir(session_key))
            .await
            .map_err(|e| {
                RedlineError::storage(format!("Failed to create session directory: {}", e))
            })?;
        Ok(())
    }

    /// Persist a change set document
    pub async fn save_change_set(&self, change_set: &ChangeSet) -> RedlineResult<()> {
        self.ensure_session_dir(&change_set.session_key).await?;
        let json = serde_json::to_string_pretty(change_set)
            .map_err(|e| RedlineError::json(format!("Failed to serialize change set: {}", e)))?;
        let path = self.run_path(&change_set.session_key, &change_set.run_id);
        fs::write(&path, json)
            .await
            .map_err(|e| RedlineError::storage(format!("Failed to write change set: {}", e)))?;
        debug!("Saved change set {} to {:?}", change_set.id, path);
        Ok(())
    }

    /// Load a change set; None when absent or unreadable
    pub async fn load_change_set(
        &self,
        session_key: &str,
        run_id: &str,
    ) -> RedlineResult<Option<ChangeSet>> {
        let path = self.run_path(session_key, run_id);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| RedlineError::storage(format!("Failed to read change set: {}", e)))?;
        match serde_json::from_str(&content) {
            Ok(change_set) => Ok(Some(change_set)),
            Err(e) => {
                warn!("Treating corrupt change set {:?} as absent: {}", path, e);
                Ok(None)
            }
        }
    }

    /// Load by composite id; None when the id is malformed or absent
    pub async fn load_by_id(&self, id: &ChangeSetId) -> RedlineResult<Option<ChangeSet>> {
        match id.parse() {
            Some((session_key, run_id)) => self.load_change_set(&session_key, &run_id).await,
            None => Ok(None),
        }
    }

    /// Delete a change set document if present
    pub async fn delete_change_set(&self, session_key: &str, run_id: &str) -> RedlineResult<()> {
        let path = self.run_path(session_key, run_id);
        if path.exists() {
            fs::remove_file(&path)
                .await
                .map_err(|e| RedlineError::storage(format!("Failed to delete change set: {}", e)))?;
            debug!("Deleted change set {}~{}", session_key, run_id);
        }
        Ok(())
    }

    /// List summaries for a session, most recent first
    ///
    /// Prefers the index; a missing or empty index is rebuilt from the run
    /// documents and written back.
    pub async fn list_change_sets(&self, session_key: &str) -> RedlineResult<Vec<ChangeSetSummary>> {
        if let Some(summaries) = self.read_index(session_key).await? {
            if !summaries.is_empty() {
                return Ok(summaries);
            }
        }

        let rebuilt = self.rebuild_index(session_key).await?;
        if !rebuilt.is_empty() {
            self.write_index(session_key, &rebuilt).await?;
            debug!(
                "Rebuilt index for session '{}' from {} run documents",
                session_key,
                rebuilt.len()
            );
        }
        Ok(rebuilt)
    }

    /// Upsert one change set's summary into its session index
    pub async fn update_session_index(&self, change_set: &ChangeSet) -> RedlineResult<()> {
        let mut summaries = match self.read_index(&change_set.session_key).await? {
            Some(existing) => existing,
            None => self.rebuild_index(&change_set.session_key).await?,
        };

        let summary = ChangeSetSummary::from(change_set);
        match summaries.iter_mut().find(|s| s.id == summary.id) {
            Some(slot) => *slot = summary,
            None => summaries.push(summary),
        }
        sort_newest_first(&mut summaries);
        self.write_index(&change_set.session_key, &summaries).await
    }

    /// Remove change sets older than the retention window; returns how many
    /// were deleted. Sweeps every session when none is given.
    pub async fn prune_old_change_sets(&self, session_key: Option<&str>) -> RedlineResult<usize> {
        let cutoff = Utc::now() - Duration::days(self.retention_days);
        let sessions = match session_key {
            Some(key) => vec![key.to_string()],
            None => self.list_sessions().await?,
        };

        let mut pruned = 0;
        for session in sessions {
            let summaries = self.list_change_sets(&session).await?;
            let (old, kept): (Vec<_>, Vec<_>) = summaries
                .into_iter()
                .partition(|s| s.effective_time() < cutoff);

            for summary in &old {
                self.delete_change_set(&session, &summary.run_id).await?;
            }
            pruned += old.len();

            if old.is_empty() {
                continue;
            }
            if kept.is_empty() {
                let index_path = self.index_path(&session);
                if index_path.exists() {
                    fs::remove_file(&index_path).await.map_err(|e| {
                        RedlineError::storage(format!("Failed to remove index: {}", e))
                    })?;
                }
                // Drop the now-empty session directory; ignore failure if
                // something else still lives there.
                let _ = fs::remove_dir(self.session_dir(&session)).await;
            } else {
                self.write_index(&session, &kept).await?;
            }
        }

        Ok(pruned)
    }

    /// Session keys with on-disk state
    pub async fn list_sessions(&self) -> RedlineResult<Vec<String>> {
        if !self.state_dir.exists() {
            return Ok(Vec::new());
        }
        let mut sessions = Vec::new();
        let mut entries = fs::read_dir(&self.state_dir)
            .await
            .map_err(|e| RedlineError::storage(format!("Failed to read state directory: {}", e)))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| RedlineError::storage(format!("Failed to read directory entry: {}", e)))?
        {
            let metadata = entry
                .metadata()
                .await
                .map_err(|e| RedlineError::storage(format!("Failed to read metadata: {}", e)))?;
            if !metadata.is_dir() {
                continue;
            }
            if let Some(session) = decode_component(&entry.file_name().to_string_lossy()) {
                sessions.push(session);
            }
        }
        sessions.sort();
        Ok(sessions)
    }

    async fn read_index(&self, session_key: &str) -> RedlineResult<Option<Vec<ChangeSetSummary>>> {
        let path = self.index_path(session_key);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| RedlineError::storage(format!("Failed to read index: {}", e)))?;
        match serde_json::from_str(&content) {
            Ok(summaries) => Ok(Some(summaries)),
            Err(e) => {
                warn!("Treating corrupt index {:?} as absent: {}", path, e);
                Ok(None)
            }
        }
    }

    async fn write_index(
        &self,
        session_key: &str,
        summaries: &[ChangeSetSummary],
    ) -> RedlineResult<()> {
        self.ensure_session_dir(session_key).await?;
        let json = serde_json::to_string_pretty(summaries)
            .map_err(|e| RedlineError::json(format!("Failed to serialize index: {}", e)))?;
        fs::write(self.index_path(session_key), json)
            .await
            .map_err(|e| RedlineError::storage(format!("Failed to write index: {}", e)))?;
        Ok(())
    }

    /// Scan run documents and project summaries, newest first
    async fn rebuild_index(&self, session_key: &str) -> RedlineResult<Vec<ChangeSetSummary>> {
        let dir = self.session_dir(session_key);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut summaries = Vec::new();
        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(|e| RedlineError::storage(format!("Failed to read session directory: {}", e)))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| RedlineError::storage(format!("Failed to read directory entry: {}", e)))?
        {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == INDEX_FILE || path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let Some(stem) = path.file_stem() else {
                continue;
            };
            let Some(run_id) = decode_component(&stem.to_string_lossy()) else {
                continue;
            };
            if let Some(change_set) = self.load_change_set(session_key, &run_id).await? {
                summaries.push(ChangeSetSummary::from(&change_set));
            }
        }

        sort_newest_first(&mut summaries);
        Ok(summaries)
    }
}

fn sort_newest_first(summaries: &mut [ChangeSetSummary]) {
    summaries.sort_by(|a, b| b.effective_time().cmp(&a.effective_time()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::types::{ChangeFileEntry, FileStats, RunStatus};
    use tempfile::TempDir;

    fn store(temp: &TempDir) -> ChangeSetStore {
        ChangeSetStore::new(temp.path().join("changes"), 30)
    }

    fn sample_change_set(session: &str, run: &str) -> ChangeSet {
        let mut cs = ChangeSet::new(session, run);
        let mut entry = ChangeFileEntry::new("notes.md", true, "hello\n".to_string());
        entry.after_content = "hello\nworld\n".to_string();
        entry.stats = Some(FileStats {
            additions: 1,
            deletions: 0,
        });
        cs.files.push(entry);
        cs.recompute_totals();
        cs
    }

    #[tokio::test]
    async fn test_save_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let cs = sample_change_set("main", "r1");

        store.save_change_set(&cs).await.unwrap();
        let loaded = store.load_change_set("main", "r1").await.unwrap().unwrap();
        assert_eq!(loaded.id, cs.id);
        assert_eq!(loaded.files.len(), 1);
        assert_eq!(loaded.files[0].after_content, "hello\nworld\n");
    }

    #[tokio::test]
    async fn test_exotic_keys_roundtrip() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let cs = sample_change_set("user@host/thread 1", "run.7~x");

        store.save_change_set(&cs).await.unwrap();
        let loaded = store
            .load_change_set("user@host/thread 1", "run.7~x")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.run_id, "run.7~x");

        let by_id = store.load_by_id(&cs.id).await.unwrap().unwrap();
        assert_eq!(by_id.session_key, "user@host/thread 1");
    }

    #[tokio::test]
    async fn test_load_missing_and_malformed_id() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        assert!(store.load_change_set("main", "r1").await.unwrap().is_none());
        assert!(
            store
                .load_by_id(&ChangeSetId::from_string("garbage"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_corrupt_document_treated_as_absent() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let cs = sample_change_set("main", "r1");
        store.save_change_set(&cs).await.unwrap();

        std::fs::write(
            temp.path().join("changes").join("main").join("r1.json"),
            "{ not json",
        )
        .unwrap();
        assert!(store.load_change_set("main", "r1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_index_upsert_and_ordering() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let mut older = sample_change_set("main", "r1");
        older.ended_at = Some(Utc::now() - Duration::minutes(10));
        let mut newer = sample_change_set("main", "r2");
        newer.ended_at = Some(Utc::now());

        store.save_change_set(&older).await.unwrap();
        store.update_session_index(&older).await.unwrap();
        store.save_change_set(&newer).await.unwrap();
        store.update_session_index(&newer).await.unwrap();

        // Upsert replaces rather than duplicates
        store.update_session_index(&older).await.unwrap();

        let summaries = store.list_change_sets("main").await.unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].run_id, "r2");
        assert_eq!(summaries[1].run_id, "r1");
    }

    #[tokio::test]
    async fn test_index_rebuild_after_loss() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let cs1 = sample_change_set("main", "r1");
        let cs2 = sample_change_set("main", "r2");
        store.save_change_set(&cs1).await.unwrap();
        store.update_session_index(&cs1).await.unwrap();
        store.save_change_set(&cs2).await.unwrap();
        store.update_session_index(&cs2).await.unwrap();

        let index_path = temp.path().join("changes").join("main").join("index.json");
        std::fs::remove_file(&index_path).unwrap();

        let summaries = store.list_change_sets("main").await.unwrap();
        assert_eq!(summaries.len(), 2);
        // Self-healing: the rebuilt index was written back
        assert!(index_path.exists());
    }

    #[tokio::test]
    async fn test_rebuild_skips_corrupt_documents() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let cs = sample_change_set("main", "r1");
        store.save_change_set(&cs).await.unwrap();
        std::fs::write(
            temp.path().join("changes").join("main").join("bad.json"),
            "{ not json",
        )
        .unwrap();

        let summaries = store.list_change_sets("main").await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].run_id, "r1");
    }

    #[tokio::test]
    async fn test_prune_respects_retention_window() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let old = sample_change_set("main", "old")
            .with_started_at(Utc::now() - Duration::days(40))
            .with_status(RunStatus::Completed);
        let fresh = sample_change_set("main", "fresh");
        store.save_change_set(&old).await.unwrap();
        store.update_session_index(&old).await.unwrap();
        store.save_change_set(&fresh).await.unwrap();
        store.update_session_index(&fresh).await.unwrap();

        let pruned = store.prune_old_change_sets(Some("main")).await.unwrap();
        assert_eq!(pruned, 1);

        let summaries = store.list_change_sets("main").await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].run_id, "fresh");
        assert!(store.load_change_set("main", "old").await.unwrap().is_none());
        assert!(store.load_change_set("main", "fresh").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_prune_sweeps_all_sessions() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let a = sample_change_set("alpha", "r1").with_started_at(Utc::now() - Duration::days(45));
        let b = sample_change_set("beta", "r1").with_started_at(Utc::now() - Duration::days(45));
        store.save_change_set(&a).await.unwrap();
        store.update_session_index(&a).await.unwrap();
        store.save_change_set(&b).await.unwrap();
        store.update_session_index(&b).await.unwrap();

        let pruned = store.prune_old_change_sets(None).await.unwrap();
        assert_eq!(pruned, 2);
        assert!(store.list_change_sets("alpha").await.unwrap().is_empty());
        assert!(store.list_change_sets("beta").await.unwrap().is_empty());
    }
}
