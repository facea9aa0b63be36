//! Change recording service
//!
//! Orchestrates the engine: ensures a change set per run, merges one file
//! entry per watcher event, finalizes runs (including orphans whose end
//! signal was lost), materializes hunks lazily, reverts at hunk, file, or
//! run granularity, and synthesizes undo change sets.
//!
//! Per change set the lifecycle is none -> active -> completed; `undo` is a
//! one-shot terminal state reachable only by synthesis.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::baseline::BaselineStore;
use super::diff::{apply_reverse_patch, build_reverse_patch, compute_hunks, compute_stats};
use super::store::ChangeSetStore;
use super::types::{
    ChangeFileEntry, ChangeSet, ChangeSetId, ChangeSetSummary, PageEvent, PageEventKind,
    RevertOutcome, RevertTarget, RunStatus,
};
use crate::config::TrackerConfig;
use crate::error::{RedlineError, RedlineResult};
use crate::pages::{PageStore, validate_page_path};

/// High-level recording and revert service over the store, the page layer,
/// and the injected baseline cache
pub struct ChangeRecorder {
    config: TrackerConfig,
    store: ChangeSetStore,
    pages: Arc<dyn PageStore>,
    baselines: Arc<BaselineStore>,
}

impl ChangeRecorder {
    /// Create a recorder; the store lives under the configured state dir
    pub fn new(
        config: TrackerConfig,
        pages: Arc<dyn PageStore>,
        baselines: Arc<BaselineStore>,
    ) -> Self {
        let store = ChangeSetStore::new(config.state_dir.clone(), config.retention_days);
        Self {
            config,
            store,
            pages,
            baselines,
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Idempotent create-or-fetch of the change set for a run
    pub async fn ensure_change_set(
        &self,
        session_key: &str,
        run_id: &str,
        status: Option<RunStatus>,
        started_at: Option<DateTime<Utc>>,
    ) -> RedlineResult<ChangeSet> {
        if run_id == "index" {
            // Would collide with the session's index.json document
            return Err(RedlineError::invalid_input("run id 'index' is reserved"));
        }

        if let Some(existing) = self.store.load_change_set(session_key, run_id).await? {
            return Ok(existing);
        }

        let mut change_set = ChangeSet::new(session_key, run_id);
        if let Some(status) = status {
            change_set.status = status;
        }
        if let Some(started_at) = started_at {
            change_set = change_set.with_started_at(started_at);
        }
        self.store.save_change_set(&change_set).await?;
        self.store.update_session_index(&change_set).await?;
        info!("Started change set {}", change_set.id);
        Ok(change_set)
    }

    /// Merge one watcher event into the run's change set
    ///
    /// The path is validated before anything mutates. Events for the same
    /// path merge into one entry; the first event seeds the before-state
    /// from the baseline (except `file-added`, which forces a created
    /// entry). The after-state re-reads the live page with bounded retries
    /// to absorb the watcher/write race, keeping the last known value when
    /// they exhaust.
    pub async fn record_file_event(
        &self,
        session_key: &str,
        run_id: &str,
        event: PageEvent,
    ) -> RedlineResult<ChangeSet> {
        validate_page_path(&event.path)?;
        let mut change_set = self.ensure_change_set(session_key, run_id, None, None).await?;

        let after_read = match event.kind {
            PageEventKind::FileRemoved => None,
            _ => self.read_page_with_retry(&event.path).await,
        };

        let index = match change_set.files.iter().position(|f| f.path == event.path) {
            Some(index) => index,
            None => {
                let entry = match event.kind {
                    PageEventKind::FileAdded => {
                        ChangeFileEntry::new(&event.path, false, String::new())
                    }
                    _ => match self.baselines.get(session_key, run_id, &event.path).await {
                        Some(base) => {
                            let mut entry =
                                ChangeFileEntry::new(&event.path, true, base.content);
                            entry.too_large = base.too_large;
                            entry
                        }
                        // No baseline means the page did not exist at run start
                        None => ChangeFileEntry::new(&event.path, false, String::new()),
                    },
                };
                change_set.files.push(entry);
                change_set.files.len() - 1
            }
        };

        let entry = &mut change_set.files[index];
        match event.kind {
            PageEventKind::FileAdded => {
                entry.exists_before = false;
                entry.before_content.clear();
                entry.exists_after = true;
            }
            PageEventKind::FileChanged => {
                entry.exists_after = true;
            }
            PageEventKind::FileRemoved => {
                entry.exists_after = false;
            }
        }

        match event.kind {
            PageEventKind::FileRemoved => entry.after_content.clear(),
            _ => match after_read {
                Some(content) if content.len() > self.config.max_snapshot_bytes => {
                    entry.too_large = true;
                    entry.after_content.clear();
                }
                Some(content) => entry.after_content = content,
                // Retries exhausted; keep the last known after-state
                None => {}
            },
        }

        entry.hunks = None;
        entry.stats = if entry.too_large {
            None
        } else {
            Some(compute_stats(&entry.before_content, &entry.after_content))
        };

        change_set.recompute_totals();
        change_set.updated_at = event.timestamp.unwrap_or_else(Utc::now);
        self.store.save_change_set(&change_set).await?;
        self.store.update_session_index(&change_set).await?;
        debug!(
            "Recorded {:?} of {} in {}",
            event.kind, event.path, change_set.id
        );
        Ok(change_set)
    }

    /// Close a run's change set; None when no change set exists for it
    pub async fn finalize_change_set(
        &self,
        session_key: &str,
        run_id: &str,
        ended_at: Option<DateTime<Utc>>,
    ) -> RedlineResult<Option<ChangeSet>> {
        let Some(mut change_set) = self.store.load_change_set(session_key, run_id).await? else {
            return Ok(None);
        };

        if change_set.status == RunStatus::Active {
            change_set.status = RunStatus::Completed;
        }
        change_set.ended_at = Some(ended_at.unwrap_or_else(Utc::now));
        change_set.recompute_totals();
        change_set.touch();
        self.store.save_change_set(&change_set).await?;
        self.store.update_session_index(&change_set).await?;
        self.baselines.clear(session_key, run_id).await;
        info!("Completed change set {}", change_set.id);
        Ok(Some(change_set))
    }

    /// Force-complete every other active run of a session, releasing their
    /// baselines; returns the closed run ids. Covers runs whose end signal
    /// was lost before a new run starts.
    pub async fn finalize_orphaned_runs(
        &self,
        session_key: &str,
        exclude_run: &str,
    ) -> RedlineResult<Vec<String>> {
        let summaries = self.store.list_change_sets(session_key).await?;
        let mut closed = Vec::new();
        for summary in summaries {
            if summary.status != RunStatus::Active || summary.run_id == exclude_run {
                continue;
            }
            if self
                .finalize_change_set(session_key, &summary.run_id, None)
                .await?
                .is_some()
            {
                closed.push(summary.run_id);
            }
        }
        if !closed.is_empty() {
            info!(
                "Closed {} orphaned run(s) for session '{}'",
                closed.len(),
                session_key
            );
        }
        Ok(closed)
    }

    /// Load a change set with hunks computed and memoized
    ///
    /// Hunks for non-oversized entries are computed on first load and
    /// written back, so repeat reads are cheap.
    pub async fn load_change_set_with_hunks(
        &self,
        session_key: &str,
        run_id: &str,
    ) -> RedlineResult<Option<ChangeSet>> {
        let Some(mut change_set) = self.store.load_change_set(session_key, run_id).await? else {
            return Ok(None);
        };

        let mut computed = false;
        for entry in &mut change_set.files {
            if entry.too_large || entry.hunks.is_some() {
                continue;
            }
            let hunks = compute_hunks(&entry.path, &entry.before_content, &entry.after_content);
            entry.hunks = Some(hunks);
            computed = true;
        }
        if computed {
            change_set.touch();
            self.store.save_change_set(&change_set).await?;
        }
        Ok(Some(change_set))
    }

    /// Load by composite id with hunks; None when malformed or absent
    pub async fn load_by_id_with_hunks(
        &self,
        id: &ChangeSetId,
    ) -> RedlineResult<Option<ChangeSet>> {
        match id.parse() {
            Some((session_key, run_id)) => {
                self.load_change_set_with_hunks(&session_key, &run_id).await
            }
            None => Ok(None),
        }
    }

    /// Revert at hunk, file, or whole-change-set granularity
    ///
    /// Hunk mode patches the live page content, tolerating edits since the
    /// last sync; a context mismatch, a missing hunk, or a missing page
    /// yields `applied=false`, never an error. File mode restores the
    /// recorded before-state. Snapshots mutate only to reflect the new
    /// current state, and partial progress in all-mode is persisted.
    pub async fn revert_change_set(
        &self,
        mut change_set: ChangeSet,
        target: RevertTarget,
    ) -> RedlineResult<RevertOutcome> {
        let (applied, mutated) = match &target {
            RevertTarget::Hunk { path, hunk_id } => {
                let ok = self.revert_hunk(&mut change_set, path, hunk_id).await?;
                (ok, ok)
            }
            RevertTarget::File { path } => {
                let ok = self.revert_file(&mut change_set, path).await?;
                (ok, ok)
            }
            RevertTarget::All => {
                let paths: Vec<String> =
                    change_set.files.iter().map(|f| f.path.clone()).collect();
                let mut all = true;
                let mut any = false;
                for path in paths {
                    let ok = self.revert_file(&mut change_set, &path).await?;
                    all &= ok;
                    any |= ok;
                }
                (all, any)
            }
        };

        if mutated {
            change_set.recompute_totals();
            change_set.touch();
            self.store.save_change_set(&change_set).await?;
            self.store.update_session_index(&change_set).await?;
        }
        Ok(RevertOutcome {
            applied,
            change_set,
        })
    }

    /// Load by id and revert; None when the change set does not exist
    pub async fn revert_by_id(
        &self,
        id: &ChangeSetId,
        target: RevertTarget,
    ) -> RedlineResult<Option<RevertOutcome>> {
        let Some(change_set) = self.load_by_id_with_hunks(id).await? else {
            return Ok(None);
        };
        Ok(Some(self.revert_change_set(change_set, target).await?))
    }

    /// Synthesize the inverse of a change set: before/after swapped per
    /// file, status `undo`, already closed. Reverting it restores the
    /// original's after-state, giving the caller a redo.
    pub async fn build_undo_change_set(&self, source: &ChangeSet) -> RedlineResult<ChangeSet> {
        let run_id = format!("undo_{}", Uuid::new_v4().simple());
        let mut undo = ChangeSet::new(&source.session_key, run_id);
        undo.status = RunStatus::Undo;
        undo.ended_at = Some(undo.started_at);

        for entry in &source.files {
            let mut swapped =
                ChangeFileEntry::new(&entry.path, entry.exists_after, entry.after_content.clone());
            swapped.exists_after = entry.exists_before;
            swapped.after_content = entry.before_content.clone();
            swapped.too_large = entry.too_large;
            if !swapped.too_large {
                let stats = compute_stats(&swapped.before_content, &swapped.after_content);
                swapped.stats = Some(stats);
            }
            undo.files.push(swapped);
        }

        undo.recompute_totals();
        self.store.save_change_set(&undo).await?;
        self.store.update_session_index(&undo).await?;
        info!("Synthesized undo change set {} from {}", undo.id, source.id);
        Ok(undo)
    }

    /// List summaries for a session, most recent first
    pub async fn list_change_sets(&self, session_key: &str) -> RedlineResult<Vec<ChangeSetSummary>> {
        self.store.list_change_sets(session_key).await
    }

    /// Remove change sets outside the retention window
    pub async fn prune_old_change_sets(&self, session_key: Option<&str>) -> RedlineResult<usize> {
        self.store.prune_old_change_sets(session_key).await
    }

    /// Bounded re-read absorbing the watcher/write visibility race
    async fn read_page_with_retry(&self, path: &str) -> Option<String> {
        for attempt in 0..=self.config.read_retry_attempts {
            if attempt > 0 {
                let delay = self.config.read_retry_delay_ms * u64::from(attempt);
                sleep(Duration::from_millis(delay)).await;
            }
            match self.pages.read_page(path).await {
                Ok(Some(content)) => return Some(content),
                Ok(None) => {}
                Err(e) => debug!("Read of {} failed on attempt {}: {}", path, attempt + 1, e),
            }
        }
        None
    }

    /// Apply one hunk's reverse patch to the live page
    async fn revert_hunk(
        &self,
        change_set: &mut ChangeSet,
        path: &str,
        hunk_id: &str,
    ) -> RedlineResult<bool> {
        let change_set_id = change_set.id.clone();
        let Some(entry) = change_set.file_entry_mut(path) else {
            warn!("No entry for {} in {}; nothing to revert", path, change_set_id);
            return Ok(false);
        };
        if entry.too_large {
            warn!("Cannot revert hunks of oversized {}", path);
            return Ok(false);
        }
        if entry.hunks.is_none() {
            let hunks = compute_hunks(&entry.path, &entry.before_content, &entry.after_content);
            entry.hunks = Some(hunks);
        }
        let Some(hunk) = entry
            .hunks
            .as_ref()
            .and_then(|hunks| hunks.iter().find(|h| h.id == hunk_id))
        else {
            warn!("Hunk {} not found in {}", hunk_id, change_set_id);
            return Ok(false);
        };

        let Some(live) = self.pages.read_page(path).await? else {
            warn!("Cannot revert hunk {}: page {} no longer exists", hunk_id, path);
            return Ok(false);
        };
        let patch = build_reverse_patch(hunk);
        let reverted = match apply_reverse_patch(&live, &patch) {
            Ok(text) => text,
            Err(e) => {
                warn!("Reverse patch for {} no longer applies: {}", path, e);
                return Ok(false);
            }
        };
        self.pages.write_page(path, &reverted).await?;

        entry.after_content = reverted;
        entry.exists_after = true;
        let stats = compute_stats(&entry.before_content, &entry.after_content);
        entry.stats = Some(stats);
        let hunks = compute_hunks(&entry.path, &entry.before_content, &entry.after_content);
        entry.hunks = Some(hunks);
        Ok(true)
    }

    /// Restore one entry to its before-state through the page store
    async fn revert_file(&self, change_set: &mut ChangeSet, path: &str) -> RedlineResult<bool> {
        let change_set_id = change_set.id.clone();
        let Some(entry) = change_set.file_entry_mut(path) else {
            warn!("No entry for {} in {}; nothing to revert", path, change_set_id);
            return Ok(false);
        };
        if entry.too_large {
            // The before-snapshot was not captured, so there is nothing
            // trustworthy to write back.
            warn!("Cannot restore oversized {}", path);
            return Ok(false);
        }

        if entry.exists_before {
            self.pages.write_page(path, &entry.before_content).await?;
        } else {
            // Nothing existed before the run; deleting a page that is
            // already gone (add-then-remove entries) is a no-op.
            self.pages.delete_page(path).await?;
        }

        entry.exists_after = entry.exists_before;
        entry.after_content = entry.before_content.clone();
        let stats = compute_stats(&entry.before_content, &entry.after_content);
        entry.stats = Some(stats);
        let hunks = compute_hunks(&entry.path, &entry.before_content, &entry.after_content);
        entry.hunks = Some(hunks);
        Ok(true)
    }
}
