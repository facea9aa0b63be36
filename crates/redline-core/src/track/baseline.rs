//! Pre-run baseline snapshots
//!
//! At run start the full page tree is captured once into an in-memory cache
//! keyed by (session, run); it supplies the "before" value for the first
//! event touching each file and is dropped when the run ends. The store is an
//! explicit object injected into the recorder so tests can construct
//! isolated instances.

use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::RedlineResult;
use crate::pages::PageStore;

/// Snapshot of one page at run start
#[derive(Debug, Clone)]
pub struct BaselineEntry {
    /// Full content, empty when the page exceeded the size ceiling
    pub content: String,
    /// Page exceeded the size ceiling; content untracked
    pub too_large: bool,
}

/// In-memory baseline cache keyed by (session, run)
pub struct BaselineStore {
    max_snapshot_bytes: usize,
    baselines: RwLock<HashMap<(String, String), HashMap<String, BaselineEntry>>>,
}

impl BaselineStore {
    /// Create a store with the given snapshot size ceiling
    pub fn new(max_snapshot_bytes: usize) -> Self {
        Self {
            max_snapshot_bytes,
            baselines: RwLock::new(HashMap::new()),
        }
    }

    /// Capture the page tree for a run, once; later calls are no-ops while
    /// the entry exists.
    pub async fn build(
        &self,
        session_key: &str,
        run_id: &str,
        pages: &dyn PageStore,
    ) -> RedlineResult<()> {
        let key = (session_key.to_string(), run_id.to_string());
        {
            let baselines = self.baselines.read().await;
            if baselines.contains_key(&key) {
                return Ok(());
            }
        }

        let mut snapshot = HashMap::new();
        for path in pages.list_pages().await? {
            // A page vanishing mid-walk is recorded as absent, same as if it
            // never existed before the run.
            let Some(content) = pages.read_page(&path).await? else {
                continue;
            };
            let entry = if content.len() > self.max_snapshot_bytes {
                BaselineEntry {
                    content: String::new(),
                    too_large: true,
                }
            } else {
                BaselineEntry {
                    content,
                    too_large: false,
                }
            };
            snapshot.insert(path, entry);
        }

        debug!(
            "Captured baseline of {} pages for {}~{}",
            snapshot.len(),
            session_key,
            run_id
        );
        let mut baselines = self.baselines.write().await;
        baselines.entry(key).or_insert(snapshot);
        Ok(())
    }

    /// Cached entry for a path, or None when the walk never ran or never saw
    /// the path; callers treat both as "did not exist before".
    pub async fn get(&self, session_key: &str, run_id: &str, path: &str) -> Option<BaselineEntry> {
        let baselines = self.baselines.read().await;
        baselines
            .get(&(session_key.to_string(), run_id.to_string()))
            .and_then(|snapshot| snapshot.get(path))
            .cloned()
    }

    /// Whether a baseline has been captured for this run
    pub async fn contains(&self, session_key: &str, run_id: &str) -> bool {
        let baselines = self.baselines.read().await;
        baselines.contains_key(&(session_key.to_string(), run_id.to_string()))
    }

    /// Evict a run's baseline; called on run end and orphan reconciliation
    /// to bound memory in long-lived processes.
    pub async fn clear(&self, session_key: &str, run_id: &str) {
        let mut baselines = self.baselines.write().await;
        if baselines
            .remove(&(session_key.to_string(), run_id.to_string()))
            .is_some()
        {
            debug!("Cleared baseline for {}~{}", session_key, run_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pages::MemoryPageStore;

    #[tokio::test]
    async fn test_build_and_get() {
        let pages = MemoryPageStore::new();
        pages.insert("notes.md", "hello\n").await;
        let store = BaselineStore::new(1_000_000);

        store.build("main", "r1", &pages).await.unwrap();
        let entry = store.get("main", "r1", "notes.md").await.unwrap();
        assert_eq!(entry.content, "hello\n");
        assert!(!entry.too_large);

        assert!(store.get("main", "r1", "other.md").await.is_none());
        assert!(store.get("main", "r2", "notes.md").await.is_none());
    }

    #[tokio::test]
    async fn test_build_is_idempotent() {
        let pages = MemoryPageStore::new();
        pages.insert("notes.md", "v1\n").await;
        let store = BaselineStore::new(1_000_000);

        store.build("main", "r1", &pages).await.unwrap();
        pages.write_page("notes.md", "v2\n").await.unwrap();
        store.build("main", "r1", &pages).await.unwrap();

        // Second build did not overwrite the captured snapshot
        let entry = store.get("main", "r1", "notes.md").await.unwrap();
        assert_eq!(entry.content, "v1\n");
    }

    #[tokio::test]
    async fn test_oversized_pages_marked_too_large() {
        let pages = MemoryPageStore::new();
        pages.insert("big.md", "x".repeat(64)).await;
        pages.insert("small.md", "ok\n").await;
        let store = BaselineStore::new(16);

        store.build("main", "r1", &pages).await.unwrap();
        let big = store.get("main", "r1", "big.md").await.unwrap();
        assert!(big.too_large);
        assert!(big.content.is_empty());
        let small = store.get("main", "r1", "small.md").await.unwrap();
        assert!(!small.too_large);
    }

    #[tokio::test]
    async fn test_clear_evicts() {
        let pages = MemoryPageStore::new();
        pages.insert("notes.md", "hello\n").await;
        let store = BaselineStore::new(1_000_000);

        store.build("main", "r1", &pages).await.unwrap();
        assert!(store.contains("main", "r1").await);

        store.clear("main", "r1").await;
        assert!(!store.contains("main", "r1").await);
        assert!(store.get("main", "r1", "notes.md").await.is_none());
    }
}
