//! Space file watching
//!
//! Debounced file-system watcher over a space directory, translating raw
//! notifications into page events for the recorder. Hidden entries (the
//! engine's own state directory included), the space configuration file, and
//! non-markdown files are filtered out before anything reaches the channel.

use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{DebouncedEvent, DebouncedEventKind, Debouncer, new_debouncer};
use redline_core::pages::SPACE_CONFIG_FILE;
use redline_core::{PageEvent, PageEventKind};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Configuration for the space watcher
#[derive(Debug, Clone)]
pub struct SpaceWatcherConfig {
    /// Debounce duration for file events
    pub debounce: Duration,
}

impl Default for SpaceWatcherConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
        }
    }
}

/// Debounced watcher over a space directory
pub struct SpaceWatcher {
    /// Keeps the underlying file watcher alive
    #[allow(dead_code)]
    debouncer: Debouncer<RecommendedWatcher>,
    event_rx: mpsc::UnboundedReceiver<PageEvent>,
}

impl SpaceWatcher {
    /// Watch a space directory recursively
    pub fn new(space_root: &Path, config: SpaceWatcherConfig) -> anyhow::Result<Self> {
        let root: PathBuf = space_root
            .canonicalize()
            .unwrap_or_else(|_| space_root.to_path_buf());
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let callback_root = root.clone();
        let mut debouncer = new_debouncer(
            config.debounce,
            move |result: Result<Vec<DebouncedEvent>, notify::Error>| match result {
                Ok(events) => {
                    for event in events {
                        if !matches!(event.kind, DebouncedEventKind::Any) {
                            continue;
                        }
                        let Some(page_event) = to_page_event(&callback_root, &event.path) else {
                            continue;
                        };
                        if let Err(e) = event_tx.send(page_event) {
                            error!("Failed to forward page event: {}", e);
                        }
                    }
                }
                Err(e) => error!("File watcher error: {}", e),
            },
        )?;

        debouncer.watcher().watch(&root, RecursiveMode::Recursive)?;
        info!("Watching space directory: {:?}", root);

        Ok(Self {
            debouncer,
            event_rx,
        })
    }

    /// Get the next page event (async)
    pub async fn next_event(&mut self) -> Option<PageEvent> {
        self.event_rx.recv().await
    }
}

/// Map a raw notification to a page event; None for paths outside the
/// tracked page set
///
/// The debouncer carries no create/modify/delete detail. A missing file is a
/// removal, anything else a change; the recorder derives creation from the
/// absence of a baseline entry.
fn to_page_event(root: &Path, path: &Path) -> Option<PageEvent> {
    let page_path = page_path_from_fs(root, path)?;
    let kind = if path.exists() {
        PageEventKind::FileChanged
    } else {
        PageEventKind::FileRemoved
    };
    Some(PageEvent::new(page_path, kind).with_timestamp(chrono::Utc::now()))
}

/// Convert an absolute notification path to a relative page path
fn page_path_from_fs(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        let part = component.as_os_str().to_str()?;
        if part.starts_with('.') || part == SPACE_CONFIG_FILE {
            return None;
        }
        parts.push(part);
    }
    let joined = parts.join("/");
    if !joined.ends_with(".md") {
        return None;
    }
    Some(joined)
}
