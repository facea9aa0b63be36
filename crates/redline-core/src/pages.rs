//! Page storage for markdown spaces
//!
//! A space is a directory tree of markdown pages addressed by validated
//! relative paths. Hidden entries (dot-prefixed, including the engine's own
//! state directory) and the space configuration file are reserved and never
//! listed or tracked.

use crate::error::{RedlineError, RedlineResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Space configuration file name, reserved at the space root
pub const SPACE_CONFIG_FILE: &str = "space.json";

/// Validate a page path: relative, forward slashes, no traversal, no
/// hidden components. Raised before any mutation touches the store.
pub fn validate_page_path(path: &str) -> RedlineResult<()> {
    if path.is_empty() {
        return Err(RedlineError::invalid_path(path, "empty path"));
    }
    if path.starts_with('/') || path.contains('\\') || path.contains(':') {
        return Err(RedlineError::invalid_path(path, "must be relative"));
    }
    for component in path.split('/') {
        if component.is_empty() {
            return Err(RedlineError::invalid_path(path, "empty path component"));
        }
        if component == "." || component == ".." {
            return Err(RedlineError::invalid_path(path, "path traversal"));
        }
        if component.starts_with('.') {
            return Err(RedlineError::invalid_path(path, "hidden entries are reserved"));
        }
    }
    Ok(())
}

/// Trait for page storage backends
#[async_trait]
pub trait PageStore: Send + Sync {
    /// Read a page's content, or None when it does not exist
    async fn read_page(&self, path: &str) -> RedlineResult<Option<String>>;

    /// Write a page, creating parent directories as needed
    async fn write_page(&self, path: &str, content: &str) -> RedlineResult<()>;

    /// Delete a page; deleting a missing page is not an error
    async fn delete_page(&self, path: &str) -> RedlineResult<()>;

    /// List every markdown page in the space, relative paths, sorted
    async fn list_pages(&self) -> RedlineResult<Vec<String>>;
}

/// File-system page store rooted at a space directory
pub struct FsPageStore {
    root: PathBuf,
}

impl FsPageStore {
    /// Create a store over a space directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a validated page path under the space root
    fn page_path(&self, path: &str) -> RedlineResult<PathBuf> {
        validate_page_path(path)?;
        Ok(self.root.join(path))
    }

    fn is_reserved_name(name: &str) -> bool {
        name.starts_with('.') || name == SPACE_CONFIG_FILE
    }

    async fn scan_recursive(&self, dir: &Path, pages: &mut Vec<String>) -> RedlineResult<()> {
        let mut entries = fs::read_dir(dir).await.map_err(|e| {
            RedlineError::storage(format!("Failed to read directory {:?}: {}", dir, e))
        })?;

        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            RedlineError::storage(format!("Failed to read directory entry: {}", e))
        })? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if Self::is_reserved_name(&name) {
                continue;
            }

            let path = entry.path();
            let metadata = entry.metadata().await.map_err(|e| {
                RedlineError::storage(format!("Failed to read metadata for {:?}: {}", path, e))
            })?;

            if metadata.is_dir() {
                Box::pin(self.scan_recursive(&path, pages)).await?;
            } else if metadata.is_file() && path.extension().is_some_and(|ext| ext == "md") {
                let relative = path.strip_prefix(&self.root).unwrap_or(&path);
                let joined = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                pages.push(joined);
            }
        }

        Ok(())
    }
}

#[async_trait]
impl PageStore for FsPageStore {
    async fn read_page(&self, path: &str) -> RedlineResult<Option<String>> {
        let full_path = self.page_path(path)?;
        if !full_path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&full_path)
            .await
            .map_err(|e| RedlineError::io_with_path(format!("Failed to read page: {}", e), path))?;
        Ok(Some(content))
    }

    async fn write_page(&self, path: &str, content: &str) -> RedlineResult<()> {
        let full_path = self.page_path(path)?;
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                RedlineError::io_with_path(format!("Failed to create parent directory: {}", e), path)
            })?;
        }
        fs::write(&full_path, content)
            .await
            .map_err(|e| RedlineError::io_with_path(format!("Failed to write page: {}", e), path))?;
        Ok(())
    }

    async fn delete_page(&self, path: &str) -> RedlineResult<()> {
        let full_path = self.page_path(path)?;
        if full_path.exists() {
            fs::remove_file(&full_path).await.map_err(|e| {
                RedlineError::io_with_path(format!("Failed to delete page: {}", e), path)
            })?;
        }
        Ok(())
    }

    async fn list_pages(&self) -> RedlineResult<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut pages = Vec::new();
        self.scan_recursive(&self.root, &mut pages).await?;
        pages.sort();
        Ok(pages)
    }
}

/// In-memory page store (for testing)
pub struct MemoryPageStore {
    pages: tokio::sync::RwLock<HashMap<String, String>>,
}

impl MemoryPageStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            pages: tokio::sync::RwLock::new(HashMap::new()),
        }
    }

    /// Seed a page, bypassing validation (test setup)
    pub async fn insert(&self, path: impl Into<String>, content: impl Into<String>) {
        let mut pages = self.pages.write().await;
        pages.insert(path.into(), content.into());
    }
}

impl Default for MemoryPageStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageStore for MemoryPageStore {
    async fn read_page(&self, path: &str) -> RedlineResult<Option<String>> {
        validate_page_path(path)?;
        let pages = self.pages.read().await;
        Ok(pages.get(path).cloned())
    }

    async fn write_page(&self, path: &str, content: &str) -> RedlineResult<()> {
        validate_page_path(path)?;
        let mut pages = self.pages.write().await;
        pages.insert(path.to_string(), content.to_string());
        Ok(())
    }

    async fn delete_page(&self, path: &str) -> RedlineResult<()> {
        validate_page_path(path)?;
        let mut pages = self.pages.write().await;
        pages.remove(path);
        Ok(())
    }

    async fn list_pages(&self) -> RedlineResult<Vec<String>> {
        let pages = self.pages.read().await;
        let mut paths: Vec<String> = pages
            .keys()
            .filter(|p| p.ends_with(".md"))
            .cloned()
            .collect();
        paths.sort();
        Ok(paths)
    }
}
