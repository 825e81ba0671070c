//! File system abstraction for testability.

use async_trait::async_trait;
use std::path::Path;

/// Abstraction over the archive's file system operations.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Returns the size of a file if it exists.
    async fn file_size(&self, path: &Path) -> Option<u64>;

    /// Returns true if `path` is an existing directory.
    async fn dir_exists(&self, path: &Path) -> bool;

    /// Lists the names of the directories directly inside `path`.
    async fn list_dirs(&self, path: &Path) -> std::io::Result<Vec<String>>;

    /// Creates all directories in the given path. Existing directories are not an error.
    async fn create_dir_all(&self, path: &Path) -> std::io::Result<()>;

    /// Opens a file for writing, either appending to it or truncating it.
    async fn open_for_write(&self, path: &Path, append: bool) -> std::io::Result<tokio::fs::File>;
}

/// Default file system implementation using `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFileSystem;

impl TokioFileSystem {
    /// Creates a new `TokioFileSystem` instance.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileSystem for TokioFileSystem {
    async fn file_size(&self, path: &Path) -> Option<u64> {
        tokio::fs::metadata(path)
            .await
            .ok()
            .filter(std::fs::Metadata::is_file)
            .map(|m| m.len())
    }

    async fn dir_exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path).await.is_ok_and(|m| m.is_dir())
    }

    async fn list_dirs(&self, path: &Path) -> std::io::Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(path).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn create_dir_all(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }

    async fn open_for_write(&self, path: &Path, append: bool) -> std::io::Result<tokio::fs::File> {
        let mut options = tokio::fs::OpenOptions::new();
        if append {
            options.append(true).create(true);
        } else {
            options.write(true).create(true).truncate(true);
        }
        options.open(path).await
    }
}
