//! Disk storage for uploads when no object store is configured.
//!
//! Files land in `{base_path}/{name}` and are served by the router under
//! `/uploads/{name}`.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

use crate::ports::{FileStore, StorageError};

/// Public URL prefix the router serves `base_path` under.
pub const UPLOADS_ROUTE: &str = "/uploads";

#[derive(Debug, Clone)]
pub struct LocalFileStore {
    base_path: PathBuf,
}

impl LocalFileStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &PathBuf {
        &self.base_path
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn save(&self, name: &str, bytes: &[u8]) -> Result<String, StorageError> {
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.starts_with('.') {
            return Err(StorageError::request(format!("Invalid file name: {}", name)));
        }
        fs::create_dir_all(&self.base_path).await.map_err(|e| {
            StorageError::request(format!(
                "Failed to create upload directory {}: {}",
                self.base_path.display(),
                e
            ))
        })?;
        let path = self.base_path.join(name);
        fs::write(&path, bytes).await.map_err(|e| {
            StorageError::request(format!("Failed to write {}: {}", path.display(), e))
        })?;
        Ok(format!("{}/{}", UPLOADS_ROUTE, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn saves_under_base_and_returns_public_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path().join("uploads"));

        let public = store.save("abc_note.txt", b"hello").await.unwrap();

        assert_eq!(public, "/uploads/abc_note.txt");
        let written = std::fs::read(dir.path().join("uploads/abc_note.txt")).unwrap();
        assert_eq!(written, b"hello");
    }

    #[tokio::test]
    async fn path_traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());
        assert!(store.save("../escape", b"x").await.is_err());
        assert!(store.save("a/b", b"x").await.is_err());
    }
}
