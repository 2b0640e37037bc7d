//! Object storage port - a key/value put plus presigned reads.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Object storage errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    /// No bucket or credentials configured.
    #[error("object storage not configured")]
    NotConfigured,

    /// Upload or signing failed.
    #[error("object storage request failed: {0}")]
    Request(String),

    /// Object key does not exist (in-memory store only).
    #[error("object not found: {0}")]
    NotFound(String),
}

impl StorageError {
    pub fn request(message: impl Into<String>) -> Self {
        Self::Request(message.into())
    }
}

/// Port for the blob store behind remote attachments.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Returns false when every call would fail with `NotConfigured`.
    fn is_enabled(&self) -> bool;

    /// Stores `bytes` under `key`.
    async fn put(&self, key: &str, bytes: Vec<u8>, mime_type: &str) -> Result<(), StorageError>;

    /// Returns a URL granting read access to `key` for at most `ttl`.
    ///
    /// Implementations clamp `ttl` to their configured maximum.
    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String, StorageError>;

    /// Longest validity this store will sign for.
    fn max_url_ttl(&self) -> Duration;
}

/// Port for attachments kept on the service's own disk.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Writes `bytes` under `name` and returns the public path clients use.
    async fn save(&self, name: &str, bytes: &[u8]) -> Result<String, StorageError>;
}
