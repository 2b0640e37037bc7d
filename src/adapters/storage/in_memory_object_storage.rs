//! In-memory object storage for tests and local development.
//!
//! Presigned URLs have the form `memory://{key}?nonce={n}&expires={unix}`;
//! every call yields a distinct URL and [`InMemoryObjectStorage::fetch`]
//! dereferences one while it is still valid.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::domain::foundation::Timestamp;
use crate::ports::{ObjectStorage, StorageError};

const SCHEME: &str = "memory://";

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    mime_type: String,
}

/// Object storage backed by a `HashMap`.
#[derive(Debug)]
pub struct InMemoryObjectStorage {
    objects: Mutex<HashMap<String, StoredObject>>,
    nonce: AtomicU64,
    max_ttl: Duration,
    /// Validity granted by the most recent presign, for assertions
    last_ttl: Mutex<Option<Duration>>,
}

impl InMemoryObjectStorage {
    pub fn new(max_ttl: Duration) -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            nonce: AtomicU64::new(0),
            max_ttl,
            last_ttl: Mutex::new(None),
        }
    }

    fn objects(&self) -> MutexGuard<'_, HashMap<String, StoredObject>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the bytes behind a presigned URL if it has not expired.
    pub fn fetch(&self, url: &str) -> Result<Vec<u8>, StorageError> {
        let rest = url
            .strip_prefix(SCHEME)
            .ok_or_else(|| StorageError::request(format!("Not an in-memory URL: {}", url)))?;
        let (key, query) = rest
            .split_once('?')
            .ok_or_else(|| StorageError::request("Presigned URL has no query"))?;
        let expires: i64 = query
            .split('&')
            .find_map(|pair| pair.strip_prefix("expires="))
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| StorageError::request("Presigned URL has no expiry"))?;

        if Timestamp::now().unix_seconds() > expires {
            return Err(StorageError::request("Presigned URL expired"));
        }
        self.objects()
            .get(key)
            .map(|o| o.bytes.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    /// MIME type recorded for `key`.
    pub fn mime_type(&self, key: &str) -> Option<String> {
        self.objects().get(key).map(|o| o.mime_type.clone())
    }

    /// Keys currently stored.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn last_ttl(&self) -> Option<Duration> {
        *self.last_ttl.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for InMemoryObjectStorage {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_TEMP_URL_TTL)
    }
}

#[async_trait]
impl ObjectStorage for InMemoryObjectStorage {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, mime_type: &str) -> Result<(), StorageError> {
        self.objects().insert(
            key.to_string(),
            StoredObject {
                bytes,
                mime_type: mime_type.to_string(),
            },
        );
        Ok(())
    }

    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        if !self.objects().contains_key(key) {
            return Err(StorageError::NotFound(key.to_string()));
        }
        let ttl = ttl.min(self.max_ttl);
        *self.last_ttl.lock().unwrap_or_else(PoisonError::into_inner) = Some(ttl);

        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
        let expires = Timestamp::now().unix_seconds() + ttl.as_secs() as i64;
        Ok(format!("{}{}?nonce={}&expires={}", SCHEME, key, nonce, expires))
    }

    fn max_url_ttl(&self) -> Duration {
        self.max_ttl
    }
}

/// Storage used when nothing is configured: every call fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoObjectStorage;

#[async_trait]
impl ObjectStorage for NoObjectStorage {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn put(&self, _key: &str, _bytes: Vec<u8>, _mime_type: &str) -> Result<(), StorageError> {
        Err(StorageError::NotConfigured)
    }

    async fn presign_get(&self, _key: &str, _ttl: Duration) -> Result<String, StorageError> {
        Err(StorageError::NotConfigured)
    }

    fn max_url_ttl(&self) -> Duration {
        Duration::ZERO
    }
}
