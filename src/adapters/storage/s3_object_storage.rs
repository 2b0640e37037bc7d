//! S3-compatible object storage on the AWS SDK.
//!
//! Reads hand out presigned GET URLs. Requests are path-style so that
//! self-hosted endpoints (MinIO, OSS gateways) work without bucket DNS.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use std::time::Duration;
use tracing::{debug, error, instrument};

use crate::config::StorageConfig;
use crate::ports::{ObjectStorage, StorageError};

const DEFAULT_REGION: &str = "us-east-1";
const CREDENTIALS_SOURCE: &str = "chat-relay-config";

/// Object storage adapter for S3-compatible services.
pub struct S3ObjectStorage {
    client: S3Client,
    bucket: String,
    max_ttl: Duration,
}

impl S3ObjectStorage {
    /// Builds the adapter from configuration.
    ///
    /// Credentials come from the storage section only; the ambient AWS
    /// credential chain is not consulted.
    ///
    /// # Errors
    ///
    /// `NotConfigured` when storage is disabled or has no secret.
    #[instrument(skip_all, fields(bucket = %config.bucket))]
    pub async fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        let secret = match (config.is_enabled(), config.secret()) {
            (true, Some(secret)) => secret.to_string(),
            _ => return Err(StorageError::NotConfigured),
        };
        let region = if config.region.trim().is_empty() {
            DEFAULT_REGION.to_string()
        } else {
            config.region.trim().to_string()
        };
        let credentials = Credentials::new(
            config.access_key_id.clone(),
            secret,
            None,
            None,
            CREDENTIALS_SOURCE,
        );

        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region))
            .endpoint_url(config.endpoint.trim_end_matches('/'))
            .credentials_provider(credentials)
            .load()
            .await;
        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(true)
            .build();

        debug!("S3 client initialized");
        Ok(Self {
            client: S3Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            max_ttl: config.temp_url_ttl(),
        })
    }

    /// Validity actually signed for: never above the configured maximum.
    fn clamp_ttl(&self, ttl: Duration) -> Duration {
        Duration::from_secs(ttl.min(self.max_ttl).as_secs().max(1))
    }
}

#[async_trait]
impl ObjectStorage for S3ObjectStorage {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, mime_type: &str) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key.trim_start_matches('/'))
            .body(ByteStream::from(bytes))
            .content_type(mime_type)
            .send()
            .await
            .map_err(|e| {
                error!(key, error = %e, "upload failed");
                StorageError::request(format!("Failed to upload {}: {}", key, e))
            })?;
        debug!(key, "object stored");
        Ok(())
    }

    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        let presigning_config = PresigningConfig::expires_in(self.clamp_ttl(ttl))
            .map_err(|e| StorageError::request(format!("Invalid presign validity: {}", e)))?;
        let presigned_request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key.trim_start_matches('/'))
            .presigned(presigning_config)
            .await
            .map_err(|e| {
                StorageError::request(format!("Failed to presign {}: {}", key, e))
            })?;
        Ok(presigned_request.uri().to_string())
    }

    fn max_url_ttl(&self) -> Duration {
        self.max_ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Url;
    use secrecy::Secret;

    fn config() -> StorageConfig {
        StorageConfig {
            endpoint: "https://oss.example.com:9000".to_string(),
            region: String::new(),
            bucket: "media".to_string(),
            access_key_id: "AKID".to_string(),
            access_key_secret: Some(Secret::new("secret".to_string())),
            prefix: "uploads".to_string(),
            temp_url_expire_secs: 300,
        }
    }

    fn query_param(url: &str, name: &str) -> Option<String> {
        Url::parse(url)
            .ok()?
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    #[tokio::test]
    async fn disabled_config_is_rejected() {
        let result = S3ObjectStorage::from_config(&StorageConfig::default()).await;
        assert!(matches!(result, Err(StorageError::NotConfigured)));
    }

    #[tokio::test]
    async fn presigned_get_is_path_style() {
        let storage = S3ObjectStorage::from_config(&config()).await.unwrap();
        let url = storage
            .presign_get("uploads/1_a.png", Duration::from_secs(60))
            .await
            .unwrap();

        assert!(url.starts_with("https://oss.example.com:9000/media/uploads/1_a.png?"));
        assert_eq!(query_param(&url, "X-Amz-Expires").as_deref(), Some("60"));
        assert!(query_param(&url, "X-Amz-Credential").unwrap().contains("/us-east-1/s3/"));
        assert!(query_param(&url, "X-Amz-Signature").is_some());
    }

    #[tokio::test]
    async fn ttl_is_clamped_to_configured_maximum() {
        let storage = S3ObjectStorage::from_config(&config()).await.unwrap();
        let url = storage
            .presign_get("k", Duration::from_secs(86_400))
            .await
            .unwrap();
        assert_eq!(query_param(&url, "X-Amz-Expires").as_deref(), Some("300"));
        assert_eq!(storage.max_url_ttl(), Duration::from_secs(300));
    }

    #[tokio::test]
    async fn zero_ttl_signs_for_one_second() {
        let storage = S3ObjectStorage::from_config(&config()).await.unwrap();
        let url = storage.presign_get("k", Duration::ZERO).await.unwrap();
        assert_eq!(query_param(&url, "X-Amz-Expires").as_deref(), Some("1"));
    }
}
