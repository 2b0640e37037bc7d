//! Object storage configuration

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Validity used when `temp_url_expire_secs` is unset.
pub const DEFAULT_TEMP_URL_TTL: Duration = Duration::from_secs(15 * 60);

/// S3-compatible object storage configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StorageConfig {
    /// Service endpoint, e.g. `https://oss-cn-hangzhou.aliyuncs.com`
    #[serde(default)]
    pub endpoint: String,

    /// Signing region
    #[serde(default)]
    pub region: String,

    #[serde(default)]
    pub bucket: String,

    #[serde(default)]
    pub access_key_id: String,

    pub access_key_secret: Option<Secret<String>>,

    /// Key prefix for uploads
    #[serde(default)]
    pub prefix: String,

    /// Presigned URL validity in seconds (0 means the default)
    #[serde(default)]
    pub temp_url_expire_secs: u64,
}

impl StorageConfig {
    /// Storage is enabled only with a bucket and both keys
    pub fn is_enabled(&self) -> bool {
        !self.bucket.is_empty() && !self.access_key_id.is_empty() && self.secret().is_some()
    }

    /// Secret access key, if a non-empty one is configured
    pub fn secret(&self) -> Option<&str> {
        self.access_key_secret
            .as_ref()
            .map(|s| s.expose_secret().as_str())
            .filter(|s| !s.is_empty())
    }

    /// Maximum presigned URL validity
    pub fn temp_url_ttl(&self) -> Duration {
        if self.temp_url_expire_secs == 0 {
            DEFAULT_TEMP_URL_TTL
        } else {
            Duration::from_secs(self.temp_url_expire_secs)
        }
    }

    /// Validate storage configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_enabled() && self.endpoint.is_empty() {
            return Err(ValidationError::MissingRequired("STORAGE_ENDPOINT"));
        }
        if self.is_enabled()
            && !self.endpoint.starts_with("http://")
            && !self.endpoint.starts_with("https://")
        {
            return Err(ValidationError::InvalidUrl("storage.endpoint"));
        }
        Ok(())
    }
}
