//! Turns stored attachments into URLs a provider or client can fetch.
//!
//! Local attachments keep their public path. Remote ones get a presigned
//! GET valid for at most the configured duration; a failure to sign is an
//! error, never a silent fallback.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::EngineError;
use crate::domain::conversation::{Attachment, ResolvedAttachment, StorageClass};
use crate::domain::foundation::MessageId;
use crate::ports::ObjectStorage;

#[derive(Clone)]
pub struct AttachmentResolver {
    storage: Arc<dyn ObjectStorage>,
    url_ttl: Duration,
}

impl AttachmentResolver {
    pub fn new(storage: Arc<dyn ObjectStorage>, url_ttl: Duration) -> Self {
        Self { storage, url_ttl }
    }

    /// Validity requested for presigned URLs.
    pub fn url_ttl(&self) -> Duration {
        self.url_ttl.min(self.storage.max_url_ttl())
    }

    /// The store behind remote attachments.
    pub fn storage(&self) -> &Arc<dyn ObjectStorage> {
        &self.storage
    }

    /// Presigned GET for an object key.
    pub async fn presign(&self, key: &str) -> Result<String, EngineError> {
        if !self.storage.is_enabled() {
            return Err(EngineError::StorageNotReady);
        }
        Ok(self.storage.presign_get(key, self.url_ttl()).await?)
    }

    pub async fn resolve(&self, attachment: &Attachment) -> Result<String, EngineError> {
        match attachment.storage {
            StorageClass::Local => Ok(attachment.location.clone()),
            StorageClass::Remote => self.presign(&attachment.location).await,
        }
    }

    /// Resolves in order.
    pub async fn resolve_all(
        &self,
        attachments: Vec<Attachment>,
    ) -> Result<Vec<ResolvedAttachment>, EngineError> {
        let mut resolved = Vec::with_capacity(attachments.len());
        for attachment in attachments {
            let url = self.resolve(&attachment).await?;
            resolved.push(ResolvedAttachment { attachment, url });
        }
        Ok(resolved)
    }

    pub async fn resolve_map(
        &self,
        attachments: HashMap<MessageId, Vec<Attachment>>,
    ) -> Result<HashMap<MessageId, Vec<ResolvedAttachment>>, EngineError> {
        let mut resolved = HashMap::with_capacity(attachments.len());
        for (message_id, list) in attachments {
            resolved.insert(message_id, self.resolve_all(list).await?);
        }
        Ok(resolved)
    }
}
