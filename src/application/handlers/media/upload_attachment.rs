//! UploadAttachmentHandler - Stores an uploaded file as an unbound attachment.
//!
//! With object storage enabled the bytes go to the bucket and the record
//! is REMOTE; otherwise they are written to the local upload directory.
//! Either way the attachment belongs to the uploader and waits to be bound
//! by the next message send.

use std::sync::Arc;

use super::{unique_name, ObjectKeys};
use crate::application::{AttachmentResolver, EngineError};
use crate::domain::conversation::{NewAttachment, ResolvedAttachment, StorageClass};
use crate::domain::foundation::UserId;
use crate::ports::{FileStore, MessageStore};

#[derive(Debug, Clone)]
pub struct UploadAttachmentCommand {
    pub user_id: UserId,
    pub filename: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

pub struct UploadAttachmentHandler {
    messages: Arc<dyn MessageStore>,
    resolver: AttachmentResolver,
    files: Arc<dyn FileStore>,
    keys: ObjectKeys,
}

impl UploadAttachmentHandler {
    pub fn new(
        messages: Arc<dyn MessageStore>,
        resolver: AttachmentResolver,
        files: Arc<dyn FileStore>,
        keys: ObjectKeys,
    ) -> Self {
        Self {
            messages,
            resolver,
            files,
            keys,
        }
    }

    pub async fn handle(&self, cmd: UploadAttachmentCommand) -> Result<ResolvedAttachment, EngineError> {
        if cmd.bytes.is_empty() {
            return Err(EngineError::invalid("uploaded file is empty"));
        }
        let name = unique_name(&cmd.filename);
        let storage = self.resolver.storage();

        let new = if storage.is_enabled() {
            let key = self.keys.key(&name);
            let new = NewAttachment::upload(cmd.user_id, cmd.mime_type.as_deref(), StorageClass::Remote, key);
            storage.put(&new.location, cmd.bytes, &new.mime_type).await?;
            new
        } else {
            let path = self.files.save(&name, &cmd.bytes).await?;
            NewAttachment::upload(cmd.user_id, cmd.mime_type.as_deref(), StorageClass::Local, path)
        };

        let attachment = self.messages.create_attachment(new).await?;
        let url = self.resolver.resolve(&attachment).await?;

        tracing::info!(
            attachment_id = %attachment.id,
            storage = attachment.storage.as_str(),
            mime_type = %attachment.mime_type,
            "Attachment uploaded"
        );
        Ok(ResolvedAttachment { attachment, url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::in_memory::InMemoryStore;
    use crate::adapters::storage::{InMemoryObjectStorage, LocalFileStore, NoObjectStorage};
    use crate::domain::conversation::{AttachmentType, DEFAULT_MIME_TYPE};
    use crate::ports::ObjectStorage;
    use std::time::Duration;

    fn command(filename: &str, mime: Option<&str>) -> UploadAttachmentCommand {
        UploadAttachmentCommand {
            user_id: UserId::new(3),
            filename: filename.to_string(),
            mime_type: mime.map(str::to_string),
            bytes: b"data".to_vec(),
        }
    }

    #[tokio::test]
    async fn remote_upload_is_put_and_presigned() {
        let store = Arc::new(InMemoryStore::new());
        let objects = Arc::new(InMemoryObjectStorage::new(Duration::from_secs(3600)));
        let dir = tempfile::tempdir().unwrap();
        let handler = UploadAttachmentHandler::new(
            store.clone(),
            AttachmentResolver::new(objects.clone(), Duration::from_secs(300)),
            Arc::new(LocalFileStore::new(dir.path())),
            ObjectKeys::new("uploads"),
        );

        let uploaded = handler.handle(command("cat.png", Some("image/png"))).await.unwrap();

        assert_eq!(uploaded.attachment.storage, StorageClass::Remote);
        assert_eq!(uploaded.attachment.attachment_type, AttachmentType::Image);
        assert!(uploaded.attachment.location.starts_with("uploads/"));
        assert!(uploaded.attachment.location.ends_with("_cat.png"));
        assert_eq!(uploaded.attachment.message_id, None);
        assert_eq!(uploaded.attachment.owner, UserId::new(3));
        assert_eq!(objects.fetch(&uploaded.url).unwrap(), b"data".to_vec());
        assert_eq!(objects.mime_type(&uploaded.attachment.location).as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn local_fallback_writes_file_and_returns_public_path() {
        let store = Arc::new(InMemoryStore::new());
        let dir = tempfile::tempdir().unwrap();
        let storage: Arc<dyn ObjectStorage> = Arc::new(NoObjectStorage);
        let handler = UploadAttachmentHandler::new(
            store.clone(),
            AttachmentResolver::new(storage, Duration::from_secs(300)),
            Arc::new(LocalFileStore::new(dir.path())),
            ObjectKeys::default(),
        );

        let uploaded = handler.handle(command("notes.txt", None)).await.unwrap();

        assert_eq!(uploaded.attachment.storage, StorageClass::Local);
        assert_eq!(uploaded.attachment.mime_type, DEFAULT_MIME_TYPE);
        assert_eq!(uploaded.attachment.attachment_type, AttachmentType::File);
        assert!(uploaded.url.starts_with("/uploads/"));
        let name = uploaded.url.trim_start_matches("/uploads/");
        assert_eq!(std::fs::read(dir.path().join(name)).unwrap(), b"data".to_vec());
        assert!(store.attachment(uploaded.attachment.id).is_some());
    }

    #[tokio::test]
    async fn empty_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let handler = UploadAttachmentHandler::new(
            Arc::new(InMemoryStore::new()),
            AttachmentResolver::new(Arc::new(NoObjectStorage), Duration::from_secs(300)),
            Arc::new(LocalFileStore::new(dir.path())),
            ObjectKeys::default(),
        );
        let mut cmd = command("a.txt", None);
        cmd.bytes.clear();

        assert_eq!(handler.handle(cmd).await.unwrap_err().err_code(), 400);
    }
}
