//! Storage adapters.
//!
//! - `s3_object_storage` - S3-compatible object store on the AWS SDK
//! - `in_memory_object_storage` - In-process store for tests, plus the disabled store
//! - `local_file_store` - Disk fallback for uploads

mod in_memory_object_storage;
mod local_file_store;
mod s3_object_storage;

pub use in_memory_object_storage::{InMemoryObjectStorage, NoObjectStorage};
pub use local_file_store::{LocalFileStore, UPLOADS_ROUTE};
pub use s3_object_storage::S3ObjectStorage;
