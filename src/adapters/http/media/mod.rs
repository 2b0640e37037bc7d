//! HTTP adapter for attachment upload and speech endpoints.

mod dto;
mod handlers;
mod routes;

pub use dto::{AttachmentBody, TranscriptionBody, TranscriptionDto};
pub use handlers::{MediaHandlers, MAX_UPLOAD_BYTES};
pub use routes::media_routes;
