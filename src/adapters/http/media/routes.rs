//! HTTP routes for media endpoints.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use super::handlers::{
    speech_to_text, text_to_speech, text_to_speech_stream, upload_attachment, MediaHandlers,
    MAX_UPLOAD_BYTES,
};

/// Creates the media router, nested under `/api`.
pub fn media_routes(handlers: MediaHandlers) -> Router {
    Router::new()
        .route("/attachments", post(upload_attachment))
        .route("/speech/stt", post(speech_to_text))
        .route("/messages/:message_id/tts", get(text_to_speech))
        .route("/messages/:message_id/tts/stream", get(text_to_speech_stream))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(handlers)
}
