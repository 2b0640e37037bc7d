//! HTTP handlers for upload and speech endpoints.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;

use crate::adapters::http::conversation::AttachmentDto;
use crate::adapters::http::error::{parse_id, ApiError, Envelope};
use crate::adapters::http::middleware::RequireAuth;
use crate::application::handlers::{
    SpeechToTextCommand, SpeechToTextHandler, TextToSpeechCommand, TextToSpeechHandler,
    TextToSpeechStreamHandler, UploadAttachmentCommand, UploadAttachmentHandler,
};
use crate::domain::foundation::MessageId;

use super::dto::{AttachmentBody, TranscriptionBody};

/// Largest accepted multipart body.
pub const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Multipart field carrying the file.
const FILE_FIELD: &str = "file";

const AUDIO_WAV: &str = "audio/wav";

#[derive(Clone)]
pub struct MediaHandlers {
    upload_handler: Arc<UploadAttachmentHandler>,
    stt_handler: Arc<SpeechToTextHandler>,
    tts_handler: Arc<TextToSpeechHandler>,
    tts_stream_handler: Arc<TextToSpeechStreamHandler>,
}

impl MediaHandlers {
    pub fn new(
        upload_handler: Arc<UploadAttachmentHandler>,
        stt_handler: Arc<SpeechToTextHandler>,
        tts_handler: Arc<TextToSpeechHandler>,
        tts_stream_handler: Arc<TextToSpeechStreamHandler>,
    ) -> Self {
        Self {
            upload_handler,
            stt_handler,
            tts_handler,
            tts_stream_handler,
        }
    }
}

struct UploadedFile {
    filename: String,
    mime_type: Option<String>,
    bytes: Vec<u8>,
}

async fn read_file(mut multipart: Multipart) -> Result<UploadedFile, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let mime_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("failed to read file: {}", e)))?;
        return Ok(UploadedFile {
            filename,
            mime_type,
            bytes: bytes.to_vec(),
        });
    }
    Err(ApiError::bad_request("missing file field"))
}

/// POST /api/attachments
pub async fn upload_attachment(
    State(handlers): State<MediaHandlers>,
    RequireAuth(user): RequireAuth,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let file = read_file(multipart).await?;
    let uploaded = handlers
        .upload_handler
        .handle(UploadAttachmentCommand {
            user_id: user.id,
            filename: file.filename,
            mime_type: file.mime_type,
            bytes: file.bytes,
        })
        .await?;
    Ok(Json(Envelope::success(AttachmentBody {
        attachment: AttachmentDto::from(uploaded),
    }))
    .into_response())
}

/// POST /api/speech/stt
pub async fn speech_to_text(
    State(handlers): State<MediaHandlers>,
    RequireAuth(user): RequireAuth,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let file = read_file(multipart).await?;
    let transcription = handlers
        .stt_handler
        .handle(SpeechToTextCommand {
            user_id: user.id,
            filename: file.filename,
            mime_type: file.mime_type,
            bytes: file.bytes,
        })
        .await?;
    Ok(Json(Envelope::success(TranscriptionBody {
        result: transcription.into(),
    }))
    .into_response())
}

/// GET /api/messages/:message_id/tts
///
/// Proxies the synthesized file, honouring the client's `Range` header.
pub async fn text_to_speech(
    State(handlers): State<MediaHandlers>,
    RequireAuth(user): RequireAuth,
    Path(message_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let audio = handlers
        .tts_handler
        .handle(TextToSpeechCommand {
            user_id: user.id,
            message_id: parse_id::<MessageId>(&message_id, "message_id")?,
            range,
        })
        .await?;

    let status = StatusCode::from_u16(audio.status).unwrap_or(StatusCode::OK);
    let content_range = audio.content_range;
    let mut response = (status, audio.bytes).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(AUDIO_WAV));
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    if let Some(value) = content_range.and_then(|r| HeaderValue::from_str(&r).ok()) {
        headers.insert(header::CONTENT_RANGE, value);
    }
    Ok(response)
}

/// GET /api/messages/:message_id/tts/stream
pub async fn text_to_speech_stream(
    State(handlers): State<MediaHandlers>,
    RequireAuth(user): RequireAuth,
    Path(message_id): Path<String>,
) -> Result<Response, ApiError> {
    let message_id: MessageId = parse_id(&message_id, "message_id")?;
    let chunks = handlers
        .tts_stream_handler
        .handle(user.id, message_id)
        .await?
        .inspect(move |chunk| {
            if let Err(e) = chunk {
                tracing::error!(%message_id, error = %e, "Speech stream failed");
            }
        });

    let mut response = Body::from_stream(chunks).into_response();
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(AUDIO_WAV));
    Ok(response)
}
