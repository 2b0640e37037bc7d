//! Event-stream framing shared by the live relay and the degraded path.
//!
//! Client-visible events are JSON envelopes framed as a single `data:`
//! line followed by one blank line. Every stream ends with an empty
//! assistant message and then the literal `[DONE]` sentinel.
//!
//! ```text
//! INIT ──► STREAMING ──────► DONE
//!   └────► MOCK_STREAMING ──► DONE
//! ```

use serde::Serialize;
use serde_json::Value;

use super::attachment::ResolvedAttachment;
use super::turn::{SenderType, CONTENT_TYPE_TEXT};
use super::usage::TokenUsage;
use crate::domain::foundation::{AttachmentId, MessageId, StateMachine};

/// Sentinel that terminates both upstream and client streams.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Envelope message for successful events.
pub const SUCCESS_MESSAGE: &str = "success";

/// Number of synthetic chunks emitted on the degraded path.
pub const MOCK_CHUNK_COUNT: usize = 3;

/// Host that marks the stream endpoint as a placeholder.
pub const PLACEHOLDER_HOST: &str = "example-llm.api";

/// Default stream endpoint; never contacted.
pub const PLACEHOLDER_ENDPOINT: &str = "https://example-llm.api/chat/stream";

/// Returns true when the endpoint cannot be a real provider.
pub fn is_placeholder_endpoint(endpoint: &str) -> bool {
    let endpoint = endpoint.trim();
    endpoint.is_empty() || endpoint.contains(PLACEHOLDER_HOST)
}

// ════════════════════════════════════════════════════════════════════════════
// State machine
// ════════════════════════════════════════════════════════════════════════════

/// Lifecycle of one streaming send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Init,
    Streaming,
    MockStreaming,
    Done,
}

impl StateMachine for StreamState {
    fn can_transition_to(&self, target: &Self) -> bool {
        self.valid_transitions().contains(target)
    }

    fn valid_transitions(&self) -> Vec<Self> {
        match self {
            StreamState::Init => vec![StreamState::Streaming, StreamState::MockStreaming],
            StreamState::Streaming | StreamState::MockStreaming => vec![StreamState::Done],
            StreamState::Done => vec![],
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Envelopes
// ════════════════════════════════════════════════════════════════════════════

/// Attachment as echoed inside stream events.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventAttachment {
    pub attachment_id: AttachmentId,
    pub attachment_type: String,
    pub mime_type: String,
    pub url_or_path: String,
    pub duration_ms: Option<f64>,
}

impl From<&ResolvedAttachment> for EventAttachment {
    fn from(resolved: &ResolvedAttachment) -> Self {
        Self {
            attachment_id: resolved.attachment.id,
            attachment_type: resolved.attachment.attachment_type.to_string(),
            mime_type: resolved.attachment.mime_type.clone(),
            url_or_path: resolved.url.clone(),
            duration_ms: resolved.attachment.duration_ms,
        }
    }
}

/// A turn as carried inside a stream event.
///
/// `role` and `sender_type` hold the same value so that clients written
/// against either the streaming or the synchronous shape can read it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventMessage {
    pub message_id: MessageId,
    pub role: SenderType,
    pub sender_type: SenderType,
    pub content_type: String,
    pub content: String,
    pub token_total: i64,
    pub attachments: Vec<EventAttachment>,
}

impl EventMessage {
    /// Echo of the submitted user turn. Not yet persisted, so no id.
    pub fn user_echo(
        content_type: impl Into<String>,
        content: impl Into<String>,
        attachments: Vec<EventAttachment>,
    ) -> Self {
        Self {
            message_id: MessageId::unassigned(),
            role: SenderType::User,
            sender_type: SenderType::User,
            content_type: content_type.into(),
            content: content.into(),
            token_total: 0,
            attachments,
        }
    }

    /// Assistant content fragment.
    pub fn assistant(message_id: MessageId, content: impl Into<String>) -> Self {
        Self {
            message_id,
            role: SenderType::Assistant,
            sender_type: SenderType::Assistant,
            content_type: CONTENT_TYPE_TEXT.to_string(),
            content: content.into(),
            token_total: 0,
            attachments: Vec::new(),
        }
    }
}

/// JSON payload of one event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamEnvelope {
    pub err_msg: String,
    pub err_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_message: Option<EventMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_message: Option<EventMessage>,
}

impl StreamEnvelope {
    /// Successful assistant fragment, optionally echoing the user turn.
    pub fn content(user_message: Option<EventMessage>, model_message: EventMessage) -> Self {
        Self {
            err_msg: SUCCESS_MESSAGE.to_string(),
            err_code: 0,
            user_message,
            model_message: Some(model_message),
        }
    }

    /// Failure envelope sent in place of further content.
    pub fn failure(err_code: u16, err_msg: impl Into<String>) -> Self {
        Self {
            err_msg: err_msg.into(),
            err_code,
            user_message: None,
            model_message: None,
        }
    }
}

/// One unit written to the client.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    Event(StreamEnvelope),
    Done,
}

impl StreamFrame {
    /// Data carried by the frame's event: the envelope JSON or `[DONE]`.
    pub fn payload(&self) -> String {
        match self {
            StreamFrame::Event(envelope) => serde_json::to_string(envelope)
                .unwrap_or_else(|e| format!(r#"{{"err_msg":"encode failed: {}","err_code":500}}"#, e)),
            StreamFrame::Done => DONE_SENTINEL.to_string(),
        }
    }

    /// Terminal assistant event carrying empty content.
    pub fn final_event(assistant_id: MessageId) -> Self {
        StreamFrame::Event(StreamEnvelope::content(
            None,
            EventMessage::assistant(assistant_id, ""),
        ))
    }

    pub fn is_done(&self) -> bool {
        matches!(self, StreamFrame::Done)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Upstream decoding
// ════════════════════════════════════════════════════════════════════════════

/// Classification of one upstream line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamLine {
    /// Blank, comment, or non-`data:` line.
    Skip,
    /// The `[DONE]` sentinel.
    Done,
    /// Payload after `data:`, trimmed.
    Data(String),
}

/// Classifies one line of the upstream event stream.
pub fn decode_upstream_line(line: &str) -> UpstreamLine {
    let line = line.trim();
    let Some(data) = line.strip_prefix("data:") else {
        return UpstreamLine::Skip;
    };
    let data = data.trim();
    if data.is_empty() {
        UpstreamLine::Skip
    } else if data == DONE_SENTINEL {
        UpstreamLine::Done
    } else {
        UpstreamLine::Data(data.to_string())
    }
}

/// What an upstream data payload contributes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpstreamPayload {
    pub content: Option<String>,
    pub usage: Option<TokenUsage>,
}

/// Interprets a data payload.
///
/// JSON objects contribute their non-empty `content` string (or the
/// chat-completion delta content) and any `usage` block. A JSON object
/// that carries neither, or a payload that is not JSON at all, is relayed
/// verbatim as content.
pub fn decode_payload(data: &str) -> UpstreamPayload {
    let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(data) else {
        return UpstreamPayload {
            content: Some(data.to_string()),
            usage: None,
        };
    };

    let content = obj
        .get("content")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .or_else(|| {
            let choice = obj.get("choices")?.get(0)?;
            choice
                .get("delta")
                .or_else(|| choice.get("message"))?
                .get("content")?
                .as_str()
                .filter(|s| !s.is_empty())
        })
        .map(str::to_string);

    let usage = obj
        .get("usage")
        .filter(|u| !u.is_null())
        .and_then(|u| serde_json::from_value::<TokenUsage>(u.clone()).ok());

    if content.is_none() && usage.is_none() {
        return UpstreamPayload {
            content: Some(data.to_string()),
            usage: None,
        };
    }
    UpstreamPayload { content, usage }
}

/// Rebuilds lines from arbitrarily split byte chunks.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends bytes and returns every line completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(Self::decode(&line));
        }
        lines
    }

    /// Returns the unterminated tail, if any, at end of input.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(Self::decode(&rest))
    }

    fn decode(bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes)
            .trim_end_matches(['\r', '\n'])
            .to_string()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Relay session
// ════════════════════════════════════════════════════════════════════════════

/// Per-request relay state: where the stream is, whether the user echo
/// has gone out, and what the assistant has said so far.
#[derive(Debug)]
pub struct RelaySession {
    state: StreamState,
    echo: EventMessage,
    first_emitted: bool,
    reply: String,
    usage: Option<TokenUsage>,
}

impl RelaySession {
    pub fn new(echo: EventMessage) -> Self {
        Self {
            state: StreamState::Init,
            echo,
            first_emitted: false,
            reply: String::new(),
            usage: None,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Enters the live relay.
    pub fn begin_relay(&mut self) {
        self.advance(StreamState::Streaming);
    }

    /// Full degraded stream: echo plus synthetic chunks, final event and
    /// sentinel. Leaves the session in `Done`.
    pub fn degraded_frames(&mut self) -> Vec<StreamFrame> {
        self.advance(StreamState::MockStreaming);
        let content = self.echo.content.clone();
        let mut frames: Vec<StreamFrame> = (1..=MOCK_CHUNK_COUNT)
            .map(|i| self.content_frame(format!("mock chunk {}: {}", i, content)))
            .collect();
        frames.extend(self.finish_frames(MessageId::unassigned()));
        frames
    }

    /// Turns one decoded upstream payload into at most one client event.
    ///
    /// The first content-bearing event also carries the user echo.
    pub fn on_payload(&mut self, payload: UpstreamPayload) -> Option<StreamFrame> {
        if let Some(usage) = payload.usage {
            self.usage = Some(usage);
        }
        let content = payload.content?;
        self.reply.push_str(&content);
        Some(self.content_frame(content))
    }

    /// Final event and sentinel. Leaves the session in `Done`.
    pub fn finish_frames(&mut self, assistant_id: MessageId) -> Vec<StreamFrame> {
        self.advance(StreamState::Done);
        vec![StreamFrame::final_event(assistant_id), StreamFrame::Done]
    }

    /// Failure envelope and sentinel. Leaves the session in `Done`.
    pub fn abort_frames(&mut self, err_code: u16, err_msg: impl Into<String>) -> Vec<StreamFrame> {
        self.advance(StreamState::Done);
        vec![
            StreamFrame::Event(StreamEnvelope::failure(err_code, err_msg)),
            StreamFrame::Done,
        ]
    }

    /// Everything the assistant has streamed so far.
    pub fn reply(&self) -> &str {
        &self.reply
    }

    /// Last usage block seen upstream.
    pub fn usage(&self) -> TokenUsage {
        self.usage.unwrap_or_default()
    }

    pub fn first_emitted(&self) -> bool {
        self.first_emitted
    }

    fn content_frame(&mut self, content: String) -> StreamFrame {
        let user_message = if self.first_emitted {
            None
        } else {
            self.first_emitted = true;
            Some(self.echo.clone())
        };
        StreamFrame::Event(StreamEnvelope::content(
            user_message,
            EventMessage::assistant(MessageId::unassigned(), content),
        ))
    }

    fn advance(&mut self, target: StreamState) {
        // Illegal edges keep the current state; callers only drive legal ones.
        if let Ok(next) = self.state.transition_to(target) {
            self.state = next;
        }
    }
}
