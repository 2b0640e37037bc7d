//! OpenAI-compatible completion provider.
//!
//! Synchronous sends go to `{base_url}/chat/completions`. Streaming sends go
//! to the separately configured stream endpoint, whose body is relayed line
//! by line without interpretation.
//!
//! # Wire format
//!
//! A message with a single text part is sent with a plain string `content`.
//! Anything else becomes a parts list:
//!
//! ```text
//! {"type":"image_url","image_url":{"url":"..."}}
//! {"type":"video_url","video_url":{"url":"..."}}
//! {"type":"text","text":"..."}
//! ```

use async_trait::async_trait;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt::Display;

use crate::config::LlmConfig;
use crate::domain::conversation::{
    is_placeholder_endpoint, ChatRole, ContentPart, ContextMessage, LineBuffer, TokenUsage,
};
use crate::ports::{
    Completion, CompletionError, CompletionProvider, CompletionRequest, UpstreamLines,
};

/// Maximum number of error body bytes kept in `CompletionError::Status`.
const ERROR_BODY_LIMIT: usize = 512;

/// Completion provider speaking the OpenAI chat completions dialect.
pub struct OpenAiCompatibleProvider {
    config: LlmConfig,
    client: Client,
}

impl OpenAiCompatibleProvider {
    /// Builds the provider and its HTTP client.
    pub fn new(config: LlmConfig) -> Result<Self, CompletionError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| CompletionError::network(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn to_wire_request(&self, request: &CompletionRequest, stream: bool) -> WireRequest {
        WireRequest {
            model: self.config.model.clone(),
            messages: request.messages.iter().map(WireMessage::from).collect(),
            stream: stream.then_some(true),
            conversation_id: stream.then(|| request.conversation_id.as_i64()),
        }
    }

    async fn check_status(response: Response) -> Result<Response, CompletionError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > ERROR_BODY_LIMIT {
            let mut cut = ERROR_BODY_LIMIT;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        Err(CompletionError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompatibleProvider {
    fn is_ready(&self) -> bool {
        self.config.is_configured()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, CompletionError> {
        let Some(api_key) = self.config.api_key().filter(|_| self.is_ready()) else {
            return Err(CompletionError::NotConfigured);
        };

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(api_key)
            .json(&self.to_wire_request(&request, false))
            .send()
            .await
            .map_err(|e| CompletionError::network(e.to_string()))?;
        let response = Self::check_status(response).await?;

        let body: WireResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::parse(format!("Failed to parse response: {}", e)))?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or(CompletionError::EmptyResponse)?;

        Ok(Completion {
            text: choice.message.content.map(ReplyContent::into_text).unwrap_or_default(),
            usage: body.usage.unwrap_or_default(),
        })
    }

    async fn open_stream(&self, request: CompletionRequest) -> Result<UpstreamLines, CompletionError> {
        if is_placeholder_endpoint(&self.config.stream_endpoint) {
            return Err(CompletionError::NotConfigured);
        }

        let mut builder = self
            .client
            .post(&self.config.stream_endpoint)
            .json(&self.to_wire_request(&request, true));
        if let Some(key) = self.config.stream_api_key() {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| CompletionError::network(e.to_string()))?;
        let response = Self::check_status(response).await?;

        Ok(lines_from_bytes(response.bytes_stream()))
    }
}

/// Splits a byte stream into lines, however the transport chunked it.
///
/// A transport error is yielded once and ends the stream.
pub fn lines_from_bytes<S, B, E>(bytes: S) -> UpstreamLines
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    struct Lines<B, E> {
        bytes: BoxStream<'static, Result<B, E>>,
        buffer: LineBuffer,
        ready: VecDeque<String>,
        finished: bool,
    }

    let state = Lines {
        bytes: bytes.boxed(),
        buffer: LineBuffer::new(),
        ready: VecDeque::new(),
        finished: false,
    };

    Box::pin(stream::unfold(state, |mut s| async move {
        loop {
            if let Some(line) = s.ready.pop_front() {
                return Some((Ok(line), s));
            }
            if s.finished {
                return None;
            }
            match s.bytes.next().await {
                Some(Ok(chunk)) => s.ready.extend(s.buffer.push(chunk.as_ref())),
                Some(Err(e)) => {
                    s.finished = true;
                    return Some((Err(CompletionError::network(format!("Stream error: {}", e))), s));
                }
                None => {
                    s.finished = true;
                    s.ready.extend(s.buffer.finish());
                }
            }
        }
    }))
}

// ----- Wire types -----

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    conversation_id: Option<i64>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: ChatRole,
    content: WireContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WireContent {
    Text(String),
    Parts(Vec<WirePart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WirePart {
    Text { text: String },
    ImageUrl { image_url: UrlRef },
    VideoUrl { video_url: UrlRef },
}

#[derive(Debug, Serialize)]
struct UrlRef {
    url: String,
}

impl From<&ContextMessage> for WireMessage {
    fn from(message: &ContextMessage) -> Self {
        let content = match message.as_plain_text() {
            Some(text) => WireContent::Text(text.to_string()),
            None => WireContent::Parts(message.parts.iter().map(WirePart::from).collect()),
        };
        Self {
            role: message.role,
            content,
        }
    }
}

impl From<&ContentPart> for WirePart {
    fn from(part: &ContentPart) -> Self {
        match part {
            ContentPart::Text(text) => WirePart::Text { text: text.clone() },
            ContentPart::ImageRef(url) => WirePart::ImageUrl {
                image_url: UrlRef { url: url.clone() },
            },
            ContentPart::VideoRef(url) => WirePart::VideoUrl {
                video_url: UrlRef { url: url.clone() },
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireReply,
}

#[derive(Debug, Deserialize)]
struct WireReply {
    content: Option<ReplyContent>,
}

/// Reply content is either a string or a list of typed parts.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReplyContent {
    Text(String),
    Parts(Vec<ReplyPart>),
}

#[derive(Debug, Deserialize)]
struct ReplyPart {
    #[serde(default)]
    text: Option<String>,
}

impl ReplyContent {
    fn into_text(self) -> String {
        match self {
            ReplyContent::Text(text) => text,
            ReplyContent::Parts(parts) => parts.into_iter().filter_map(|p| p.text).collect(),
        }
    }
}
