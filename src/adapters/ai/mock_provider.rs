//! Mock completion provider for testing.
//!
//! Replies and stream scripts are consumed in order; when the queue is
//! empty a default reply is returned. Every request is recorded.
//!
//! # Example
//!
//! ```ignore
//! let provider = MockCompletionProvider::new()
//!     .with_reply("Hi there", TokenUsage::total(30))
//!     .with_stream_lines(["data: {\"content\":\"Hi\"}", "data: [DONE]"]);
//! ```

use async_trait::async_trait;
use futures::stream;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Barrier;

use crate::domain::conversation::TokenUsage;
use crate::ports::{
    Completion, CompletionError, CompletionProvider, CompletionRequest, UpstreamLines,
};

/// A scripted outcome of `open_stream`.
#[derive(Debug, Clone)]
pub enum MockStream {
    /// Yield these items, then end.
    Lines(Vec<Result<String, CompletionError>>),
    /// Fail to open.
    Error(CompletionError),
}

#[derive(Debug, Default)]
struct Script {
    replies: VecDeque<Result<Completion, CompletionError>>,
    streams: VecDeque<MockStream>,
    calls: Vec<CompletionRequest>,
}

/// Mock completion provider.
#[derive(Debug, Clone)]
pub struct MockCompletionProvider {
    script: Arc<Mutex<Script>>,
    ready: bool,
    barrier: Option<Arc<Barrier>>,
}

impl Default for MockCompletionProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCompletionProvider {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(Script::default())),
            ready: true,
            barrier: None,
        }
    }

    /// A provider whose client was never configured.
    pub fn unconfigured() -> Self {
        Self {
            ready: false,
            ..Self::new()
        }
    }

    /// Queues a successful synchronous reply.
    pub fn with_reply(self, text: impl Into<String>, usage: TokenUsage) -> Self {
        self.lock().replies.push_back(Ok(Completion {
            text: text.into(),
            usage,
        }));
        self
    }

    /// Queues a synchronous failure.
    pub fn with_error(self, error: CompletionError) -> Self {
        self.lock().replies.push_back(Err(error));
        self
    }

    /// Queues a stream that yields `lines` and then ends.
    pub fn with_stream_lines<I, S>(self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lines = lines.into_iter().map(|l| Ok(l.into())).collect();
        self.lock().streams.push_back(MockStream::Lines(lines));
        self
    }

    /// Queues a fully scripted stream outcome.
    pub fn with_stream(self, script: MockStream) -> Self {
        self.lock().streams.push_back(script);
        self
    }

    /// Holds every synchronous reply at `barrier`, so that concurrent
    /// sends are all in flight before any of them commits.
    pub fn with_barrier(self, barrier: Arc<Barrier>) -> Self {
        Self {
            barrier: Some(barrier),
            ..self
        }
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CompletionProvider for MockCompletionProvider {
    fn is_ready(&self) -> bool {
        self.ready
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, CompletionError> {
        if !self.ready {
            return Err(CompletionError::NotConfigured);
        }
        let reply = {
            let mut script = self.lock();
            script.calls.push(request);
            script.replies.pop_front()
        };
        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }
        reply.unwrap_or_else(|| {
            Ok(Completion {
                text: "Mock response".to_string(),
                usage: TokenUsage::total(10),
            })
        })
    }

    async fn open_stream(&self, request: CompletionRequest) -> Result<UpstreamLines, CompletionError> {
        let next = {
            let mut script = self.lock();
            script.calls.push(request);
            script.streams.pop_front()
        };
        match next {
            Some(MockStream::Lines(lines)) => Ok(Box::pin(stream::iter(lines))),
            Some(MockStream::Error(error)) => Err(error),
            None => Err(CompletionError::NotConfigured),
        }
    }
}
