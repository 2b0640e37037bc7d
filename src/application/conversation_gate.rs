//! ConversationGate - the send orchestrator.
//!
//! Both send shapes run the same admission sequence:
//!
//! 1. conversation is active and owned by the caller
//! 2. quota admits new spend (`used < total`)
//! 3. new attachments and history are loaded and resolved
//! 4. provider context is assembled
//!
//! The synchronous send then calls the provider and commits the exchange.
//! The streaming send returns a channel of frames immediately and relays
//! in a spawned task; the exchange is committed once, at `[DONE]`.

use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::attachment_resolver::AttachmentResolver;
use super::context_assembler::assemble_context;
use super::views::TurnView;
use super::EngineError;
use crate::domain::conversation::{
    decode_payload, decode_upstream_line, Conversation, ContextMessage, EventAttachment,
    EventMessage, NewTurn, RelaySession, ResolvedAttachment, StreamFrame, UpstreamLine,
    CONTENT_TYPE_TEXT,
};
use crate::domain::foundation::{AttachmentId, ConversationId, UserId};
use crate::ports::{
    CompletionProvider, CompletionRequest, ConversationRepository, Exchange, MessageStore,
    QuotaLedger, StoreError, UpstreamLines,
};

/// Frames buffered between the relay task and the client writer.
const FRAME_BUFFER: usize = 32;

/// A message send, synchronous or streamed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessageCommand {
    pub user_id: UserId,
    pub conversation_id: ConversationId,
    pub content_type: String,
    pub content: String,
    pub attachment_ids: Vec<AttachmentId>,
}

impl SendMessageCommand {
    pub fn new(
        user_id: UserId,
        conversation_id: ConversationId,
        content_type: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            conversation_id,
            content_type: content_type.into(),
            content: content.into(),
            attachment_ids: Vec::new(),
        }
    }

    pub fn with_attachments(mut self, ids: Vec<AttachmentId>) -> Self {
        self.attachment_ids = ids;
        self
    }
}

/// Both persisted turns of a synchronous send.
#[derive(Debug, Clone, PartialEq)]
pub struct SendMessageResult {
    pub user_message: TurnView,
    pub model_message: TurnView,
}

/// Everything an admitted send needs to call the provider.
struct PreparedSend {
    cmd: SendMessageCommand,
    content_type: String,
    attachments: Vec<ResolvedAttachment>,
    context: Vec<ContextMessage>,
}

impl PreparedSend {
    fn request(&self) -> CompletionRequest {
        CompletionRequest::new(self.cmd.conversation_id, self.context.clone())
    }

    fn exchange(&self, reply: &str, debit: u64) -> Exchange {
        Exchange {
            user_id: self.cmd.user_id,
            conversation_id: self.cmd.conversation_id,
            user_turn: NewTurn::user(self.content_type.clone(), self.cmd.content.clone()),
            attachment_ids: self.attachments.iter().map(|r| r.attachment.id).collect(),
            assistant_turn: NewTurn::assistant(reply),
            debit,
        }
    }

    fn echo(&self) -> EventMessage {
        EventMessage::user_echo(
            self.content_type.clone(),
            self.cmd.content.clone(),
            self.attachments.iter().map(EventAttachment::from).collect(),
        )
    }
}

/// Orchestrates ownership, quota, context assembly, the provider call and
/// persistence for a message send.
#[derive(Clone)]
pub struct ConversationGate {
    conversations: Arc<dyn ConversationRepository>,
    messages: Arc<dyn MessageStore>,
    quota: Arc<dyn QuotaLedger>,
    provider: Arc<dyn CompletionProvider>,
    resolver: AttachmentResolver,
}

impl ConversationGate {
    pub fn new(
        conversations: Arc<dyn ConversationRepository>,
        messages: Arc<dyn MessageStore>,
        quota: Arc<dyn QuotaLedger>,
        provider: Arc<dyn CompletionProvider>,
        resolver: AttachmentResolver,
    ) -> Self {
        Self {
            conversations,
            messages,
            quota,
            provider,
            resolver,
        }
    }

    /// Sends a message and waits for the full reply.
    ///
    /// # Errors
    ///
    /// - `ConversationNotFound` if the conversation is missing, deleted or foreign
    /// - `ProviderNotReady` if no completion client is configured
    /// - `QuotaExceeded` if `used >= total`, checked before and at commit
    /// - `EmptyResponse` / `UpstreamFailure` for provider failures
    /// - `PersistenceFailure` if the exchange cannot be committed
    pub async fn send_message(&self, cmd: SendMessageCommand) -> Result<SendMessageResult, EngineError> {
        validate(&cmd)?;
        self.require_conversation(&cmd).await?;
        if !self.provider.is_ready() {
            return Err(EngineError::ProviderNotReady);
        }
        self.require_quota(cmd.user_id).await?;
        let prepared = self.prepare(cmd).await?;

        tracing::debug!(
            conversation_id = %prepared.cmd.conversation_id,
            messages = prepared.context.len(),
            "Requesting completion"
        );
        let completion = self.provider.complete(prepared.request()).await?;
        let debit = completion.usage.billable();

        let committed = self
            .messages
            .commit_exchange(prepared.exchange(&completion.text, debit))
            .await?;

        tracing::info!(
            conversation_id = %prepared.cmd.conversation_id,
            user_message_id = %committed.user_turn.id,
            assistant_message_id = %committed.assistant_turn.id,
            tokens = debit,
            "Message exchange committed"
        );

        let bound: Vec<AttachmentId> = committed.attachments.iter().map(|a| a.id).collect();
        let attachments = prepared
            .attachments
            .into_iter()
            .filter(|r| bound.contains(&r.attachment.id))
            .collect();

        Ok(SendMessageResult {
            user_message: TurnView::new(committed.user_turn, attachments),
            model_message: TurnView::new(committed.assistant_turn, Vec::new()),
        })
    }

    /// Admits a streamed send and starts relaying.
    ///
    /// Admission failures are returned before any frame is produced. Once
    /// admitted, every outcome is delivered as frames ending in `[DONE]`,
    /// unless the receiver is dropped first.
    pub async fn stream_message(
        &self,
        cmd: SendMessageCommand,
    ) -> Result<mpsc::Receiver<StreamFrame>, EngineError> {
        validate(&cmd)?;
        self.require_conversation(&cmd).await?;
        self.require_quota(cmd.user_id).await?;
        let prepared = self.prepare(cmd).await?;

        let (tx, rx) = mpsc::channel(FRAME_BUFFER);
        let provider = Arc::clone(&self.provider);
        let messages = Arc::clone(&self.messages);
        tokio::spawn(async move {
            relay(provider, messages, prepared, tx).await;
        });
        Ok(rx)
    }

    async fn require_conversation(&self, cmd: &SendMessageCommand) -> Result<Conversation, EngineError> {
        self.conversations
            .find_owned(cmd.user_id, cmd.conversation_id)
            .await?
            .ok_or(EngineError::ConversationNotFound)
    }

    async fn require_quota(&self, user_id: UserId) -> Result<(), EngineError> {
        check_quota(self.quota.as_ref(), user_id).await
    }

    async fn prepare(&self, cmd: SendMessageCommand) -> Result<PreparedSend, EngineError> {
        let new_attachments = self
            .messages
            .load_attachments_by_ids(cmd.user_id, &cmd.attachment_ids)
            .await?;
        let attachments = self.resolver.resolve_all(new_attachments).await?;

        let history = self.messages.list_all_messages(cmd.conversation_id).await?;
        let history_ids: Vec<_> = history.iter().map(|t| t.id).collect();
        let history_attachments = self
            .resolver
            .resolve_map(self.messages.load_attachments_map(&history_ids).await?)
            .await?;

        let context = assemble_context(&history, &history_attachments, &cmd.content, &attachments);
        let content_type = if cmd.content_type.trim().is_empty() {
            CONTENT_TYPE_TEXT.to_string()
        } else {
            cmd.content_type.clone()
        };

        Ok(PreparedSend {
            cmd,
            content_type,
            attachments,
            context,
        })
    }
}

/// Quota admission shared by every metered operation.
///
/// A user without a ledger entry has no allotment and is refused.
pub(crate) async fn check_quota(quota: &dyn QuotaLedger, user_id: UserId) -> Result<(), EngineError> {
    match quota.usage(user_id).await {
        Ok(usage) if usage.admits_spend() => Ok(()),
        Ok(_) | Err(StoreError::NotFound(_)) => Err(EngineError::QuotaExceeded),
        Err(e) => Err(e.into()),
    }
}

fn validate(cmd: &SendMessageCommand) -> Result<(), EngineError> {
    if cmd.content.trim().is_empty() && cmd.attachment_ids.is_empty() {
        return Err(EngineError::invalid("message content is empty"));
    }
    Ok(())
}

/// Sends frames until the client goes away. Returns false if it did.
async fn emit(tx: &mpsc::Sender<StreamFrame>, frames: Vec<StreamFrame>) -> bool {
    for frame in frames {
        if tx.send(frame).await.is_err() {
            return false;
        }
    }
    true
}

async fn relay(
    provider: Arc<dyn CompletionProvider>,
    messages: Arc<dyn MessageStore>,
    prepared: PreparedSend,
    tx: mpsc::Sender<StreamFrame>,
) {
    let conversation_id = prepared.cmd.conversation_id;
    let mut session = RelaySession::new(prepared.echo());

    let lines = match provider.open_stream(prepared.request()).await {
        Ok(lines) => lines,
        Err(e) if e.degrades_stream() => {
            tracing::warn!(%conversation_id, error = %e, "Provider unavailable, sending degraded stream");
            emit(&tx, session.degraded_frames()).await;
            return;
        }
        Err(e) => {
            let err = EngineError::from(e);
            tracing::error!(%conversation_id, error = %err, "Failed to open provider stream");
            emit(&tx, session.abort_frames(err.err_code(), err.to_string())).await;
            return;
        }
    };

    session.begin_relay();
    let frames = relay_lines(lines, &mut session, &tx).await;
    let frames = match frames {
        RelayEnd::Disconnected => {
            tracing::info!(%conversation_id, "Client disconnected, stream abandoned");
            return;
        }
        RelayEnd::Failed(err) => {
            tracing::error!(%conversation_id, error = %err, "Provider stream failed");
            session.abort_frames(err.err_code(), err.to_string())
        }
        RelayEnd::Completed => {
            let debit = session.usage().billable();
            match messages
                .commit_exchange(prepared.exchange(session.reply(), debit))
                .await
            {
                Ok(committed) => {
                    tracing::info!(
                        %conversation_id,
                        assistant_message_id = %committed.assistant_turn.id,
                        tokens = debit,
                        "Streamed exchange committed"
                    );
                    session.finish_frames(committed.assistant_turn.id)
                }
                Err(e) => {
                    let err = EngineError::from(e);
                    tracing::error!(%conversation_id, error = %err, "Failed to commit streamed exchange");
                    session.abort_frames(err.err_code(), err.to_string())
                }
            }
        }
    };
    emit(&tx, frames).await;
}

enum RelayEnd {
    Completed,
    Failed(EngineError),
    Disconnected,
}

async fn relay_lines(
    mut lines: UpstreamLines,
    session: &mut RelaySession,
    tx: &mpsc::Sender<StreamFrame>,
) -> RelayEnd {
    loop {
        if tx.is_closed() {
            return RelayEnd::Disconnected;
        }
        let line = match lines.next().await {
            Some(Ok(line)) => line,
            Some(Err(e)) => return RelayEnd::Failed(EngineError::from(e)),
            None => {
                return RelayEnd::Failed(EngineError::UpstreamFailure(
                    "provider stream ended without [DONE]".to_string(),
                ))
            }
        };
        match decode_upstream_line(&line) {
            UpstreamLine::Skip => {}
            UpstreamLine::Done => return RelayEnd::Completed,
            UpstreamLine::Data(data) => {
                if let Some(frame) = session.on_payload(decode_payload(&data)) {
                    if tx.send(frame).await.is_err() {
                        return RelayEnd::Disconnected;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::{MockCompletionProvider, MockStream};
    use crate::adapters::in_memory::InMemoryStore;
    use crate::adapters::storage::InMemoryObjectStorage;
    use crate::domain::conversation::{
        ContentPart, NewAttachment, SenderType, StorageClass, StreamEnvelope, TokenUsage,
    };
    use crate::ports::CompletionError;
    use std::time::Duration;

    const OWNER: i64 = 7;
    const CONVERSATION: i64 = 42;

    fn store(total: i64, used: i64) -> InMemoryStore {
        InMemoryStore::new()
            .with_user(UserId::new(OWNER), "alice", total, used)
            .with_conversation(ConversationId::new(CONVERSATION), UserId::new(OWNER), "Chat")
    }

    fn gate(store: &Arc<InMemoryStore>, provider: &MockCompletionProvider) -> ConversationGate {
        let objects = Arc::new(InMemoryObjectStorage::new(Duration::from_secs(3600)));
        ConversationGate::new(
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(provider.clone()),
            AttachmentResolver::new(objects, Duration::from_secs(600)),
        )
    }

    fn command(content: &str) -> SendMessageCommand {
        SendMessageCommand::new(
            UserId::new(OWNER),
            ConversationId::new(CONVERSATION),
            "TEXT",
            content,
        )
    }

    fn used(store: &InMemoryStore) -> i64 {
        store.quota_of(UserId::new(OWNER)).unwrap().used
    }

    async fn collect(mut rx: mpsc::Receiver<StreamFrame>) -> Vec<StreamFrame> {
        let mut frames = Vec::new();
        while let Some(frame) = rx.recv().await {
            frames.push(frame);
        }
        frames
    }

    fn envelope(frame: &StreamFrame) -> &StreamEnvelope {
        match frame {
            StreamFrame::Event(envelope) => envelope,
            StreamFrame::Done => panic!("expected an event frame"),
        }
    }

    mod send {
        use super::*;

        #[tokio::test]
        async fn persists_both_turns_and_debits_reported_usage() {
            let store = Arc::new(store(1000, 0));
            let provider = MockCompletionProvider::new().with_reply("Hello back", TokenUsage::total(30));
            let gate = gate(&store, &provider);

            let result = gate.send_message(command("Hello")).await.unwrap();

            assert_eq!(result.user_message.turn.sender, SenderType::User);
            assert_eq!(result.user_message.turn.content, "Hello");
            assert_eq!(result.model_message.turn.sender, SenderType::Assistant);
            assert_eq!(result.model_message.turn.content, "Hello back");
            assert!(result.user_message.turn.id < result.model_message.turn.id);
            assert_eq!(store.message_count(ConversationId::new(CONVERSATION)), 2);
            assert_eq!(used(&store), 30);
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
        async fn concurrent_sends_commit_one_debit_past_the_limit() {
            let store = Arc::new(store(10, 0));
            let provider = MockCompletionProvider::new()
                .with_reply("first", TokenUsage::total(20))
                .with_reply("second", TokenUsage::total(20))
                .with_barrier(Arc::new(tokio::sync::Barrier::new(2)));
            let gate = gate(&store, &provider);

            let (a, b) = tokio::join!(
                gate.send_message(command("one")),
                gate.send_message(command("two"))
            );

            assert_eq!(provider.call_count(), 2);
            let outcomes = [a, b];
            assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
            assert!(outcomes
                .iter()
                .any(|r| matches!(r, Err(EngineError::QuotaExceeded))));
            assert_eq!(used(&store), 20);
            assert_eq!(store.message_count(ConversationId::new(CONVERSATION)), 2);
        }

        #[tokio::test]
        async fn split_usage_is_summed_when_total_missing() {
            let store = Arc::new(store(1000, 0));
            let provider = MockCompletionProvider::new().with_reply("ok", TokenUsage::split(4, 6));
            let gate = gate(&store, &provider);

            gate.send_message(command("Hi")).await.unwrap();

            assert_eq!(used(&store), 10);
        }

        #[tokio::test]
        async fn history_precedes_new_turn_in_context() {
            let store = Arc::new(store(1000, 0));
            let provider = MockCompletionProvider::new()
                .with_reply("first", TokenUsage::total(1))
                .with_reply("second", TokenUsage::total(1));
            let gate = gate(&store, &provider);

            gate.send_message(command("one")).await.unwrap();
            gate.send_message(command("two")).await.unwrap();

            let calls = provider.calls();
            let context = &calls[1].messages;
            let texts: Vec<_> = context.iter().filter_map(|m| m.as_plain_text()).collect();
            assert_eq!(texts, vec!["one", "first", "two"]);
            assert_eq!(calls[1].conversation_id, ConversationId::new(CONVERSATION));
        }

        #[tokio::test]
        async fn attachments_are_sent_before_text_and_bound_to_user_turn() {
            let store = Arc::new(store(1000, 0));
            let provider = MockCompletionProvider::new();
            let gate = gate(&store, &provider);
            let upload = store
                .create_attachment(NewAttachment::upload(
                    UserId::new(OWNER),
                    Some("image/png"),
                    StorageClass::Local,
                    "/uploads/cat.png",
                ))
                .await
                .unwrap();

            let result = gate
                .send_message(command("Describe").with_attachments(vec![upload.id]))
                .await
                .unwrap();

            let last = provider.calls()[0].messages.last().cloned().unwrap();
            assert_eq!(
                last.parts,
                vec![
                    ContentPart::ImageRef("/uploads/cat.png".to_string()),
                    ContentPart::Text("Describe".to_string()),
                ]
            );
            assert_eq!(result.user_message.attachments.len(), 1);
            assert_eq!(result.user_message.attachments[0].url, "/uploads/cat.png");
            assert_eq!(
                store.attachment(upload.id).unwrap().message_id,
                Some(result.user_message.turn.id)
            );
        }

        #[tokio::test]
        async fn foreign_attachment_is_ignored() {
            let store = Arc::new(store(1000, 0));
            let provider = MockCompletionProvider::new();
            let gate = gate(&store, &provider);
            let foreign = store
                .create_attachment(NewAttachment::upload(
                    UserId::new(99),
                    Some("image/png"),
                    StorageClass::Local,
                    "/uploads/other.png",
                ))
                .await
                .unwrap();

            let result = gate
                .send_message(command("Look").with_attachments(vec![foreign.id]))
                .await
                .unwrap();

            assert!(result.user_message.attachments.is_empty());
            assert_eq!(store.attachment(foreign.id).unwrap().message_id, None);
        }

        #[tokio::test]
        async fn foreign_conversation_is_not_found() {
            let store = Arc::new(
                InMemoryStore::new()
                    .with_user(UserId::new(OWNER), "alice", 1000, 0)
                    .with_conversation(ConversationId::new(CONVERSATION), UserId::new(8), "Theirs"),
            );
            let provider = MockCompletionProvider::new();
            let gate = gate(&store, &provider);

            let err = gate.send_message(command("Hello")).await.unwrap_err();

            assert_eq!(err, EngineError::ConversationNotFound);
            assert_eq!(provider.call_count(), 0);
        }

        #[tokio::test]
        async fn exhausted_quota_is_refused_before_provider_call() {
            let store = Arc::new(store(1000, 1000));
            let provider = MockCompletionProvider::new();
            let gate = gate(&store, &provider);

            let err = gate.send_message(command("Hello")).await.unwrap_err();

            assert_eq!(err, EngineError::QuotaExceeded);
            assert_eq!(err.err_code(), 403);
            assert_eq!(provider.call_count(), 0);
            assert_eq!(store.message_count(ConversationId::new(CONVERSATION)), 0);
        }

        #[tokio::test]
        async fn user_without_ledger_entry_is_refused() {
            let store = Arc::new(
                InMemoryStore::new().with_conversation(
                    ConversationId::new(CONVERSATION),
                    UserId::new(OWNER),
                    "Chat",
                ),
            );
            let provider = MockCompletionProvider::new();
            let gate = gate(&store, &provider);

            let err = gate.send_message(command("Hello")).await.unwrap_err();

            assert_eq!(err, EngineError::QuotaExceeded);
        }

        #[tokio::test]
        async fn unconfigured_provider_is_not_ready() {
            let store = Arc::new(store(1000, 0));
            let provider = MockCompletionProvider::unconfigured();
            let gate = gate(&store, &provider);

            let err = gate.send_message(command("Hello")).await.unwrap_err();

            assert_eq!(err, EngineError::ProviderNotReady);
            assert_eq!(err.err_code(), 500);
        }

        #[tokio::test]
        async fn empty_message_is_rejected() {
            let store = Arc::new(store(1000, 0));
            let provider = MockCompletionProvider::new();
            let gate = gate(&store, &provider);

            let err = gate.send_message(command("   ")).await.unwrap_err();

            assert_eq!(err.err_code(), 400);
            assert_eq!(provider.call_count(), 0);
        }

        #[tokio::test]
        async fn provider_failure_persists_nothing() {
            let store = Arc::new(store(1000, 0));
            let provider = MockCompletionProvider::new().with_error(CompletionError::EmptyResponse);
            let gate = gate(&store, &provider);

            let err = gate.send_message(command("Hello")).await.unwrap_err();

            assert_eq!(err, EngineError::EmptyResponse);
            assert_eq!(store.message_count(ConversationId::new(CONVERSATION)), 0);
            assert_eq!(used(&store), 0);
        }

        #[tokio::test]
        async fn failed_commit_is_a_persistence_failure() {
            let store = Arc::new(store(1000, 0));
            store.fail_commits(true);
            let provider = MockCompletionProvider::new();
            let gate = gate(&store, &provider);

            let err = gate.send_message(command("Hello")).await.unwrap_err();

            assert!(matches!(err, EngineError::PersistenceFailure(_)));
            assert_eq!(store.message_count(ConversationId::new(CONVERSATION)), 0);
        }
    }

    mod stream {
        use super::*;

        #[tokio::test]
        async fn relays_content_then_commits_at_done() {
            let store = Arc::new(store(1000, 0));
            let provider = MockCompletionProvider::new().with_stream_lines([
                r#"data: {"content":"Hel"}"#,
                "",
                r#"data: {"content":"lo"}"#,
                r#"data: {"usage":{"total_tokens":12}}"#,
                "data: [DONE]",
            ]);
            let gate = gate(&store, &provider);

            let frames = collect(gate.stream_message(command("Hi")).await.unwrap()).await;

            assert_eq!(frames.len(), 4);
            let first = envelope(&frames[0]);
            assert_eq!(first.err_code, 0);
            assert_eq!(first.user_message.as_ref().unwrap().content, "Hi");
            assert_eq!(first.model_message.as_ref().unwrap().content, "Hel");
            let second = envelope(&frames[1]);
            assert!(second.user_message.is_none());
            assert_eq!(second.model_message.as_ref().unwrap().content, "lo");
            let last_event = envelope(&frames[2]);
            assert_eq!(last_event.model_message.as_ref().unwrap().content, "");
            assert!(frames[3].is_done());

            assert_eq!(store.message_count(ConversationId::new(CONVERSATION)), 2);
            assert_eq!(used(&store), 12);
            let history = store
                .list_all_messages(ConversationId::new(CONVERSATION))
                .await
                .unwrap();
            assert_eq!(history[1].content, "Hello");
            assert_eq!(
                last_event.model_message.as_ref().unwrap().message_id,
                history[1].id
            );
        }

        #[tokio::test]
        async fn unreachable_provider_degrades_to_mock_stream() {
            let store = Arc::new(store(1000, 0));
            let provider = MockCompletionProvider::new();
            let gate = gate(&store, &provider);

            let frames = collect(gate.stream_message(command("Hi")).await.unwrap()).await;

            assert_eq!(frames.len(), 5);
            let first = envelope(&frames[0]);
            assert!(first.user_message.is_some());
            assert_eq!(
                first.model_message.as_ref().unwrap().content,
                "mock chunk 1: Hi"
            );
            assert!(frames[4].is_done());
            assert_eq!(store.message_count(ConversationId::new(CONVERSATION)), 0);
            assert_eq!(used(&store), 0);
        }

        #[tokio::test]
        async fn stream_without_done_aborts_with_upstream_code() {
            let store = Arc::new(store(1000, 0));
            let provider = MockCompletionProvider::new()
                .with_stream_lines([r#"data: {"content":"partial"}"#]);
            let gate = gate(&store, &provider);

            let frames = collect(gate.stream_message(command("Hi")).await.unwrap()).await;

            assert_eq!(frames.len(), 3);
            assert_eq!(envelope(&frames[1]).err_code, 502);
            assert!(frames[2].is_done());
            assert_eq!(store.message_count(ConversationId::new(CONVERSATION)), 0);
        }

        #[tokio::test]
        async fn read_error_mid_stream_aborts() {
            let store = Arc::new(store(1000, 0));
            let provider = MockCompletionProvider::new().with_stream(MockStream::Lines(vec![
                Ok(r#"data: {"content":"a"}"#.to_string()),
                Err(CompletionError::network("reset")),
            ]));
            let gate = gate(&store, &provider);

            let frames = collect(gate.stream_message(command("Hi")).await.unwrap()).await;

            let failure = envelope(&frames[frames.len() - 2]);
            assert_eq!(failure.err_code, 502);
            assert!(failure.model_message.is_none());
            assert_eq!(store.message_count(ConversationId::new(CONVERSATION)), 0);
        }

        #[tokio::test]
        async fn malformed_open_failure_aborts_instead_of_degrading() {
            let store = Arc::new(store(1000, 0));
            let provider = MockCompletionProvider::new()
                .with_stream(MockStream::Error(CompletionError::parse("bad")));
            let gate = gate(&store, &provider);

            let frames = collect(gate.stream_message(command("Hi")).await.unwrap()).await;

            assert_eq!(frames.len(), 2);
            assert_eq!(envelope(&frames[0]).err_code, 502);
        }

        #[tokio::test]
        async fn failed_commit_is_reported_in_stream() {
            let store = Arc::new(store(1000, 0));
            store.fail_commits(true);
            let provider = MockCompletionProvider::new()
                .with_stream_lines([r#"data: {"content":"x"}"#, "data: [DONE]"]);
            let gate = gate(&store, &provider);

            let frames = collect(gate.stream_message(command("Hi")).await.unwrap()).await;

            assert_eq!(envelope(&frames[1]).err_code, 500);
            assert!(frames[2].is_done());
        }

        #[tokio::test]
        async fn admission_failures_happen_before_streaming() {
            let store = Arc::new(store(100, 100));
            let provider = MockCompletionProvider::new();
            let gate = gate(&store, &provider);

            let err = gate.stream_message(command("Hi")).await.unwrap_err();

            assert_eq!(err, EngineError::QuotaExceeded);
        }

        #[tokio::test]
        async fn dropped_receiver_stops_relay_without_commit() {
            let store = Arc::new(store(1000, 0));
            let provider = MockCompletionProvider::new()
                .with_stream_lines([r#"data: {"content":"x"}"#, "data: [DONE]"]);
            let gate = gate(&store, &provider);

            let rx = gate.stream_message(command("Hi")).await.unwrap();
            drop(rx);
            tokio::task::yield_now().await;
            tokio::time::sleep(Duration::from_millis(20)).await;

            assert_eq!(store.message_count(ConversationId::new(CONVERSATION)), 0);
        }
    }
}
