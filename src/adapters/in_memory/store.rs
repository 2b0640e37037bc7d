//! Mutex-backed implementation of the persistence ports.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::conversation::{
    Attachment, Conversation, ConversationStatus, NewAttachment, NewConversation, NewTurn,
    PageRequest, Turn,
};
use crate::domain::foundation::{
    AttachmentId, ConversationId, MessageId, StateMachine, Timestamp, UserId,
};
use crate::config::SeedUser;
use crate::ports::{
    ledger_amount, Account, CommittedExchange, ConversationRepository, Exchange, MessageStore,
    QuotaLedger, QuotaUsage, StoreError,
};

#[derive(Debug, Clone)]
struct UserRow {
    username: String,
    nickname: String,
    total_quota: i64,
    used_quota: i64,
}

#[derive(Debug, Default)]
struct State {
    users: HashMap<UserId, UserRow>,
    conversations: BTreeMap<ConversationId, Conversation>,
    messages: BTreeMap<MessageId, Turn>,
    attachments: BTreeMap<AttachmentId, Attachment>,
    next_conversation: i64,
    next_message: i64,
    next_attachment: i64,
}

impl State {
    fn owned_active(&self, user_id: UserId, id: ConversationId) -> Option<&Conversation> {
        self.conversations
            .get(&id)
            .filter(|c| c.is_owned_by(user_id) && c.is_active())
    }

    fn insert_turn(&mut self, conversation_id: ConversationId, turn: NewTurn) -> Turn {
        self.next_message += 1;
        let stored = Turn {
            id: MessageId::new(self.next_message),
            conversation_id,
            sender: turn.sender,
            content_type: turn.content_type,
            content: turn.content,
            token_total: turn.token_total,
            created_at: Timestamp::now(),
        };
        self.messages.insert(stored.id, stored.clone());
        stored
    }

    fn rebind(&mut self, owner: UserId, message_id: MessageId, ids: &[AttachmentId]) -> u64 {
        let mut rebound = 0;
        for id in ids {
            if let Some(att) = self.attachments.get_mut(id).filter(|a| a.owner == owner) {
                att.message_id = Some(message_id);
                rebound += 1;
            }
        }
        rebound
    }

    fn debit(&mut self, user_id: UserId, amount: u64) -> Result<(), StoreError> {
        if amount == 0 {
            return Ok(());
        }
        let amount = ledger_amount(amount)?;
        match self.users.get_mut(&user_id) {
            Some(row) if row.used_quota < row.total_quota => {
                row.used_quota = row.used_quota.saturating_add(amount);
                Ok(())
            }
            _ => Err(StoreError::QuotaExceeded),
        }
    }
}

/// In-memory store for tests and database-less development.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
    fail_commits: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user with the given quota.
    pub fn with_user(self, id: UserId, username: &str, total_quota: i64, used_quota: i64) -> Self {
        self.lock().users.insert(
            id,
            UserRow {
                username: username.to_string(),
                nickname: username.to_string(),
                total_quota,
                used_quota,
            },
        );
        self
    }

    /// Registers the configured development user with an unused quota.
    pub fn with_seed_user(self, seed: &SeedUser) -> Self {
        self.with_user(UserId::new(seed.id), &seed.username, seed.total_quota, 0)
    }

    /// Adds an active conversation with a fixed id.
    pub fn with_conversation(self, id: ConversationId, user_id: UserId, title: &str) -> Self {
        {
            let mut state = self.lock();
            state.next_conversation = state.next_conversation.max(id.as_i64());
            state.conversations.insert(
                id,
                Conversation {
                    id,
                    user_id,
                    title: title.to_string(),
                    status: ConversationStatus::Active,
                    llm_model: "test-model".to_string(),
                    system_prompt: None,
                    created_at: Timestamp::now(),
                },
            );
        }
        self
    }

    /// Makes every subsequent `commit_exchange` fail with a database error.
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Current quota of a user, for assertions.
    pub fn quota_of(&self, user_id: UserId) -> Option<QuotaUsage> {
        self.lock()
            .users
            .get(&user_id)
            .map(|r| QuotaUsage::new(r.total_quota, r.used_quota))
    }

    /// Number of turns in a conversation, for assertions.
    pub fn message_count(&self, conversation_id: ConversationId) -> usize {
        self.lock()
            .messages
            .values()
            .filter(|m| m.conversation_id == conversation_id)
            .count()
    }

    /// An attachment by id, for assertions.
    pub fn attachment(&self, id: AttachmentId) -> Option<Attachment> {
        self.lock().attachments.get(&id).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ConversationRepository for InMemoryStore {
    async fn create(&self, conversation: NewConversation) -> Result<Conversation, StoreError> {
        let mut state = self.lock();
        state.next_conversation += 1;
        let stored = Conversation {
            id: ConversationId::new(state.next_conversation),
            user_id: conversation.user_id,
            title: conversation.title,
            status: ConversationStatus::Active,
            llm_model: conversation.llm_model,
            system_prompt: conversation.system_prompt,
            created_at: Timestamp::now(),
        };
        state.conversations.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_owned(
        &self,
        user_id: UserId,
        conversation_id: ConversationId,
    ) -> Result<Option<Conversation>, StoreError> {
        Ok(self.lock().owned_active(user_id, conversation_id).cloned())
    }

    async fn rename(
        &self,
        user_id: UserId,
        conversation_id: ConversationId,
        title: &str,
    ) -> Result<bool, StoreError> {
        let mut state = self.lock();
        match state
            .conversations
            .get_mut(&conversation_id)
            .filter(|c| c.is_owned_by(user_id) && c.is_active())
        {
            Some(conv) => {
                conv.title = title.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, user_id: UserId, conversation_id: ConversationId) -> Result<bool, StoreError> {
        let mut state = self.lock();
        let Some(conv) = state
            .conversations
            .get_mut(&conversation_id)
            .filter(|c| c.is_owned_by(user_id))
        else {
            return Ok(false);
        };
        match conv.status.transition_to(ConversationStatus::Deleted) {
            Ok(next) => {
                conv.status = next;
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Conversation>, StoreError> {
        let state = self.lock();
        Ok(state
            .conversations
            .values()
            .rev()
            .filter(|c| c.is_owned_by(user_id) && c.is_active())
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn insert_message(
        &self,
        conversation_id: ConversationId,
        turn: NewTurn,
    ) -> Result<Turn, StoreError> {
        let mut state = self.lock();
        if !state.conversations.contains_key(&conversation_id) {
            return Err(StoreError::NotFound(format!("conversation {}", conversation_id)));
        }
        Ok(state.insert_turn(conversation_id, turn))
    }

    async fn attach_files_to_message(
        &self,
        owner: UserId,
        message_id: MessageId,
        attachment_ids: &[AttachmentId],
    ) -> Result<u64, StoreError> {
        if attachment_ids.is_empty() {
            return Ok(0);
        }
        Ok(self.lock().rebind(owner, message_id, attachment_ids))
    }

    async fn list_messages(
        &self,
        conversation_id: ConversationId,
        page: PageRequest,
    ) -> Result<Vec<Turn>, StoreError> {
        let state = self.lock();
        Ok(state
            .messages
            .values()
            .filter(|m| m.conversation_id == conversation_id)
            .skip(page.offset() as usize)
            .take(page.page_size() as usize)
            .cloned()
            .collect())
    }

    async fn count_messages(&self, conversation_id: ConversationId) -> Result<i64, StoreError> {
        Ok(self.message_count(conversation_id) as i64)
    }

    async fn list_all_messages(&self, conversation_id: ConversationId) -> Result<Vec<Turn>, StoreError> {
        let state = self.lock();
        Ok(state
            .messages
            .values()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect())
    }

    async fn load_attachments_map(
        &self,
        message_ids: &[MessageId],
    ) -> Result<HashMap<MessageId, Vec<Attachment>>, StoreError> {
        let state = self.lock();
        let mut map: HashMap<MessageId, Vec<Attachment>> = HashMap::new();
        for att in state.attachments.values() {
            if let Some(message_id) = att.message_id.filter(|id| message_ids.contains(id)) {
                map.entry(message_id).or_default().push(att.clone());
            }
        }
        Ok(map)
    }

    async fn load_attachments_by_ids(
        &self,
        owner: UserId,
        attachment_ids: &[AttachmentId],
    ) -> Result<Vec<Attachment>, StoreError> {
        let state = self.lock();
        Ok(attachment_ids
            .iter()
            .filter_map(|id| state.attachments.get(id))
            .filter(|a| a.owner == owner)
            .cloned()
            .collect())
    }

    async fn create_attachment(&self, attachment: NewAttachment) -> Result<Attachment, StoreError> {
        let mut state = self.lock();
        state.next_attachment += 1;
        let stored = Attachment {
            id: AttachmentId::new(state.next_attachment),
            owner: attachment.owner,
            message_id: None,
            attachment_type: attachment.attachment_type,
            mime_type: attachment.mime_type,
            storage: attachment.storage,
            location: attachment.location,
            duration_ms: attachment.duration_ms,
            created_at: Timestamp::now(),
        };
        state.attachments.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_message(&self, user_id: UserId, message_id: MessageId) -> Result<Option<Turn>, StoreError> {
        let state = self.lock();
        Ok(state
            .messages
            .get(&message_id)
            .filter(|m| state.owned_active(user_id, m.conversation_id).is_some())
            .cloned())
    }

    async fn commit_exchange(&self, exchange: Exchange) -> Result<CommittedExchange, StoreError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::database("commit disabled"));
        }
        let mut state = self.lock();
        if !state.conversations.contains_key(&exchange.conversation_id) {
            return Err(StoreError::NotFound(format!(
                "conversation {}",
                exchange.conversation_id
            )));
        }

        // Nothing below can fail once the debit has been admitted.
        state.debit(exchange.user_id, exchange.debit)?;
        let user_turn = state.insert_turn(exchange.conversation_id, exchange.user_turn);
        state.rebind(exchange.user_id, user_turn.id, &exchange.attachment_ids);
        let assistant_turn = state.insert_turn(exchange.conversation_id, exchange.assistant_turn);

        let attachments = state
            .attachments
            .values()
            .filter(|a| a.message_id == Some(user_turn.id))
            .cloned()
            .collect();

        Ok(CommittedExchange {
            user_turn,
            assistant_turn,
            attachments,
        })
    }
}

#[async_trait]
impl QuotaLedger for InMemoryStore {
    async fn usage(&self, user_id: UserId) -> Result<QuotaUsage, StoreError> {
        self.quota_of(user_id)
            .ok_or_else(|| StoreError::NotFound(format!("user {}", user_id)))
    }

    async fn increase_used(&self, user_id: UserId, amount: u64) -> Result<(), StoreError> {
        let amount = ledger_amount(amount)?;
        let mut state = self.lock();
        let row = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::NotFound(format!("user {}", user_id)))?;
        row.used_quota = row.used_quota.saturating_add(amount);
        Ok(())
    }

    async fn account(&self, user_id: UserId) -> Result<Option<Account>, StoreError> {
        Ok(self.lock().users.get(&user_id).map(|row| Account {
            user_id,
            username: row.username.clone(),
            nickname: row.nickname.clone(),
            quota: QuotaUsage::new(row.total_quota, row.used_quota),
        }))
    }
}
