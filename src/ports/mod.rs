//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Persistence Ports
//!
//! - `ConversationRepository` - Conversation lifecycle, owner scoped
//! - `MessageStore` - Turns, attachments, history and the exchange commit
//! - `QuotaLedger` - Per-user token allotment
//!
//! ## External Service Ports
//!
//! - `CompletionProvider` - Chat completion, blocking and streaming
//! - `ObjectStorage` - Blob put and presigned reads
//! - `FileStore` - Local disk fallback for uploads
//! - `SpeechProvider` - Speech-to-text and text-to-speech
//! - `SessionValidator` - Bearer token validation

mod completion_provider;
mod conversation_repository;
mod message_store;
mod object_storage;
mod quota_ledger;
mod session_validator;
mod speech_provider;

pub use completion_provider::{
    Completion, CompletionError, CompletionProvider, CompletionRequest, UpstreamLines,
};
pub use conversation_repository::ConversationRepository;
pub use message_store::{CommittedExchange, Exchange, MessageStore, StoreError};
pub use object_storage::{FileStore, ObjectStorage, StorageError};
pub use quota_ledger::{ledger_amount, Account, QuotaLedger, QuotaUsage};
pub use session_validator::SessionValidator;
pub use speech_provider::{
    AudioEvent, AudioStream, FetchedAudio, SpeechError, SpeechProvider, Synthesis,
    SynthesisRequest, Transcription,
};
