//! Shared fixtures for the HTTP integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, Response};
use axum::Router;
use secrecy::Secret;
use serde_json::Value;
use tower::ServiceExt;

use chat_relay::adapters::ai::MockCompletionProvider;
use chat_relay::adapters::auth::MockSessionValidator;
use chat_relay::adapters::http::{api_router, AppState, Services};
use chat_relay::adapters::in_memory::InMemoryStore;
use chat_relay::adapters::speech::MockSpeechProvider;
use chat_relay::adapters::storage::{InMemoryObjectStorage, LocalFileStore};
use chat_relay::config::{
    AppConfig, AuthConfig, DatabaseConfig, LlmConfig, ServerConfig, SpeechConfig, StorageConfig,
};
use chat_relay::domain::foundation::{ConversationId, UserId};

pub const ALICE: i64 = 7;
pub const BOB: i64 = 8;
pub const ALICE_TOKEN: &str = "alice-token";
pub const BOB_TOKEN: &str = "bob-token";
pub const ALICE_CONVERSATION: i64 = 42;
pub const BOB_CONVERSATION: i64 = 43;

pub fn config() -> AppConfig {
    AppConfig {
        server: ServerConfig::default(),
        database: DatabaseConfig::default(),
        auth: AuthConfig {
            jwt_secret: Secret::new("integration-secret".to_string()),
            leeway_secs: 0,
        },
        llm: LlmConfig {
            model: "test-model".to_string(),
            ..LlmConfig::default()
        },
        storage: StorageConfig {
            prefix: "uploads/".to_string(),
            ..StorageConfig::default()
        },
        speech: SpeechConfig::default(),
    }
}

/// A fully wired app over in-memory ports, with handles for assertions.
pub struct TestApp {
    pub store: Arc<InMemoryStore>,
    pub objects: Arc<InMemoryObjectStorage>,
    pub provider: MockCompletionProvider,
    pub speech: Arc<MockSpeechProvider>,
    pub router: Router,
    _uploads: tempfile::TempDir,
}

impl TestApp {
    pub fn new(provider: MockCompletionProvider) -> Self {
        Self::with_speech(provider, MockSpeechProvider::new())
    }

    pub fn with_speech(provider: MockCompletionProvider, speech: MockSpeechProvider) -> Self {
        Self::with_quota(provider, speech, 1000, 0)
    }

    pub fn with_quota(
        provider: MockCompletionProvider,
        speech: MockSpeechProvider,
        total: i64,
        used: i64,
    ) -> Self {
        let store = Arc::new(
            InMemoryStore::new()
                .with_user(UserId::new(ALICE), "alice", total, used)
                .with_user(UserId::new(BOB), "bob", 1000, 0)
                .with_conversation(
                    ConversationId::new(ALICE_CONVERSATION),
                    UserId::new(ALICE),
                    "Trip planning",
                )
                .with_conversation(
                    ConversationId::new(BOB_CONVERSATION),
                    UserId::new(BOB),
                    "Groceries",
                ),
        );
        let objects = Arc::new(InMemoryObjectStorage::default());
        let speech = Arc::new(speech);
        let uploads = tempfile::tempdir().unwrap();
        let sessions = MockSessionValidator::new()
            .with_test_user(ALICE_TOKEN, ALICE)
            .with_test_user(BOB_TOKEN, BOB);

        let services = Services {
            conversations: store.clone(),
            messages: store.clone(),
            quota: store.clone(),
            provider: Arc::new(provider.clone()),
            speech: speech.clone(),
            storage: objects.clone(),
            files: Arc::new(LocalFileStore::new(uploads.path())),
            sessions: Arc::new(sessions),
        };
        let config = config();
        let router = api_router(AppState::new(services, &config), &config.server);

        Self {
            store,
            objects,
            provider,
            speech,
            router,
            _uploads: uploads,
        }
    }

    pub async fn call(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Sends a request and decodes the JSON body.
    pub async fn json(&self, request: Request<Body>) -> (u16, Value) {
        let response = self.call(request).await;
        let status = response.status().as_u16();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }
}

pub fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(method: Method, uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn multipart(uri: &str, token: &str, filename: &str, mime: &str, bytes: &[u8]) -> Request<Body> {
    const BOUNDARY: &str = "relay-test-boundary";
    let mut body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: {m}\r\n\r\n",
        b = BOUNDARY,
        f = filename,
        m = mime
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn text_message(content: &str, attachment_ids: &[i64]) -> Value {
    serde_json::json!({
        "message": { "content_type": "text", "content": content },
        "attachment_ids": attachment_ids,
    })
}

pub fn used_quota(app: &TestApp, user: i64) -> i64 {
    app.store.quota_of(UserId::new(user)).unwrap().used
}
