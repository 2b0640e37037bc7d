//! Router assembly.
//!
//! ```text
//! /health                               liveness
//! /uploads/*                            local upload directory
//! /api/conversations/...                conversation lifecycle and message send
//! /api/attachments, /api/speech/...     uploads and speech
//! /api/messages/:id/tts[/stream]        text-to-speech
//! /api/me                               account and quota
//! ```
//!
//! Everything under `/api` passes through the auth middleware; handlers
//! decide whether a user is required.

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use std::sync::Arc;

use super::account::{account_routes, AccountHandlers};
use super::conversation::{conversation_routes, ConversationHandlers};
use super::media::{media_routes, MediaHandlers};
use super::middleware::{auth_middleware, AuthState};
use crate::adapters::storage::UPLOADS_ROUTE;
use crate::application::handlers::{
    CreateConversationHandler, DeleteConversationHandler, GetAccountHandler, GetHistoryHandler,
    ListConversationsHandler, ObjectKeys, RenameConversationHandler, SpeechToTextHandler,
    TextToSpeechHandler, TextToSpeechStreamHandler, UploadAttachmentHandler,
};
use crate::application::{AttachmentResolver, ConversationGate};
use crate::config::{AppConfig, ServerConfig};
use crate::ports::{
    CompletionProvider, ConversationRepository, FileStore, MessageStore, ObjectStorage,
    QuotaLedger, SessionValidator, SpeechProvider,
};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Everything the HTTP layer needs, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub conversations: ConversationHandlers,
    pub media: MediaHandlers,
    pub account: AccountHandlers,
    pub auth: AuthState,
}

/// Port implementations the handlers are built from.
#[derive(Clone)]
pub struct Services {
    pub conversations: Arc<dyn ConversationRepository>,
    pub messages: Arc<dyn MessageStore>,
    pub quota: Arc<dyn QuotaLedger>,
    pub provider: Arc<dyn CompletionProvider>,
    pub speech: Arc<dyn SpeechProvider>,
    pub storage: Arc<dyn ObjectStorage>,
    pub files: Arc<dyn FileStore>,
    pub sessions: Arc<dyn SessionValidator>,
}

impl AppState {
    /// Wires every handler over `services`.
    pub fn new(services: Services, config: &AppConfig) -> Self {
        let Services {
            conversations,
            messages,
            quota,
            provider,
            speech,
            storage,
            files,
            sessions,
        } = services;

        let resolver = AttachmentResolver::new(storage, config.storage.temp_url_ttl());
        let keys = ObjectKeys::new(config.storage.prefix.clone());

        let gate = ConversationGate::new(
            conversations.clone(),
            messages.clone(),
            quota.clone(),
            provider,
            resolver.clone(),
        );
        let conversation_handlers = ConversationHandlers::new(
            gate,
            Arc::new(CreateConversationHandler::new(
                conversations.clone(),
                config.llm.model.clone(),
            )),
            Arc::new(RenameConversationHandler::new(conversations.clone())),
            Arc::new(DeleteConversationHandler::new(conversations.clone())),
            Arc::new(ListConversationsHandler::new(conversations.clone())),
            Arc::new(GetHistoryHandler::new(
                conversations,
                messages.clone(),
                resolver.clone(),
            )),
        );

        let media = MediaHandlers::new(
            Arc::new(UploadAttachmentHandler::new(
                messages.clone(),
                resolver.clone(),
                files,
                keys.clone(),
            )),
            Arc::new(SpeechToTextHandler::new(
                quota.clone(),
                resolver,
                speech.clone(),
                keys,
            )),
            Arc::new(TextToSpeechHandler::new(
                messages.clone(),
                quota.clone(),
                speech.clone(),
            )),
            Arc::new(TextToSpeechStreamHandler::new(messages, quota.clone(), speech)),
        );

        Self {
            conversations: conversation_handlers,
            media,
            account: AccountHandlers::new(Arc::new(GetAccountHandler::new(quota))),
            auth: sessions,
        }
    }
}

/// Builds the full application router.
pub fn api_router(state: AppState, server: &ServerConfig) -> Router {
    let api = Router::new()
        .nest("/conversations", conversation_routes(state.conversations))
        .merge(media_routes(state.media))
        .merge(account_routes(state.account))
        .layer(middleware::from_fn_with_state(state.auth, auth_middleware));

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .nest_service(UPLOADS_ROUTE, ServeDir::new(&server.upload_dir))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(request_id))
                .layer(cors(&server.cors_origins_list()))
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(server.request_timeout())),
        )
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Explicit origins allow cookies; without any, every origin is allowed
/// for bearer-token clients only.
fn cors(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::RANGE]);

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter(|o| !o.is_empty())
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    if origins.is_empty() {
        base.allow_origin(Any)
    } else {
        base.allow_origin(AllowOrigin::list(origins))
            .allow_credentials(true)
    }
}

