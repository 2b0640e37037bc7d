//! chat-relay server entry point.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chat_relay::adapters::ai::{MockCompletionProvider, OpenAiCompatibleProvider};
use chat_relay::adapters::auth::JwtSessionValidator;
use chat_relay::adapters::http::{api_router, AppState, Services};
use chat_relay::adapters::in_memory::InMemoryStore;
use chat_relay::adapters::postgres::{
    PostgresConversationRepository, PostgresMessageStore, PostgresQuotaLedger,
};
use chat_relay::adapters::speech::DashscopeSpeechProvider;
use chat_relay::adapters::storage::{LocalFileStore, NoObjectStorage, S3ObjectStorage};
use chat_relay::config::AppConfig;
use chat_relay::ports::{
    CompletionProvider, ConversationRepository, MessageStore, ObjectStorage, QuotaLedger,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config);
    config.validate()?;

    tracing::info!(
        environment = ?config.server.environment,
        "Starting chat-relay on {}:{}",
        config.server.host,
        config.server.port
    );

    let (conversations, messages, quota) = persistence(&config).await?;

    let provider: Arc<dyn CompletionProvider> = match OpenAiCompatibleProvider::new(config.llm.clone()) {
        Ok(provider) => Arc::new(provider),
        Err(e) => {
            tracing::warn!(error = %e, "Completion provider unavailable, chat requests will fail");
            Arc::new(MockCompletionProvider::unconfigured())
        }
    };

    let storage: Arc<dyn ObjectStorage> = if config.storage.is_enabled() {
        Arc::new(S3ObjectStorage::from_config(&config.storage).await?)
    } else {
        tracing::info!("Object storage disabled, uploads are kept in {}", config.server.upload_dir);
        Arc::new(NoObjectStorage)
    };

    let services = Services {
        conversations,
        messages,
        quota,
        provider,
        speech: Arc::new(DashscopeSpeechProvider::new(config.speech.clone())?),
        storage,
        files: Arc::new(LocalFileStore::new(config.server.upload_dir.clone())),
        sessions: Arc::new(JwtSessionValidator::new(
            config.auth.jwt_secret(),
            config.auth.leeway_secs,
        )),
    };

    let app = api_router(AppState::new(services, &config), &config.server);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// JSON logs in production, human-readable otherwise. `RUST_LOG` wins over
/// the configured level.
fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.is_production() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

type Persistence = (
    Arc<dyn ConversationRepository>,
    Arc<dyn MessageStore>,
    Arc<dyn QuotaLedger>,
);

async fn persistence(config: &AppConfig) -> Result<Persistence, Box<dyn std::error::Error>> {
    let Some(url) = config.database.url() else {
        tracing::warn!("No database configured, using in-memory stores");
        let store = match &config.database.seed_user {
            Some(seed) => {
                tracing::info!(user_id = seed.id, username = %seed.username, "Seeding development user");
                InMemoryStore::new().with_seed_user(seed)
            }
            None => {
                tracing::warn!(
                    "No seed user configured, every send will be refused for quota; \
                     set CHAT_RELAY__DATABASE__SEED_USER__ID"
                );
                InMemoryStore::new()
            }
        };
        let store = Arc::new(store);
        return Ok((store.clone(), store.clone(), store));
    };

    let pool = config.database.pool_options().connect(url).await?;
    tracing::info!("Database connection established");

    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Migrations applied");
    }

    Ok((
        Arc::new(PostgresConversationRepository::new(pool.clone())),
        Arc::new(PostgresMessageStore::new(pool.clone())),
        Arc::new(PostgresQuotaLedger::new(pool)),
    ))
}
