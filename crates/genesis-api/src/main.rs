use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use genesis_api::{
    build_router,
    config::{Config, StorageBackend},
    state::AppState,
};
use genesis_graph::{ConversationService, Engine};
use genesis_llm::ClientFactory;
use genesis_persist::{CheckpointStore, InMemoryCheckpointStore, InMemoryMetadataStore, MetadataStore};

type Stores = (Arc<dyn MetadataStore>, Arc<dyn CheckpointStore>);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::load().context("Failed to load configuration")?;

    init_logging(&config);

    tracing::info!("Starting Genesis API server");
    tracing::info!("Config loaded: {}:{}", config.server.host, config.server.port);

    let capability = ClientFactory::create_capability(config.provider_config())
        .context("Failed to create model capability")?;

    let (metadata, checkpoints) = build_stores(&config).await?;

    let engine = Engine::builder()
        .capability(capability)
        .checkpoints(checkpoints)
        .config(config.engine_config())
        .build()
        .context("Failed to compile conversation pipeline")?;

    let conversations = ConversationService::new(metadata, engine);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config, conversations));

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn build_stores(config: &Config) -> anyhow::Result<Stores> {
    match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; conversations are lost on restart");
            let metadata: Arc<dyn MetadataStore> = Arc::new(InMemoryMetadataStore::new());
            let checkpoints: Arc<dyn CheckpointStore> = Arc::new(InMemoryCheckpointStore::new());
            Ok((metadata, checkpoints))
        }
        StorageBackend::Mongodb => connect_mongodb(config).await,
    }
}

#[cfg(feature = "mongodb")]
async fn connect_mongodb(config: &Config) -> anyhow::Result<Stores> {
    use genesis_persist::{MongoCheckpointStore, MongoMetadataStore, MongoStoreConfig};

    let storage = &config.storage;

    // Separate clients keep the two connection pools isolated
    tracing::info!("Connecting to MongoDB metadata store");
    let metadata_config = MongoStoreConfig::new(&config.mongodb_uri, &storage.metadata.database)
        .with_pool_size(storage.metadata.pool_size)
        .with_timeout_ms(storage.metadata.timeout_ms)
        .with_app_name("genesis-metadata");
    let metadata: Arc<dyn MetadataStore> =
        Arc::new(MongoMetadataStore::connect(&metadata_config).await?);

    tracing::info!("Connecting to MongoDB checkpoint store");
    let checkpoint_config =
        MongoStoreConfig::new(&config.mongodb_checkpoint_uri, &storage.checkpoints.database)
            .with_pool_size(storage.checkpoints.pool_size)
            .with_timeout_ms(storage.checkpoints.timeout_ms)
            .with_app_name("genesis-checkpoints");
    let checkpoints: Arc<dyn CheckpointStore> =
        Arc::new(MongoCheckpointStore::connect(&checkpoint_config).await?);

    tracing::info!("MongoDB connected");
    Ok((metadata, checkpoints))
}

#[cfg(not(feature = "mongodb"))]
async fn connect_mongodb(_config: &Config) -> anyhow::Result<Stores> {
    anyhow::bail!("storage.backend = \"mongodb\" requires building with the `mongodb` feature")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.logging.format.as_str() {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }
}
