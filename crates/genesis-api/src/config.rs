use config::{Config as ConfigLoader, ConfigError, Environment, File};
use genesis_graph::EngineConfig;
use genesis_llm::{ProviderConfig, ProviderType};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub storage: StorageConfig,
    pub llm: LlmConfig,
    pub engine: EngineSection,
    pub logging: LoggingConfig,

    // Secrets (from ENV only)
    #[serde(default)]
    pub mongodb_uri: String,
    #[serde(default)]
    pub mongodb_checkpoint_uri: String,
    #[serde(default)]
    pub openai_api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub enabled: bool,
    pub origins: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Mongodb,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub metadata: StoreSection,
    pub checkpoints: CheckpointSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSection {
    pub database: String,
    pub pool_size: u32,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckpointSection {
    pub database: String,
    pub pool_size: u32,
    pub timeout_ms: u64,
    /// Checkpoints kept per conversation; unset keeps all of them
    #[serde(default)]
    pub history_limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: ProviderType,
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    pub model_timeout_ms: u64,
    pub event_buffer: usize,
    pub max_pending_runs: usize,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Config {
    /// Load configuration from TOML files and environment variables
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. config/default.toml
    /// 2. config/{ENV}.toml (ENV defaults to `dev`)
    /// 3. `GENESIS_<SECTION>__<KEY>` environment variables,
    ///    e.g. `GENESIS_SERVER__PORT=8080` or `GENESIS_STORAGE__BACKEND=memory`
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "dev".to_string());

        let config = ConfigLoader::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix("GENESIS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut cfg: Config = config.try_deserialize()?;
        cfg.load_secrets()?;
        Ok(cfg)
    }

    /// Load config from a specific path (useful for testing)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = ConfigLoader::builder()
            .add_source(File::from(path.as_ref()))
            .build()?;
        config.try_deserialize()
    }

    fn load_secrets(&mut self) -> Result<(), ConfigError> {
        self.openai_api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();

        if self.storage.backend == StorageBackend::Mongodb {
            self.mongodb_uri = std::env::var("MONGODB_URI").map_err(|_| {
                ConfigError::Message("MONGODB_URI environment variable is required".to_string())
            })?;
            self.mongodb_checkpoint_uri = std::env::var("MONGODB_CHECKPOINT_URI")
                .unwrap_or_else(|_| self.mongodb_uri.clone());
        }

        Ok(())
    }

    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            provider: self.llm.provider,
            model: self.llm.model.clone(),
            api_key: self.openai_api_key.clone(),
            base_url: self.llm.base_url.clone(),
            temperature: self.llm.temperature,
            max_tokens: self.llm.max_tokens,
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        let mut engine = EngineConfig::new()
            .with_model_timeout(Duration::from_millis(self.engine.model_timeout_ms))
            .with_event_buffer(self.engine.event_buffer)
            .with_max_pending_runs(self.engine.max_pending_runs);

        if let Some(prompt) = self.engine.system_prompt.as_deref().filter(|p| !p.trim().is_empty()) {
            engine = engine.with_system_prompt(prompt);
        }
        if let Some(limit) = self.storage.checkpoints.history_limit {
            engine = engine.with_history_limit(limit);
        }

        engine
    }
}
