use async_trait::async_trait;
use mongodb::options::ClientOptions;
use mongodb::Client;
use std::time::Duration;

use crate::dbs::mongo::models::{MongoCheckpoint, MongoConversation};
use crate::dbs::mongo::repositories::{MongoCheckpointRepository, MongoConversationRepository};
use crate::error::{PersistError, Result};
use crate::models::{normalize_title, Checkpoint, ConversationRecord};
use crate::traits::{CheckpointStore, MetadataStore};

/// Connection settings for one store
///
/// Each store gets its own client so the two pools are sized and fail
/// independently.
#[derive(Debug, Clone)]
pub struct MongoStoreConfig {
    pub uri: String,
    pub database: String,
    pub pool_size: u32,
    pub timeout_ms: u64,
    pub app_name: Option<String>,
}

impl MongoStoreConfig {
    pub fn new(uri: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database: database.into(),
            pool_size: 10,
            timeout_ms: 5_000,
            app_name: None,
        }
    }

    pub fn with_pool_size(mut self, pool_size: u32) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }
}

/// Build a dedicated client (and pool) for one store
pub async fn connect(config: &MongoStoreConfig) -> Result<Client> {
    let mut options = ClientOptions::parse(&config.uri)
        .await
        .map_err(|e| PersistError::Connection(e.to_string()))?;

    let timeout = Duration::from_millis(config.timeout_ms);
    options.max_pool_size = Some(config.pool_size);
    options.server_selection_timeout = Some(timeout);
    options.connect_timeout = Some(timeout);
    options.app_name = config.app_name.clone();

    Client::with_options(options).map_err(|e| PersistError::Connection(e.to_string()))
}

pub struct MongoMetadataStore {
    repo: MongoConversationRepository,
}

impl MongoMetadataStore {
    pub async fn connect(config: &MongoStoreConfig) -> Result<Self> {
        let client = connect(config).await?;
        tracing::info!(database = %config.database, pool_size = config.pool_size, "metadata store connected");
        Ok(Self {
            repo: MongoConversationRepository::new(&client, &config.database),
        })
    }
}

#[async_trait]
impl MetadataStore for MongoMetadataStore {
    async fn create(&self, record: ConversationRecord) -> Result<ConversationRecord> {
        let doc: MongoConversation = record.clone().into();
        self.repo.insert(&doc).await?;
        Ok(record)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<ConversationRecord>> {
        Ok(self.repo.find_by_id(id).await?.map(Into::into))
    }

    async fn list_by_owner(&self, owner_id: &str, skip: u64, limit: i64) -> Result<Vec<ConversationRecord>> {
        let docs = self.repo.list_by_owner(owner_id, skip, limit).await?;
        Ok(docs.into_iter().map(Into::into).collect())
    }

    async fn update_title(&self, id: &str, title: &str) -> Result<ConversationRecord> {
        let title = normalize_title(title)?;
        if !self.repo.set_title(id, &title).await? {
            return Err(PersistError::ConversationNotFound(id.to_string()));
        }
        self.repo
            .find_by_id(id)
            .await?
            .map(Into::into)
            .ok_or_else(|| PersistError::ConversationNotFound(id.to_string()))
    }

    async fn touch(&self, id: &str) -> Result<()> {
        if !self.repo.touch(id).await? {
            return Err(PersistError::ConversationNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        self.repo.delete(id).await
    }
}

pub struct MongoCheckpointStore {
    repo: MongoCheckpointRepository,
}

impl MongoCheckpointStore {
    /// Connect and make sure the `(thread_id, sequence)` unique index exists
    pub async fn connect(config: &MongoStoreConfig) -> Result<Self> {
        let client = connect(config).await?;
        let repo = MongoCheckpointRepository::new(&client, &config.database);
        repo.ensure_indexes().await?;
        tracing::info!(database = %config.database, pool_size = config.pool_size, "checkpoint store connected");
        Ok(Self { repo })
    }
}

#[async_trait]
impl CheckpointStore for MongoCheckpointStore {
    async fn put(&self, checkpoint: Checkpoint) -> Result<()> {
        let doc: MongoCheckpoint = checkpoint.into();
        self.repo.insert(&doc).await
    }

    async fn get_latest(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        Ok(self.repo.find_latest(thread_id).await?.map(Into::into))
    }

    async fn get(&self, thread_id: &str, checkpoint_id: &str) -> Result<Option<Checkpoint>> {
        Ok(self.repo.find_one(thread_id, checkpoint_id).await?.map(Into::into))
    }

    async fn list(&self, thread_id: &str, limit: usize) -> Result<Vec<Checkpoint>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let docs = self.repo.list(thread_id, limit).await?;
        Ok(docs.into_iter().map(Into::into).collect())
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<u64> {
        self.repo.delete_thread(thread_id).await
    }

    async fn prune(&self, thread_id: &str, keep_latest: usize) -> Result<u64> {
        self.repo
            .delete_older_than_rank(thread_id, keep_latest as u64)
            .await
    }
}
