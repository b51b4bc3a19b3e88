// In-memory store backends

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{PersistError, Result};
use crate::models::{normalize_title, Checkpoint, ConversationRecord};
use crate::traits::{CheckpointStore, MetadataStore};

#[derive(Clone, Default)]
pub struct InMemoryMetadataStore {
    records: Arc<RwLock<HashMap<String, ConversationRecord>>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn create(&self, record: ConversationRecord) -> Result<ConversationRecord> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Err(PersistError::Internal(format!("duplicate conversation id {}", record.id)));
        }
        records.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<ConversationRecord>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn list_by_owner(&self, owner_id: &str, skip: u64, limit: i64) -> Result<Vec<ConversationRecord>> {
        let records = self.records.read().await;
        let mut owned: Vec<ConversationRecord> = records
            .values()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        Ok(owned
            .into_iter()
            .skip(skip as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn update_title(&self, id: &str, title: &str) -> Result<ConversationRecord> {
        let title = normalize_title(title)?;
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| PersistError::ConversationNotFound(id.to_string()))?;
        record.title = title;
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn touch(&self, id: &str) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| PersistError::ConversationNotFound(id.to_string()))?;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.records.write().await.remove(id).is_some())
    }
}

/// Checkpoints per thread, kept in ascending sequence order
#[derive(Clone, Default)]
pub struct InMemoryCheckpointStore {
    threads: Arc<RwLock<HashMap<String, Vec<Checkpoint>>>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn put(&self, checkpoint: Checkpoint) -> Result<()> {
        let mut threads = self.threads.write().await;
        let chain = threads.entry(checkpoint.thread_id.clone()).or_default();

        match chain.binary_search_by_key(&checkpoint.sequence, |c| c.sequence) {
            Ok(_) => Err(PersistError::DuplicateCheckpoint {
                sequence: checkpoint.sequence,
            }),
            Err(pos) => {
                chain.insert(pos, checkpoint);
                Ok(())
            }
        }
    }

    async fn get_latest(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        Ok(self
            .threads
            .read()
            .await
            .get(thread_id)
            .and_then(|chain| chain.last().cloned()))
    }

    async fn get(&self, thread_id: &str, checkpoint_id: &str) -> Result<Option<Checkpoint>> {
        Ok(self.threads.read().await.get(thread_id).and_then(|chain| {
            chain
                .iter()
                .find(|c| c.checkpoint_id == checkpoint_id)
                .cloned()
        }))
    }

    async fn list(&self, thread_id: &str, limit: usize) -> Result<Vec<Checkpoint>> {
        Ok(self
            .threads
            .read()
            .await
            .get(thread_id)
            .map(|chain| chain.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<u64> {
        Ok(self
            .threads
            .write()
            .await
            .remove(thread_id)
            .map(|chain| chain.len() as u64)
            .unwrap_or(0))
    }

    async fn prune(&self, thread_id: &str, keep_latest: usize) -> Result<u64> {
        let mut threads = self.threads.write().await;
        let Some(chain) = threads.get_mut(thread_id) else {
            return Ok(0);
        };
        let excess = chain.len().saturating_sub(keep_latest);
        chain.drain(..excess);
        Ok(excess as u64)
    }
}
