use genesis_llm::Message;
use genesis_persist::{CheckpointSummary, ConversationRecord, MetadataStore};
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::auth::AuthorizationGate;
use crate::engine::{Engine, RunHandle, StateSnapshot};
use crate::error::Result;

/// Conversation operations spanning the metadata and checkpoint stores
///
/// Creation writes metadata only; checkpoints appear with the first run.
/// Deletion purges checkpoints, then removes the record in the same queued
/// job; the record is kept if the purge fails.
#[derive(Clone)]
pub struct ConversationService {
    metadata: Arc<dyn MetadataStore>,
    gate: AuthorizationGate,
    engine: Engine,
}

impl ConversationService {
    pub fn new(metadata: Arc<dyn MetadataStore>, engine: Engine) -> Self {
        Self {
            gate: AuthorizationGate::new(Arc::clone(&metadata)),
            metadata,
            engine,
        }
    }

    pub fn gate(&self) -> &AuthorizationGate {
        &self.gate
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub async fn create(&self, owner_id: &str, title: Option<&str>) -> Result<ConversationRecord> {
        let record = ConversationRecord::new(owner_id, title)?;
        let record = self.metadata.create(record).await?;
        tracing::info!(thread_id = %record.id, owner_id, "conversation created");
        Ok(record)
    }

    pub async fn list(&self, owner_id: &str, skip: u64, limit: i64) -> Result<Vec<ConversationRecord>> {
        Ok(self.metadata.list_by_owner(owner_id, skip, limit).await?)
    }

    pub async fn get(&self, thread_id: &str, owner_id: &str) -> Result<ConversationRecord> {
        Ok(self.gate.authorize(thread_id, owner_id).await?.into_record())
    }

    pub async fn rename(&self, thread_id: &str, owner_id: &str, title: &str) -> Result<ConversationRecord> {
        let grant = self.gate.authorize(thread_id, owner_id).await?;
        Ok(self.metadata.update_title(grant.thread_id(), title).await?)
    }

    pub async fn delete(&self, thread_id: &str, owner_id: &str) -> Result<()> {
        let grant = self.gate.authorize(thread_id, owner_id).await?;

        // Metadata goes in the same queue slot as the purge, so a run queued
        // behind it fails revalidation instead of writing a new checkpoint
        let metadata = Arc::clone(&self.metadata);
        let id = grant.thread_id().to_string();
        let removed = self
            .engine
            .purge_then(&grant, async move {
                metadata.delete(&id).await?;
                Ok(())
            })
            .await
            .map_err(|e| {
                tracing::error!(thread_id, error = %e, "conversation delete failed");
                e
            })?;

        tracing::info!(thread_id, owner_id, checkpoints = removed, "conversation deleted");
        Ok(())
    }

    /// Authorize, then queue a turn; `updated_at` is bumped once the run commits
    pub async fn send_message(&self, thread_id: &str, owner_id: &str, content: impl Into<String>) -> Result<RunHandle> {
        let grant = self.gate.authorize(thread_id, owner_id).await?;
        let handle = self.engine.run(&grant, content)?;

        let run_id = handle.run_id.clone();
        let (events, completion) = handle.split();
        let (reply_tx, reply_rx) = oneshot::channel();
        let metadata = Arc::clone(&self.metadata);
        let thread_id = grant.thread_id().to_string();

        tokio::spawn(async move {
            let result = completion.wait().await;
            if result.is_ok() {
                if let Err(e) = metadata.touch(&thread_id).await {
                    tracing::warn!(thread_id = %thread_id, error = %e, "failed to bump conversation timestamp");
                }
            }
            let _ = reply_tx.send(result);
        });

        Ok(RunHandle::new(run_id, events, reply_rx))
    }

    pub async fn history(&self, thread_id: &str, owner_id: &str) -> Result<Vec<Message>> {
        let grant = self.gate.authorize(thread_id, owner_id).await?;
        self.engine.history(&grant).await
    }

    pub async fn checkpoints(&self, thread_id: &str, owner_id: &str, limit: usize) -> Result<Vec<CheckpointSummary>> {
        let grant = self.gate.authorize(thread_id, owner_id).await?;
        self.engine.checkpoint_history(&grant, limit).await
    }

    pub async fn checkpoint(&self, thread_id: &str, owner_id: &str, checkpoint_id: &str) -> Result<Option<StateSnapshot>> {
        let grant = self.gate.authorize(thread_id, owner_id).await?;
        self.engine.checkpoint_at(&grant, checkpoint_id).await
    }
}
