use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Checkpoint, ConversationRecord};

/// Conversation metadata operations
///
/// Implementations own their connection pool; failures here must not affect
/// the checkpoint store.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Persist a freshly built record
    async fn create(&self, record: ConversationRecord) -> Result<ConversationRecord>;

    async fn get_by_id(&self, id: &str) -> Result<Option<ConversationRecord>>;

    /// Records of one owner, most recently updated first
    async fn list_by_owner(&self, owner_id: &str, skip: u64, limit: i64) -> Result<Vec<ConversationRecord>>;

    /// Replace the title and bump `updated_at`
    async fn update_title(&self, id: &str, title: &str) -> Result<ConversationRecord>;

    /// Bump `updated_at`
    async fn touch(&self, id: &str) -> Result<()>;

    /// Returns whether a record was removed
    async fn delete(&self, id: &str) -> Result<bool>;
}

/// Execution-state store keyed by thread identifier
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Atomically persist one checkpoint; a second checkpoint with the same
    /// `(thread_id, sequence)` is rejected with `DuplicateCheckpoint`
    async fn put(&self, checkpoint: Checkpoint) -> Result<()>;

    /// Most recent checkpoint of a thread
    async fn get_latest(&self, thread_id: &str) -> Result<Option<Checkpoint>>;

    /// Point-in-time read of a specific checkpoint
    async fn get(&self, thread_id: &str, checkpoint_id: &str) -> Result<Option<Checkpoint>>;

    /// Newest first
    async fn list(&self, thread_id: &str, limit: usize) -> Result<Vec<Checkpoint>>;

    /// Remove every checkpoint of a thread, returning how many were removed
    async fn delete_thread(&self, thread_id: &str) -> Result<u64>;

    /// Keep only the `keep_latest` newest checkpoints, returning how many were removed
    async fn prune(&self, thread_id: &str, keep_latest: usize) -> Result<u64>;
}
