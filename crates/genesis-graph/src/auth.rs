use genesis_persist::{ConversationRecord, MetadataStore};
use std::fmt;
use std::sync::Arc;

use crate::error::AccessError;
use crate::types::ThreadContext;

/// Proof that a principal owns a conversation
///
/// Only [`AuthorizationGate::authorize`] can produce one, and every engine
/// operation touching execution state requires it.
#[derive(Clone)]
pub struct AccessGrant {
    record: ConversationRecord,
    gate: AuthorizationGate,
}

impl fmt::Debug for AccessGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessGrant")
            .field("record", &self.record)
            .finish_non_exhaustive()
    }
}

impl AccessGrant {
    /// Repeat the ownership check against the metadata store
    ///
    /// The engine calls this when a queued run starts, so a conversation
    /// deleted while the run waited is never written to.
    pub async fn revalidate(&self) -> Result<(), AccessError> {
        self.gate.authorize(self.thread_id(), self.owner_id()).await.map(|_| ())
    }

    pub fn thread_id(&self) -> &str {
        &self.record.id
    }

    pub fn owner_id(&self) -> &str {
        &self.record.owner_id
    }

    pub fn record(&self) -> &ConversationRecord {
        &self.record
    }

    pub fn into_record(self) -> ConversationRecord {
        self.record
    }

    pub fn thread_context(&self) -> ThreadContext {
        ThreadContext {
            conversation_id: self.record.id.clone(),
            owner_id: self.record.owner_id.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AuthorizationGate {
    metadata: Arc<dyn MetadataStore>,
}

impl AuthorizationGate {
    pub fn new(metadata: Arc<dyn MetadataStore>) -> Self {
        Self { metadata }
    }

    /// Check that `owner_id` owns the conversation addressed by `thread_id`
    pub async fn authorize(&self, thread_id: &str, owner_id: &str) -> Result<AccessGrant, AccessError> {
        let record = match self.metadata.get_by_id(thread_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::warn!(thread_id, principal = owner_id, reason = "not_found", "access denied");
                return Err(AccessError::NotFound);
            }
            Err(e) => {
                tracing::error!(thread_id, principal = owner_id, error = %e, "conversation lookup failed");
                return Err(AccessError::Persistence(e));
            }
        };

        if !record.is_owned_by(owner_id) {
            tracing::warn!(thread_id, principal = owner_id, reason = "forbidden", "access denied");
            return Err(AccessError::Forbidden);
        }

        Ok(AccessGrant {
            record,
            gate: self.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genesis_persist::InMemoryMetadataStore;

    #[tokio::test]
    async fn test_owner_is_granted() {
        let store = Arc::new(InMemoryMetadataStore::new());
        let record = store
            .create(ConversationRecord::new("alice", None).unwrap())
            .await
            .unwrap();
        let gate = AuthorizationGate::new(store);

        let grant = gate.authorize(&record.id, "alice").await.unwrap();
        assert_eq!(grant.thread_id(), record.id);
        assert_eq!(grant.owner_id(), "alice");
        assert_eq!(grant.thread_context().conversation_id, record.id);
    }

    #[tokio::test]
    async fn test_denials() {
        let store = Arc::new(InMemoryMetadataStore::new());
        let record = store
            .create(ConversationRecord::new("bob", None).unwrap())
            .await
            .unwrap();
        let gate = AuthorizationGate::new(store);

        assert!(matches!(gate.authorize(&record.id, "alice").await, Err(AccessError::Forbidden)));
        assert!(matches!(gate.authorize("missing", "alice").await, Err(AccessError::NotFound)));
    }

    #[tokio::test]
    async fn test_revalidate_after_delete() {
        let store = Arc::new(InMemoryMetadataStore::new());
        let record = store
            .create(ConversationRecord::new("alice", None).unwrap())
            .await
            .unwrap();
        let gate = AuthorizationGate::new(store.clone());

        let grant = gate.authorize(&record.id, "alice").await.unwrap();
        assert!(grant.revalidate().await.is_ok());

        store.delete(&record.id).await.unwrap();
        assert!(matches!(grant.revalidate().await, Err(AccessError::NotFound)));
    }
}
