use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Immutable snapshot of pipeline state at the end of one run
///
/// Checkpoints of a thread form a chain: each one records its parent and
/// carries `sequence = parent.sequence + 1`. The sequence defines the total
/// order; `created_at` is kept strictly increasing along the chain as well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub thread_id: String,
    pub checkpoint_id: String,
    pub parent_checkpoint_id: Option<String>,
    pub sequence: i64,
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    /// Serialized pipeline state
    pub state: serde_json::Value,
}

impl Checkpoint {
    /// Build the checkpoint that follows `parent` (or the first one of a thread)
    pub fn next(
        thread_id: impl Into<String>,
        parent: Option<&Checkpoint>,
        run_id: impl Into<String>,
        state: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        let (parent_checkpoint_id, sequence, created_at) = match parent {
            Some(p) => {
                let floor = p.created_at + Duration::milliseconds(1);
                (Some(p.checkpoint_id.clone()), p.sequence + 1, now.max(floor))
            }
            None => (None, 1, now),
        };

        Self {
            thread_id: thread_id.into(),
            checkpoint_id: uuid::Uuid::new_v4().to_string(),
            parent_checkpoint_id,
            sequence,
            run_id: run_id.into(),
            created_at,
            state,
        }
    }
}

/// Checkpoint without its state payload, for history listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointSummary {
    pub checkpoint_id: String,
    pub parent_checkpoint_id: Option<String>,
    pub sequence: i64,
    pub run_id: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Checkpoint> for CheckpointSummary {
    fn from(c: &Checkpoint) -> Self {
        Self {
            checkpoint_id: c.checkpoint_id.clone(),
            parent_checkpoint_id: c.parent_checkpoint_id.clone(),
            sequence: c.sequence,
            run_id: c.run_id.clone(),
            created_at: c.created_at,
        }
    }
}
