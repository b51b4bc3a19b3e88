use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Checkpoint, ConversationRecord};

/// MongoDB conversation document (`conversations` collection)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoConversation {
    #[serde(rename = "_id")]
    pub id: String,
    pub owner_id: String,
    pub title: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

/// MongoDB checkpoint document (`checkpoints` collection)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoCheckpoint {
    #[serde(rename = "_id")]
    pub checkpoint_id: String,
    pub thread_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_checkpoint_id: Option<String>,
    pub sequence: i64,
    pub run_id: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    pub state: serde_json::Value,
}

// Conversions between database-agnostic and MongoDB-specific models

impl From<ConversationRecord> for MongoConversation {
    fn from(record: ConversationRecord) -> Self {
        Self {
            id: record.id,
            owner_id: record.owner_id,
            title: record.title,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

impl From<MongoConversation> for ConversationRecord {
    fn from(doc: MongoConversation) -> Self {
        Self {
            id: doc.id,
            owner_id: doc.owner_id,
            title: doc.title,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}

impl From<Checkpoint> for MongoCheckpoint {
    fn from(cp: Checkpoint) -> Self {
        Self {
            checkpoint_id: cp.checkpoint_id,
            thread_id: cp.thread_id,
            parent_checkpoint_id: cp.parent_checkpoint_id,
            sequence: cp.sequence,
            run_id: cp.run_id,
            created_at: cp.created_at,
            state: cp.state,
        }
    }
}

impl From<MongoCheckpoint> for Checkpoint {
    fn from(doc: MongoCheckpoint) -> Self {
        Self {
            thread_id: doc.thread_id,
            checkpoint_id: doc.checkpoint_id,
            parent_checkpoint_id: doc.parent_checkpoint_id,
            sequence: doc.sequence,
            run_id: doc.run_id,
            created_at: doc.created_at,
            state: doc.state,
        }
    }
}
