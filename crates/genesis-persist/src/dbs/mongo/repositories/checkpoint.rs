use bson::doc;
use futures::TryStreamExt;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, IndexModel};

use crate::dbs::mongo::models::MongoCheckpoint;
use crate::error::{PersistError, Result};

const DUPLICATE_KEY: i32 = 11000;

#[derive(Clone)]
pub struct MongoCheckpointRepository {
    collection: Collection<MongoCheckpoint>,
}

impl MongoCheckpointRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("checkpoints");
        Self { collection }
    }

    /// Unique `(thread_id, sequence)` index; serves both the latest-state
    /// lookup and rejection of concurrent writers
    pub async fn ensure_indexes(&self) -> Result<()> {
        let index = IndexModel::builder()
            .keys(doc! { "thread_id": 1, "sequence": -1 })
            .options(
                IndexOptions::builder()
                    .name("thread_sequence_unique".to_string())
                    .unique(true)
                    .build(),
            )
            .build();
        self.collection.create_index(index).await?;
        Ok(())
    }

    pub async fn insert(&self, checkpoint: &MongoCheckpoint) -> Result<()> {
        match self.collection.insert_one(checkpoint).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(PersistError::DuplicateCheckpoint {
                sequence: checkpoint.sequence,
            }),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_latest(&self, thread_id: &str) -> Result<Option<MongoCheckpoint>> {
        Ok(self
            .collection
            .find_one(doc! { "thread_id": thread_id })
            .sort(doc! { "sequence": -1 })
            .await?)
    }

    pub async fn find_one(&self, thread_id: &str, checkpoint_id: &str) -> Result<Option<MongoCheckpoint>> {
        Ok(self
            .collection
            .find_one(doc! { "_id": checkpoint_id, "thread_id": thread_id })
            .await?)
    }

    pub async fn list(&self, thread_id: &str, limit: i64) -> Result<Vec<MongoCheckpoint>> {
        let checkpoints = self
            .collection
            .find(doc! { "thread_id": thread_id })
            .sort(doc! { "sequence": -1 })
            .limit(limit)
            .await?
            .try_collect()
            .await?;
        Ok(checkpoints)
    }

    pub async fn delete_thread(&self, thread_id: &str) -> Result<u64> {
        let result = self
            .collection
            .delete_many(doc! { "thread_id": thread_id })
            .await?;
        Ok(result.deleted_count)
    }

    /// Delete everything older than the `keep_latest` newest checkpoints
    pub async fn delete_older_than_rank(&self, thread_id: &str, keep_latest: u64) -> Result<u64> {
        let boundary = self
            .collection
            .find_one(doc! { "thread_id": thread_id })
            .sort(doc! { "sequence": -1 })
            .skip(keep_latest)
            .await?;

        let Some(boundary) = boundary else {
            return Ok(0);
        };

        let result = self
            .collection
            .delete_many(doc! {
                "thread_id": thread_id,
                "sequence": { "$lte": boundary.sequence },
            })
            .await?;
        Ok(result.deleted_count)
    }
}

fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    matches!(
        error.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY
    )
}
