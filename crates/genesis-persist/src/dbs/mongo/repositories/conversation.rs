use bson::doc;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{Client, Collection};

use crate::dbs::mongo::models::MongoConversation;
use crate::error::Result;

#[derive(Clone)]
pub struct MongoConversationRepository {
    collection: Collection<MongoConversation>,
}

impl MongoConversationRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("conversations");
        Self { collection }
    }

    pub async fn insert(&self, conversation: &MongoConversation) -> Result<()> {
        self.collection.insert_one(conversation).await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<MongoConversation>> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    /// List conversations for an owner, most recently updated first
    pub async fn list_by_owner(&self, owner_id: &str, skip: u64, limit: i64) -> Result<Vec<MongoConversation>> {
        let conversations = self
            .collection
            .find(doc! { "owner_id": owner_id })
            .sort(doc! { "updated_at": -1 })
            .skip(skip)
            .limit(limit)
            .await?
            .try_collect()
            .await?;
        Ok(conversations)
    }

    /// Returns whether a document matched
    pub async fn set_title(&self, id: &str, title: &str) -> Result<bool> {
        let now = bson::DateTime::from_chrono(Utc::now());
        let update = doc! { "$set": { "title": title, "updated_at": now } };
        let result = self.collection.update_one(doc! { "_id": id }, update).await?;
        Ok(result.matched_count > 0)
    }

    pub async fn touch(&self, id: &str) -> Result<bool> {
        let now = bson::DateTime::from_chrono(Utc::now());
        let update = doc! { "$set": { "updated_at": now } };
        let result = self.collection.update_one(doc! { "_id": id }, update).await?;
        Ok(result.matched_count > 0)
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = self.collection.delete_one(doc! { "_id": id }).await?;
        Ok(result.deleted_count > 0)
    }
}
