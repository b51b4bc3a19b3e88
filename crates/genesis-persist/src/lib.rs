pub mod dbs;
pub mod error;
pub mod memory;
pub mod models;
pub mod traits;

pub use error::{PersistError, Result};
pub use memory::{InMemoryCheckpointStore, InMemoryMetadataStore};
pub use models::{Checkpoint, CheckpointSummary, ConversationRecord, DEFAULT_TITLE};
pub use traits::{CheckpointStore, MetadataStore};

#[cfg(feature = "mongodb")]
pub use dbs::mongo::{MongoCheckpointStore, MongoMetadataStore, MongoStoreConfig};
