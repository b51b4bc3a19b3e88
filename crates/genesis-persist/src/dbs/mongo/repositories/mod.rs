pub mod checkpoint;
pub mod conversation;

pub use checkpoint::MongoCheckpointRepository;
pub use conversation::MongoConversationRepository;
