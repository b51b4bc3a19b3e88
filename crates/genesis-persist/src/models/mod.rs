mod checkpoint;
mod conversation;

// Export database-agnostic models
pub use checkpoint::{Checkpoint, CheckpointSummary};
pub use conversation::{normalize_title, ConversationRecord, DEFAULT_TITLE, MAX_TITLE_CHARS};
