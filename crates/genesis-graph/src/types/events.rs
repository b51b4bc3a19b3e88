use genesis_llm::Message;
use serde::{Deserialize, Serialize};

use crate::error::ErrorCategory;

/// Event pushed to the caller while a run executes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputEvent {
    /// Fragment of the model response
    Token { content: String },

    /// Run finished and its checkpoint is durable
    Complete {
        message: Message,
        checkpoint_id: String,
    },

    /// Run ended in error; `checkpoint_id` is present when the turn was still
    /// recorded
    Error {
        category: ErrorCategory,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        checkpoint_id: Option<String>,
    },
}

impl OutputEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Token { .. } => "token",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Token { .. })
    }
}
