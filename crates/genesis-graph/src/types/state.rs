use genesis_llm::Message;
use genesis_persist::Checkpoint;
use serde::{Deserialize, Serialize};

use crate::error::ErrorCategory;
use crate::reducer::merge_messages;

/// Conversation the run belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadContext {
    pub conversation_id: String,
    pub owner_id: String,
}

/// Error marker; once set, remaining nodes are skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub category: ErrorCategory,
    pub message: String,
}

impl Failure {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

/// Record threaded through one pipeline run and persisted in its checkpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    #[serde(default)]
    pub message_history: Vec<Message>,
    pub thread_context: ThreadContext,
    #[serde(default)]
    pub turn_input: Option<String>,
    #[serde(default)]
    pub pending_output: Option<String>,
    #[serde(default)]
    pub failure: Option<Failure>,
}

impl PipelineState {
    pub fn new(thread_context: ThreadContext) -> Self {
        Self {
            message_history: Vec::new(),
            thread_context,
            turn_input: None,
            pending_output: None,
            failure: None,
        }
    }

    /// Rebuild working state from the latest checkpoint, or start empty
    ///
    /// Only `message_history` carries over; per-run fields start cleared.
    pub fn resume(
        snapshot: Option<&Checkpoint>,
        thread_context: ThreadContext,
    ) -> serde_json::Result<Self> {
        let message_history = match snapshot {
            Some(checkpoint) => {
                let stored: PipelineState = serde_json::from_value(checkpoint.state.clone())?;
                stored.message_history
            }
            None => Vec::new(),
        };

        Ok(Self {
            message_history,
            ..Self::new(thread_context)
        })
    }

    pub fn from_snapshot(checkpoint: &Checkpoint) -> serde_json::Result<Self> {
        serde_json::from_value(checkpoint.state.clone())
    }

    pub fn to_snapshot(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    pub fn apply(&mut self, update: StateUpdate) {
        if !update.messages.is_empty() {
            let existing = std::mem::take(&mut self.message_history);
            self.message_history = merge_messages(existing, update.messages);
        }
        if let Some(turn_input) = update.turn_input {
            self.turn_input = turn_input;
        }
        if let Some(pending_output) = update.pending_output {
            self.pending_output = pending_output;
        }
        if update.failure.is_some() {
            self.failure = update.failure;
        }
    }
}

/// Partial update returned by a node
///
/// `None` leaves a field untouched; `Some(None)` clears it. Messages are
/// merged through the reducer rather than assigned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub messages: Vec<Message>,
    pub turn_input: Option<Option<String>>,
    pub pending_output: Option<Option<String>>,
    pub failure: Option<Failure>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn clear_turn_input(mut self) -> Self {
        self.turn_input = Some(None);
        self
    }

    pub fn pending_output(mut self, output: impl Into<String>) -> Self {
        self.pending_output = Some(Some(output.into()));
        self
    }

    pub fn clear_pending_output(mut self) -> Self {
        self.pending_output = Some(None);
        self
    }

    pub fn fail(mut self, category: ErrorCategory, message: impl Into<String>) -> Self {
        self.failure = Some(Failure::new(category, message));
        self
    }
}
