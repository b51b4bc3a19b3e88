use genesis_llm::CapabilityError;
use genesis_persist::PersistError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::node::NodeKind;

/// Failure taxonomy shared by pipeline state, events and errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    Capability,
    Authorization,
    Persistence,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Capability => "capability",
            Self::Authorization => "authorization",
            Self::Persistence => "persistence",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline definition rejected at compile time
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Pipeline has no entry node")]
    MissingEntry,

    #[error("Node {0} registered twice")]
    DuplicateNode(NodeKind),

    #[error("Node {0} is referenced but not registered")]
    UnknownNode(NodeKind),

    #[error("Node {0} has no outgoing edge")]
    MissingEdge(NodeKind),

    #[error("Cycle detected through node {0}")]
    Cycle(NodeKind),

    #[error("Node {0} is unreachable from the entry node")]
    Unreachable(NodeKind),

    #[error("{0} is required")]
    MissingComponent(&'static str),
}

/// Authorization Gate denial
///
/// Display strings are generic on purpose: they reach clients and must not
/// reveal whether or to whom a thread belongs.
#[derive(Error, Debug)]
pub enum AccessError {
    #[error("Conversation not found")]
    NotFound,

    #[error("Access denied")]
    Forbidden,

    #[error("Conversation lookup failed")]
    Persistence(#[source] PersistError),
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("{0}")]
    Validation(String),

    #[error("Model capability failed: {0}")]
    Capability(#[from] CapabilityError),

    #[error("Persistence failed: {0}")]
    Persistence(PersistError),

    #[error("Pipeline state serialization failed: {0}")]
    CorruptState(#[from] serde_json::Error),

    #[error("Too many pending runs for this conversation")]
    Busy,

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Engine worker stopped before replying")]
    Shutdown,
}

impl From<PersistError> for EngineError {
    fn from(err: PersistError) -> Self {
        match err {
            PersistError::InvalidTitle(msg) => Self::Validation(msg),
            other => Self::Persistence(other),
        }
    }
}

impl EngineError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Access(AccessError::Persistence(_)) => ErrorCategory::Persistence,
            Self::Access(_) => ErrorCategory::Authorization,
            Self::Validation(_) | Self::Busy => ErrorCategory::Validation,
            Self::Capability(_) => ErrorCategory::Capability,
            Self::Persistence(_) | Self::CorruptState(_) | Self::Pipeline(_) | Self::Shutdown => {
                ErrorCategory::Persistence
            }
        }
    }

    /// Message safe to show to a client
    pub fn public_message(&self) -> String {
        match self {
            Self::Access(e) => e.to_string(),
            Self::Validation(msg) => msg.clone(),
            Self::Busy => self.to_string(),
            Self::Capability(_) => "The model failed to respond".to_string(),
            Self::Persistence(_) | Self::CorruptState(_) | Self::Pipeline(_) | Self::Shutdown => {
                "Conversation state is unavailable; the message may not have been saved".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
