use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

use crate::types::{OutputEvent, PipelineState, StateUpdate};

pub type EventSender = mpsc::Sender<OutputEvent>;

/// Per-run context handed to every node
#[derive(Clone)]
pub struct NodeContext {
    pub run_id: String,
    pub events: EventSender,
}

impl NodeContext {
    /// Push an event; a disconnected receiver is ignored so the run still
    /// reaches its checkpoint
    pub async fn emit(&self, event: OutputEvent) {
        if self.events.send(event).await.is_err() {
            tracing::trace!(run_id = %self.run_id, "event receiver dropped");
        }
    }
}

/// A single processing step of the pipeline
///
/// Nodes read the state and describe their effect as a [`StateUpdate`]; the
/// engine applies it. Failures are reported through `StateUpdate::fail`.
#[async_trait]
pub trait Node: Send + Sync {
    async fn execute(&self, state: &PipelineState, ctx: &NodeContext) -> StateUpdate;

    fn kind(&self) -> NodeKind;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    ValidateInput,
    InvokeModel,
    FormatOutput,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidateInput => "validate_input",
            Self::InvokeModel => "invoke_model",
            Self::FormatOutput => "format_output",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
