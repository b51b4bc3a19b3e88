use async_trait::async_trait;
use genesis_llm::Message;

use crate::error::ErrorCategory;
use crate::node::{Node, NodeContext, NodeKind};
use crate::types::{PipelineState, StateUpdate};

pub const EMPTY_INPUT_MESSAGE: &str = "Message content cannot be empty";

/// Turns `turn_input` into a user message, or fails the run on blank input
pub struct ValidateInputNode;

#[async_trait]
impl Node for ValidateInputNode {
    async fn execute(&self, state: &PipelineState, _ctx: &NodeContext) -> StateUpdate {
        let input = state.turn_input.as_deref().map(str::trim).unwrap_or_default();

        if input.is_empty() {
            return StateUpdate::new()
                .clear_turn_input()
                .fail(ErrorCategory::Validation, EMPTY_INPUT_MESSAGE);
        }

        StateUpdate::new()
            .append(Message::user(input))
            .clear_turn_input()
    }

    fn kind(&self) -> NodeKind {
        NodeKind::ValidateInput
    }
}
