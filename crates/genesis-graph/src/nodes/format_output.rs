use async_trait::async_trait;
use genesis_llm::Message;

use crate::error::ErrorCategory;
use crate::node::{Node, NodeContext, NodeKind};
use crate::types::{PipelineState, StateUpdate};

/// Moves `pending_output` into the history as an assistant message
pub struct FormatOutputNode;

#[async_trait]
impl Node for FormatOutputNode {
    async fn execute(&self, state: &PipelineState, _ctx: &NodeContext) -> StateUpdate {
        match state.pending_output.as_deref() {
            Some(text) if !text.trim().is_empty() => StateUpdate::new()
                .append(Message::assistant(text))
                .clear_pending_output(),
            _ => StateUpdate::new()
                .clear_pending_output()
                .fail(ErrorCategory::Capability, "No model output to format"),
        }
    }

    fn kind(&self) -> NodeKind {
        NodeKind::FormatOutput
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ThreadContext;
    use genesis_llm::Role;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_pending_output_becomes_assistant_message() {
        let mut state = PipelineState::new(ThreadContext {
            conversation_id: "c1".to_string(),
            owner_id: "alice".to_string(),
        });
        state.pending_output = Some("    indented code\n".to_string());
        let (events, _rx) = mpsc::channel(1);
        let ctx = NodeContext { run_id: "r1".to_string(), events };

        let update = FormatOutputNode.execute(&state, &ctx).await;
        assert_eq!(update.messages.len(), 1);
        assert_eq!(update.messages[0].role, Role::Assistant);
        assert_eq!(update.messages[0].content, "    indented code\n");
        assert_eq!(update.pending_output, Some(None));

        state.pending_output = Some(" \n\t".to_string());
        let update = FormatOutputNode.execute(&state, &ctx).await;
        assert!(update.messages.is_empty());
        assert!(update.failure.is_some());

        state.pending_output = None;
        let update = FormatOutputNode.execute(&state, &ctx).await;
        assert!(update.failure.is_some());
    }
}
