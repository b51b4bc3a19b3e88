use async_trait::async_trait;
use futures::StreamExt;
use genesis_llm::{CapabilityError, Message, ModelCapability};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};

use crate::error::ErrorCategory;
use crate::node::{Node, NodeContext, NodeKind};
use crate::types::{OutputEvent, PipelineState, StateUpdate};

/// The only node that talks to the model
///
/// Streams fragments to the caller when the capability supports it. The whole
/// call, stream included, is bounded by `timeout`.
pub struct InvokeModelNode {
    capability: Arc<dyn ModelCapability>,
    timeout: Duration,
    system_prompt: Option<String>,
}

impl InvokeModelNode {
    pub fn new(capability: Arc<dyn ModelCapability>, timeout: Duration) -> Self {
        Self {
            capability,
            timeout,
            system_prompt: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt.filter(|p| !p.trim().is_empty());
        self
    }

    fn model_input(&self, state: &PipelineState) -> Vec<Message> {
        let mut messages = Vec::with_capacity(state.message_history.len() + 1);
        if let Some(prompt) = &self.system_prompt {
            messages.push(Message::system(prompt.clone()));
        }
        messages.extend(state.message_history.iter().cloned());
        messages
    }

    async fn call(&self, messages: &[Message], ctx: &NodeContext) -> Result<String, CapabilityError> {
        let deadline = Instant::now() + self.timeout;
        let timed_out = || CapabilityError::Timeout(self.timeout.as_millis() as u64);

        if !self.capability.supports_streaming() {
            return timeout_at(deadline, self.capability.generate(messages))
                .await
                .map_err(|_| timed_out())?;
        }

        let mut stream = timeout_at(deadline, self.capability.stream(messages))
            .await
            .map_err(|_| timed_out())??;

        let mut output = String::new();
        while let Some(item) = timeout_at(deadline, stream.next()).await.map_err(|_| timed_out())? {
            let fragment = item?;
            if fragment.is_empty() {
                continue;
            }
            output.push_str(&fragment);
            ctx.emit(OutputEvent::Token { content: fragment }).await;
        }

        Ok(output)
    }
}

#[async_trait]
impl Node for InvokeModelNode {
    async fn execute(&self, state: &PipelineState, ctx: &NodeContext) -> StateUpdate {
        let messages = self.model_input(state);

        match self.call(&messages, ctx).await {
            Ok(output) if output.trim().is_empty() => {
                tracing::warn!(run_id = %ctx.run_id, model = %self.capability.model_name(), "model returned an empty response");
                StateUpdate::new().fail(ErrorCategory::Capability, "The model returned an empty response")
            }
            Ok(output) => StateUpdate::new().pending_output(output),
            Err(e) => {
                tracing::warn!(
                    run_id = %ctx.run_id,
                    model = %self.capability.model_name(),
                    error = %e,
                    "model call failed"
                );
                let message = match e {
                    CapabilityError::Timeout(_) => "The model did not respond in time",
                    CapabilityError::RateLimited(_) => "The model provider is rate limiting requests",
                    _ => "The model failed to respond",
                };
                StateUpdate::new().fail(ErrorCategory::Capability, message)
            }
        }
    }

    fn kind(&self) -> NodeKind {
        NodeKind::InvokeModel
    }
}
