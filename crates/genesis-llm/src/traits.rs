use crate::error::Result;
use crate::types::Message;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Ordered sequence of text fragments produced by a streaming generation
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Text generation capability
///
/// Given an ordered, role-tagged history, produce either the complete reply or
/// the reply as a sequence of fragments. Both forms may fail with a
/// [`CapabilityError`](crate::CapabilityError).
#[async_trait]
pub trait ModelCapability: Send + Sync {
    /// Non-streaming completion
    async fn generate(&self, messages: &[Message]) -> Result<String>;

    /// Streaming completion
    async fn stream(&self, messages: &[Message]) -> Result<TokenStream>;

    /// Whether `stream` yields incremental fragments
    fn supports_streaming(&self) -> bool {
        true
    }

    fn model_name(&self) -> &str;
}
