pub mod types;
pub mod error;
pub mod traits;
pub mod streaming;
pub mod openai;
pub mod config;

pub use error::{CapabilityError, Result};
pub use traits::{ModelCapability, TokenStream};
pub use streaming::{parse_chat_sse_stream, ChatStreamChunk};
pub use openai::OpenAIClient;
pub use config::{ClientFactory, ProviderConfig, ProviderType};
pub use types::{Message, Role};
