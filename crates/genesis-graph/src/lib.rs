pub mod auth;
pub mod builder;
pub mod engine;
pub mod error;
pub mod graph;
pub mod node;
pub mod nodes;
pub mod reducer;
pub mod router;
pub mod service;
pub mod types;

pub use auth::{AccessGrant, AuthorizationGate};
pub use builder::{EngineBuilder, PipelineBuilder};
pub use engine::{Engine, RunCompletion, RunHandle, RunReport, StateSnapshot};
pub use error::{AccessError, EngineError, ErrorCategory, PipelineError, Result};
pub use graph::CompiledPipeline;
pub use node::{EventSender, Node, NodeContext, NodeKind};
pub use reducer::merge_messages;
pub use router::{Edge, FailureRouter, NextNode, Router};
pub use service::ConversationService;
pub use types::{EngineConfig, Failure, OutputEvent, PipelineState, StateUpdate, ThreadContext};
