pub mod config;
pub mod events;
pub mod state;

pub use config::EngineConfig;
pub use events::OutputEvent;
pub use state::{Failure, PipelineState, StateUpdate, ThreadContext};
