use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound on one model call, streaming included
    pub model_timeout: Duration,
    /// Capacity of each run's event channel
    pub event_buffer: usize,
    /// Queued plus in-flight runs allowed per thread
    pub max_pending_runs: usize,
    /// Prepended to the model input, never persisted
    pub system_prompt: Option<String>,
    /// Checkpoints kept per thread after each commit; `None` keeps all
    pub history_limit: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model_timeout: Duration::from_secs(120),
            event_buffer: 1000,
            max_pending_runs: 8,
            system_prompt: None,
            history_limit: None,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }

    pub fn with_event_buffer(mut self, size: usize) -> Self {
        self.event_buffer = size.max(1);
        self
    }

    pub fn with_max_pending_runs(mut self, max: usize) -> Self {
        self.max_pending_runs = max.max(1);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit.max(1));
        self
    }
}
