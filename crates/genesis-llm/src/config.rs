// Configuration layer for provider-agnostic capability creation

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{CapabilityError, Result};
use crate::openai::OpenAIClient;
use crate::traits::ModelCapability;

pub const OLLAMA_API_BASE: &str = "http://localhost:11434/v1";

/// Type of model provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    #[default]
    OpenAI,
    Ollama,
}

/// Complete provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub provider: ProviderType,
    pub model: String,
    /// Secret; never read from config files
    #[serde(default, skip_serializing)]
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ProviderConfig {
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: ProviderType::OpenAI,
            model: model.into(),
            api_key: api_key.into(),
            base_url: None,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Local Ollama server through its OpenAI-compatible endpoint
    pub fn ollama(model: impl Into<String>) -> Self {
        Self {
            provider: ProviderType::Ollama,
            model: model.into(),
            api_key: String::new(),
            base_url: None,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Base URL actually used for requests
    pub fn resolved_base_url(&self) -> &str {
        match (&self.base_url, self.provider) {
            (Some(url), _) => url.as_str(),
            (None, ProviderType::OpenAI) => crate::openai::OPENAI_API_BASE,
            (None, ProviderType::Ollama) => OLLAMA_API_BASE,
        }
    }
}

/// Factory for creating model capabilities from configuration
pub struct ClientFactory;

impl ClientFactory {
    pub fn create_capability(config: ProviderConfig) -> Result<Arc<dyn ModelCapability>> {
        if config.model.trim().is_empty() {
            return Err(CapabilityError::Config("model name is required".to_string()));
        }
        if config.provider == ProviderType::OpenAI && config.api_key.is_empty() {
            return Err(CapabilityError::Config(
                "OPENAI_API_KEY is required for the openai provider".to_string(),
            ));
        }

        let base_url = config.resolved_base_url().to_string();
        let mut client = OpenAIClient::new(config.api_key, config.model)?.with_base_url(base_url);
        if let Some(temperature) = config.temperature {
            client = client.with_temperature(temperature);
        }
        if let Some(max_tokens) = config.max_tokens {
            client = client.with_max_tokens(max_tokens);
        }

        tracing::info!(
            provider = ?config.provider,
            model = %client.model_name(),
            base_url = %client.base_url(),
            "model capability created"
        );

        Ok(Arc::new(client))
    }
}
