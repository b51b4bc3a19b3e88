// OpenAI-compatible chat completions adapter

use crate::error::{CapabilityError, Result};
use crate::streaming::parse_chat_sse_stream;
use crate::traits::{ModelCapability, TokenStream};
use crate::types::Message;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::Value;

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Chat completions client (HTTP direct, no SDK)
///
/// Works against any endpoint that speaks the OpenAI chat completions
/// protocol, including Ollama's `/v1` compatibility layer.
pub struct OpenAIClient {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

impl OpenAIClient {
    /// Create new client with API key and model
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if !api_key.is_empty() {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", api_key))
                    .map_err(|_| CapabilityError::Config("Invalid API key format".to_string()))?,
            );
        }

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http_client,
            base_url: OPENAI_API_BASE.to_string(),
            model: model.into(),
            temperature: None,
            max_tokens: None,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build chat completion request payload
    pub fn build_chat_request(&self, messages: &[Message], stream: bool) -> Value {
        let openai_messages: Vec<Value> = messages
            .iter()
            .map(|msg| {
                serde_json::json!({
                    "role": msg.role(),
                    "content": msg.content,
                })
            })
            .collect();

        let mut request = serde_json::json!({
            "model": self.model,
            "messages": openai_messages,
            "stream": stream,
        });

        if let Some(obj) = request.as_object_mut() {
            if let Some(temp) = self.temperature {
                obj.insert("temperature".to_string(), serde_json::json!(temp));
            }
            if let Some(max_tokens) = self.max_tokens {
                obj.insert("max_tokens".to_string(), serde_json::json!(max_tokens));
            }
        }

        request
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .http_client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    CapabilityError::Unavailable(e.to_string())
                } else {
                    CapabilityError::Transport(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CapabilityError::from_status(status.as_u16(), error_text));
        }

        Ok(response)
    }
}

#[async_trait]
impl ModelCapability for OpenAIClient {
    async fn generate(&self, messages: &[Message]) -> Result<String> {
        let body = self.build_chat_request(messages, false);
        tracing::debug!(model = %self.model, messages = messages.len(), "chat completion request");

        let response = self.post(&body).await?;
        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| CapabilityError::InvalidResponse(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CapabilityError::InvalidResponse("no choices in completion".to_string()))
    }

    async fn stream(&self, messages: &[Message]) -> Result<TokenStream> {
        let body = self.build_chat_request(messages, true);
        tracing::debug!(model = %self.model, messages = messages.len(), "streaming chat completion request");

        let response = self.post(&body).await?;
        Ok(parse_chat_sse_stream(response.bytes_stream()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_payload() {
        let client = OpenAIClient::new("sk-test", "gpt-4o")
            .unwrap()
            .with_temperature(0.2)
            .with_max_tokens(256);

        let messages = vec![Message::system("Be brief"), Message::user("Hello")];
        let body = client.build_chat_request(&messages, true);

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Hello");
        assert_eq!(body["max_tokens"], 256);
        assert!(body.get("temperature").is_some());
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = OpenAIClient::new("", "llama3")
            .unwrap()
            .with_base_url("http://localhost:11434/v1/");

        assert_eq!(client.base_url(), "http://localhost:11434/v1");
    }
}
