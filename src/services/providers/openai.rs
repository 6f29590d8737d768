//! OpenAI-compatible chat completions provider
//!
//! Works against any server exposing `POST {base_url}/chat/completions`
//! with bearer authentication.

use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::json;

use super::{ensure_success, require_key, GenerationProvider, ProviderError, TEMPERATURE};

#[derive(Clone)]
pub struct OpenAiProvider {
    http_client: HttpClient,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(
        api_key: Option<&str>,
        base_url: String,
        model: String,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            http_client: HttpClient::new(),
            api_key: require_key(api_key, "openai")?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }

    fn build_request_body(&self, prompt: &str) -> serde_json::Value {
        json!({
            "model": self.model,
            "temperature": TEMPERATURE,
            "messages": [
                {"role": "user", "content": prompt},
            ],
        })
    }

    fn parse_response(response: ChatResponse) -> Result<String, ProviderError> {
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| ProviderError::InvalidResponse("no message content".to_string()))
    }
}

#[async_trait::async_trait]
impl GenerationProvider for OpenAiProvider {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.build_request_body(prompt))
            .send()
            .await?;

        let response: ChatResponse = ensure_success(response).await?.json().await?;
        let content = Self::parse_response(response)?;

        tracing::info!(
            model = %self.model,
            content_length = content.len(),
            "Received OpenAI response"
        );

        Ok(content)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}
