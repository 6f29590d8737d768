//! Anthropic Messages API provider

use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::json;

use super::{ensure_success, require_key, GenerationProvider, ProviderError, TEMPERATURE};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 500;

#[derive(Clone)]
pub struct AnthropicProvider {
    http_client: HttpClient,
    api_key: String,
    model: String,
}

impl AnthropicProvider {
    pub fn new(api_key: Option<&str>, model: String) -> Result<Self, ProviderError> {
        Ok(Self {
            http_client: HttpClient::new(),
            api_key: require_key(api_key, "anthropic")?,
            model,
        })
    }

    fn build_request_body(&self, prompt: &str) -> serde_json::Value {
        json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "temperature": TEMPERATURE,
            "messages": [
                {"role": "user", "content": prompt},
            ],
        })
    }

    fn parse_response(response: MessagesResponse) -> Result<String, ProviderError> {
        response
            .content
            .into_iter()
            .find(|block| block.block_type == "text")
            .and_then(|block| block.text)
            .map(|text| text.trim().to_string())
            .ok_or_else(|| ProviderError::InvalidResponse("no text content block".to_string()))
    }
}

#[async_trait::async_trait]
impl GenerationProvider for AnthropicProvider {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let response = self
            .http_client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&self.build_request_body(prompt))
            .send()
            .await?;

        let response: MessagesResponse = ensure_success(response).await?.json().await?;
        let content = Self::parse_response(response)?;

        tracing::info!(
            model = %self.model,
            content_length = content.len(),
            "Received Anthropic response"
        );

        Ok(content)
    }

    fn name(&self) -> &'static str {
        "anthropic"
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}
