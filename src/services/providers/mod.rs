//! LLM provider abstraction
//!
//! The suggestion core sends a fully built prompt and receives opaque text,
//! expected to hold the documented JSON shape. Each backend maps its own
//! failures (network, auth, rate limits, malformed envelopes) into
//! [`ProviderError`], which the generator treats as a retryable attempt.

use std::sync::Arc;

use reqwest::StatusCode;

use crate::config::{Config, ProviderKind};

pub mod anthropic;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;

/// Sampling temperature shared by all backends
const TEMPERATURE: f32 = 0.7;

/// Errors from generation providers
#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    #[error("API key not configured for {0}")]
    MissingApiKey(&'static str),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("provider call timed out after {0}s")]
    Timeout(u64),

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

/// Trait for text-completion backends
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Sends a single-turn prompt and returns the model's text reply
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Builds the provider selected in configuration
pub fn build_provider(config: &Config) -> anyhow::Result<Arc<dyn GenerationProvider>> {
    let provider: Arc<dyn GenerationProvider> = match config.llm_provider {
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(
            config.openai_api_key.as_deref(),
            config.openai_base_url.clone(),
            config.openai_model.clone(),
        )?),
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(
            config.anthropic_api_key.as_deref(),
            config.anthropic_model.clone(),
        )?),
    };

    tracing::info!(provider = provider.name(), "Generation provider configured");

    Ok(provider)
}

/// Trims a configured key, treating blank values as absent
fn require_key(api_key: Option<&str>, provider: &'static str) -> Result<String, ProviderError> {
    api_key
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .ok_or(ProviderError::MissingApiKey(provider))
}

/// Turns a non-success response into [`ProviderError::Status`]
async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    tracing::error!(status = %status, body = %body, "Generation provider request failed");
    Err(ProviderError::Status { status, body })
}
