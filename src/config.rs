use serde::Deserialize;
use std::{path::PathBuf, time::Duration};

/// Which LLM backend answers generation prompts
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
}

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// LLM backend used for suggestions and details
    #[serde(default = "default_llm_provider")]
    pub llm_provider: ProviderKind,

    pub openai_api_key: Option<String>,

    /// Base URL of an OpenAI-compatible chat completions API
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,

    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    pub anthropic_api_key: Option<String>,

    #[serde(default = "default_anthropic_model")]
    pub anthropic_model: String,

    /// Upper bound on a single provider call
    #[serde(default = "default_generation_timeout_secs")]
    pub generation_timeout_secs: u64,

    /// Attempts for foreground, detail and related generation
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Attempts per generation call made by the background queue fill
    #[serde(default = "default_refill_max_retries")]
    pub refill_max_retries: u32,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_rejection_capacity")]
    pub rejection_capacity: usize,

    /// YAML document holding the movie lists and preferences
    #[serde(default = "default_movies_path")]
    pub movies_path: PathBuf,

    /// Directory of per-title related-movie cache files
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    #[serde(default = "default_rejects_path")]
    pub rejects_path: PathBuf,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Pause between provider calls when backfilling descriptions
    #[serde(default = "default_backfill_delay_ms")]
    pub backfill_delay_ms: u64,
}

fn default_llm_provider() -> ProviderKind {
    ProviderKind::OpenAi
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4-turbo-preview".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-7-sonnet-20250219".to_string()
}

fn default_generation_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    30
}

fn default_refill_max_retries() -> u32 {
    5
}

fn default_queue_capacity() -> usize {
    5
}

fn default_rejection_capacity() -> usize {
    50
}

fn default_movies_path() -> PathBuf {
    PathBuf::from("movies.yaml")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache/recommendations")
}

fn default_rejects_path() -> PathBuf {
    PathBuf::from("cache/recent_rejects.json")
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_backfill_delay_ms() -> u64 {
    1000
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(std::env::vars())
    }

    /// Load configuration from explicit key/value pairs
    pub fn from_vars<I>(vars: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::from_iter::<_, Config>(vars)
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
