use std::sync::Arc;
use std::time::Duration;

use crate::{
    error::{AppError, AppResult},
    models::{MovieDocument, Suggestion},
    services::{
        duplicates::DuplicateDetector,
        keywords,
        prompts::{self, DiscoveryPrompt},
        providers::{GenerationProvider, ProviderError},
    },
};

/// Errors parsing a provider reply into a [`Suggestion`]
#[derive(thiserror::Error, Debug)]
pub enum SuggestionParseError {
    #[error("response is not a valid suggestion object: {0}")]
    Json(#[from] serde_json::Error),

    #[error("suggestion has an empty title")]
    EmptyTitle,
}

/// Why a single attempt produced nothing usable
#[derive(thiserror::Error, Debug)]
enum AttemptError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Parse(#[from] SuggestionParseError),
}

/// Parameters of one generation call
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerationRequest<'a> {
    pub max_retries: u32,
    /// Movie to describe; set only for detail lookups
    pub target_title: Option<&'a str>,
    /// Movie the discovered suggestion should resemble
    pub anchor: Option<&'a str>,
    pub avoid_titles: &'a [String],
    /// Reject candidates that are duplicates or miss the preferred keywords
    pub reject_duplicates: bool,
    /// Titles currently waiting in the suggestion queue
    pub queue_titles: &'a [String],
}

impl<'a> GenerationRequest<'a> {
    /// Looks up the details of one known movie
    pub fn details(title: &'a str, max_retries: u32) -> Self {
        Self {
            max_retries,
            target_title: Some(title),
            ..Default::default()
        }
    }

    /// Picks a new movie that the user has not seen or rejected
    pub fn discovery(max_retries: u32, queue_titles: &'a [String]) -> Self {
        Self {
            max_retries,
            reject_duplicates: true,
            queue_titles,
            ..Default::default()
        }
    }

    /// Picks a movie resembling `title`, allowing ones the user already knows
    pub fn related(title: &'a str, avoid_titles: &'a [String], max_retries: u32) -> Self {
        Self {
            max_retries,
            anchor: Some(title),
            avoid_titles,
            ..Default::default()
        }
    }
}

/// Prompts the provider and validates what comes back
pub struct SuggestionGenerator {
    provider: Arc<dyn GenerationProvider>,
    detector: Arc<DuplicateDetector>,
    timeout: Duration,
}

impl SuggestionGenerator {
    pub fn new(
        provider: Arc<dyn GenerationProvider>,
        detector: Arc<DuplicateDetector>,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            detector,
            timeout,
        }
    }

    /// Generates a suggestion, retrying failed or rejected attempts
    ///
    /// Provider failures, timeouts, unparsable replies and validation
    /// rejections each consume one attempt. Fails with
    /// [`AppError::GenerationExhausted`] once `max_retries` are spent.
    pub async fn generate(
        &self,
        doc: &MovieDocument,
        request: GenerationRequest<'_>,
    ) -> AppResult<Suggestion> {
        let detail = request.target_title.is_some();
        let validate = !detail && request.reject_duplicates;
        let analysis = keywords::analyze(&doc.watched);
        let mut last_error = None;

        tracing::info!(
            detail,
            validate,
            target = ?request.target_title,
            anchor = ?request.anchor,
            max_retries = request.max_retries,
            "Starting suggestion generation"
        );

        for attempt in 1..=request.max_retries {
            let prompt = match request.target_title {
                Some(title) => prompts::detail_prompt(title),
                None => {
                    let recent_rejects = self.detector.rejections().titles().await;
                    DiscoveryPrompt {
                        doc,
                        analysis: &analysis,
                        anchor: request.anchor,
                        avoid_titles: request.avoid_titles,
                        recent_rejects: &recent_rejects,
                    }
                    .render(&mut rand::thread_rng())
                }
            };

            let suggestion = match self.attempt(&prompt).await {
                Ok(suggestion) => suggestion,
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        max_retries = request.max_retries,
                        error = %e,
                        "Generation attempt failed"
                    );
                    last_error = Some(e.to_string());
                    continue;
                }
            };

            tracing::info!(attempt, title = %suggestion.title, "Provider suggested movie");

            if validate {
                if let Some(reason) = self.rejection_reason(&suggestion, doc, &request).await {
                    tracing::warn!(
                        attempt,
                        title = %suggestion.title,
                        reason = %reason,
                        "Rejected suggestion"
                    );
                    last_error = Some(reason);
                    continue;
                }
            }

            tracing::info!(title = %suggestion.title, attempt, "Suggestion generation succeeded");
            return Ok(suggestion);
        }

        tracing::error!(
            max_retries = request.max_retries,
            last_error = ?last_error,
            "Failed to generate suggestion after max retries"
        );

        Err(AppError::GenerationExhausted {
            attempts: request.max_retries,
            last_error,
        })
    }

    /// One provider round trip, bounded by the configured timeout
    async fn attempt(&self, prompt: &str) -> Result<Suggestion, AttemptError> {
        tracing::info!(prompt_length = prompt.len(), "Sending generation request");
        tracing::debug!(prompt = %prompt, "Generation prompt");

        let text = tokio::time::timeout(self.timeout, self.provider.complete(prompt))
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout.as_secs()))??;

        parse_suggestion(&text).map_err(|e| {
            tracing::error!(error = %e, response = %text, "Could not parse provider response");
            AttemptError::from(e)
        })
    }

    /// Duplicate and preferred-keyword checks; `Some(reason)` means reject
    async fn rejection_reason(
        &self,
        suggestion: &Suggestion,
        doc: &MovieDocument,
        request: &GenerationRequest<'_>,
    ) -> Option<String> {
        let check = self
            .detector
            .check(&suggestion.title, doc, request.queue_titles)
            .await;
        if check.is_duplicate {
            return check.reason;
        }

        let preferred = &doc.preferences.keywords;
        if !preferred.is_empty() && !keywords::matches_any(&suggestion.keywords, preferred) {
            let reason = "does not match any preferred keyword";
            self.detector.reject(&suggestion.title, reason).await;
            return Some(reason.to_string());
        }

        None
    }
}

/// Validates a provider reply against the suggestion schema
pub fn parse_suggestion(text: &str) -> Result<Suggestion, SuggestionParseError> {
    let mut suggestion: Suggestion = serde_json::from_str(prompts::strip_code_fence(text))?;

    suggestion.title = suggestion.title.trim().to_string();
    if suggestion.title.is_empty() {
        return Err(SuggestionParseError::EmptyTitle);
    }
    suggestion.keywords = suggestion
        .keywords
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect();

    Ok(suggestion)
}
