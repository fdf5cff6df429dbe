//! Summarization entry point
//!
//! [`Summarizer`] validates the request, resolves configuration from the
//! host, runs the recursive driver and shapes the reply.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use spacellama_context::estimate_tokens;
use spacellama_runtime::{InferenceProvider, OllamaProvider};
use tracing::{error, info, warn};

use crate::config::SummarizerConfig;
use crate::diagnostics::Diagnostics;
use crate::driver::RecursiveSummarizer;
use crate::error::{ErrorDetails, SummarizeError, SummarizeResult};
use crate::fact_check::{FactCheck, FactChecker};
use crate::host::HostEnvironment;
use crate::retry::RetryConfig;

/// Builds the inference provider for a resolved configuration.
pub trait ProviderFactory: Send + Sync {
    fn connect(&self, config: &SummarizerConfig) -> SummarizeResult<Arc<dyn InferenceProvider>>;
}

impl<F> ProviderFactory for F
where
    F: Fn(&SummarizerConfig) -> SummarizeResult<Arc<dyn InferenceProvider>> + Send + Sync,
{
    fn connect(&self, config: &SummarizerConfig) -> SummarizeResult<Arc<dyn InferenceProvider>> {
        self(config)
    }
}

/// Connects to the configured Ollama endpoint
#[derive(Debug, Default, Clone, Copy)]
pub struct OllamaFactory;

impl ProviderFactory for OllamaFactory {
    fn connect(&self, config: &SummarizerConfig) -> SummarizeResult<Arc<dyn InferenceProvider>> {
        let provider = OllamaProvider::new(config.endpoint.clone()).map_err(|e| {
            SummarizeError::invalid_configuration(
                format!("cannot create HTTP client for {}: {e}", config.endpoint),
                "check the ollamaEndpoint setting",
            )
        })?;
        Ok(Arc::new(provider))
    }
}

/// Successful summarization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryOutcome {
    pub summary: String,
    pub chunk_count: usize,
    pub recursion_depth: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fact_check: Option<FactCheck>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}

/// Failed summarization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryFailure {
    pub error: String,
    pub details: ErrorDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_count: Option<usize>,
}

/// Reply sent back to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SummarizeResponse {
    Success(SummaryOutcome),
    Failure(SummaryFailure),
}

impl SummarizeResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Entry point for summarization requests
pub struct Summarizer {
    host: Arc<dyn HostEnvironment>,
    factory: Arc<dyn ProviderFactory>,
    diagnostics: Diagnostics,
    retry: RetryConfig,
}

impl Summarizer {
    /// Summarizer reading settings from `host` and connecting through `factory`.
    pub fn new(host: Arc<dyn HostEnvironment>, factory: Arc<dyn ProviderFactory>) -> Self {
        Self {
            host,
            factory,
            diagnostics: Diagnostics::disabled(),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Override retry timing.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Current configuration as seen by the next call.
    pub fn resolve_config(&self) -> SummarizeResult<SummarizerConfig> {
        SummarizerConfig::resolve(|key| self.host.get_setting(key))
    }

    /// Summarize `content` with the host's current settings.
    pub async fn summarize(
        &self,
        content: &str,
        system_prompt: &str,
    ) -> SummarizeResult<SummaryOutcome> {
        if content.trim().is_empty() {
            return Err(SummarizeError::InvalidInput(
                "content must be a non-empty string".to_string(),
            ));
        }
        if system_prompt.trim().is_empty() {
            return Err(SummarizeError::InvalidInput(
                "system prompt must be a non-empty string".to_string(),
            ));
        }

        let config = self.resolve_config()?;
        config.budget().checked_content_tokens(system_prompt)?;

        let token_count = config.report_token_count.then(|| estimate_tokens(content));

        let (working, truncated) = truncate_chars(content, config.max_content_chars);
        if truncated {
            warn!(
                max_chars = config.max_content_chars,
                "Content exceeds character limit, truncating"
            );
            self.diagnostics.emit(
                "Content truncated",
                Some(json!({
                    "originalChars": content.chars().count(),
                    "maxChars": config.max_content_chars,
                })),
            );
        }

        info!(
            endpoint = %config.endpoint,
            model = %config.model,
            token_limit = config.token_limit,
            "Starting summarization"
        );
        self.diagnostics.emit(
            "Starting summarization",
            Some(json!({
                "endpoint": config.endpoint,
                "model": config.model,
                "tokenLimit": config.token_limit,
                "contentTokens": estimate_tokens(working),
            })),
        );

        let provider = self.factory.connect(&config)?;
        let driver = RecursiveSummarizer::new(provider.clone(), &config, self.diagnostics.clone())
            .with_retry(self.retry.clone());

        let result = match driver
            .recursive_summarize(working, system_prompt, config.token_limit, 0)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Summarization failed");
                self.diagnostics.emit(
                    "Summarization failed",
                    Some(json!(e.details(Some(&config.endpoint), Some(&config.model)))),
                );
                return Err(e);
            }
        };

        let summary = result.summary.trim().to_string();

        let fact_check = if config.fact_check {
            Some(FactChecker::new(provider).check(working, &summary).await)
        } else {
            None
        };

        info!(
            chunks = result.chunk_count,
            depth = result.recursion_depth,
            "Summarization finished"
        );

        Ok(SummaryOutcome {
            summary,
            chunk_count: result.chunk_count,
            recursion_depth: result.recursion_depth,
            token_count,
            fact_check,
            truncated,
        })
    }

    /// [`Summarizer::summarize`], with errors folded into the reply shape.
    pub async fn respond(&self, content: &str, system_prompt: &str) -> SummarizeResponse {
        match self.summarize(content, system_prompt).await {
            Ok(outcome) => SummarizeResponse::Success(outcome),
            Err(e) => {
                let config = self.resolve_config().ok();
                let token_count = config
                    .as_ref()
                    .filter(|c| c.report_token_count)
                    .map(|_| estimate_tokens(content));
                let details = e.details(
                    config.as_ref().map(|c| c.endpoint.as_str()),
                    config.as_ref().map(|c| c.model.as_str()),
                );

                SummarizeResponse::Failure(SummaryFailure {
                    error: e.to_string(),
                    details,
                    token_count,
                })
            }
        }
    }
}

impl fmt::Debug for Summarizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Summarizer")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Cut `text` to at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => (&text[..idx], true),
        None => (text, false),
    }
}
