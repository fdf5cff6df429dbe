//! Single-chunk summarization with retry

use std::sync::Arc;

use serde_json::json;
use spacellama_runtime::{GenerateRequest, InferenceProvider, ProviderError};
use tracing::debug;

use crate::diagnostics::Diagnostics;
use crate::error::{SummarizeError, SummarizeResult};
use crate::prompt::chunk_prompt;
use crate::retry::{with_retry, RetryConfig, RetryError};

/// Sends one chunk to the model and returns its summary text.
pub struct ChunkSummarizer {
    provider: Arc<dyn InferenceProvider>,
    model: String,
    retry: RetryConfig,
    diagnostics: Diagnostics,
}

impl ChunkSummarizer {
    /// Summarizer for `model` with the default retry policy and no diagnostics.
    pub fn new(provider: Arc<dyn InferenceProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            retry: RetryConfig::default(),
            diagnostics: Diagnostics::disabled(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Model every request is sent to.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Summarize `chunk` with `num_ctx` set to `token_limit`.
    ///
    /// Transport failures, HTTP errors and timeouts are retried; a response
    /// that is not in the expected shape fails immediately.
    pub async fn summarize_chunk(
        &self,
        chunk: &str,
        system_prompt: &str,
        token_limit: usize,
    ) -> SummarizeResult<String> {
        let request = GenerateRequest::new(chunk_prompt(system_prompt, chunk), self.model.clone())
            .with_num_ctx(u32::try_from(token_limit).unwrap_or(u32::MAX));

        debug!(model = %self.model, prompt_chars = request.prompt.len(), "Sending chunk to model");

        let outcome = with_retry(
            || self.provider.generate(request.clone()),
            &self.retry,
            |e: &ProviderError| !e.is_malformed(),
            |event| {
                self.diagnostics.emit(
                    "Retrying chunk request",
                    Some(json!({
                        "attempt": event.attempt,
                        "delayMs": event.delay.as_millis() as u64,
                        "error": event.error,
                    })),
                );
            },
        )
        .await;

        match outcome {
            Ok(response) => Ok(response.content),
            Err(RetryError::Fatal(e)) => Err(SummarizeError::from(e)),
            Err(RetryError::Exhausted {
                attempts,
                last_error,
            }) => Err(SummarizeError::ChunkSummarization {
                attempts,
                message: last_error,
            }),
        }
    }
}
