//! Recursive chunk-and-summarize driver
//!
//! Each pass splits the content to fit the token budget, summarizes every
//! chunk in order and joins the results. When a pass produced more than one
//! chunk the joined text becomes the input of the next pass. Passes are
//! capped at [`MAX_RECURSION_DEPTH`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use spacellama_context::{estimate_tokens, split_into_chunks, TokenBudget};
use spacellama_runtime::InferenceProvider;
use tracing::{info, warn};

use crate::chunk::ChunkSummarizer;
use crate::config::SummarizerConfig;
use crate::diagnostics::Diagnostics;
use crate::error::{SummarizeError, SummarizeResult};
use crate::retry::RetryConfig;

/// Deepest pass allowed before giving up.
pub const MAX_RECURSION_DEPTH: usize = 5;

/// Returned instead of a summary once the depth limit is exceeded.
pub const RECURSION_LIMIT_SUMMARY: &str =
    "Maximum recursion depth reached. Unable to summarize further.";

/// Joins chunk summaries within a pass.
pub const SUMMARY_SEPARATOR: &str = "\n\n";

/// Outcome of a recursive summarization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizationResult {
    pub summary: String,
    /// Chunks summarized across all passes
    pub chunk_count: usize,
    /// Depth of the pass that produced `summary`
    pub recursion_depth: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_count: Option<usize>,
}

/// Chunk-and-summarize loop over one provider
pub struct RecursiveSummarizer {
    chunks: ChunkSummarizer,
    endpoint: String,
    diagnostics: Diagnostics,
}

impl RecursiveSummarizer {
    /// Driver for the configured model, logging to `diagnostics`.
    pub fn new(
        provider: Arc<dyn InferenceProvider>,
        config: &SummarizerConfig,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            chunks: ChunkSummarizer::new(provider, config.model.clone())
                .with_diagnostics(diagnostics.clone()),
            endpoint: config.endpoint.clone(),
            diagnostics,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.chunks = self.chunks.with_retry(retry);
        self
    }

    /// Summarize `content` starting at `depth`.
    ///
    /// Chunk failures abort the whole call and are reported as
    /// [`SummarizeError::SummarizationFailed`].
    pub async fn recursive_summarize(
        &self,
        content: &str,
        system_prompt: &str,
        token_limit: usize,
        depth: usize,
    ) -> SummarizeResult<SummarizationResult> {
        let budget = TokenBudget::new(token_limit);
        let max_content_tokens = budget.max_content_tokens(system_prompt);

        let mut content = content.to_string();
        let mut depth = depth;
        let mut chunk_count = 0;

        loop {
            if depth > MAX_RECURSION_DEPTH {
                warn!(depth, chunk_count, "Recursion limit reached");
                self.diagnostics.emit(
                    "Recursion limit reached",
                    Some(json!({ "depth": depth, "chunkCount": chunk_count })),
                );
                return Ok(SummarizationResult {
                    summary: RECURSION_LIMIT_SUMMARY.to_string(),
                    chunk_count,
                    recursion_depth: depth,
                    token_count: None,
                });
            }

            let chunks = split_into_chunks(&content, max_content_tokens);
            info!(
                depth,
                chunks = chunks.len(),
                max_content_tokens,
                "Summarization pass"
            );
            self.diagnostics.emit(
                "Summarization pass",
                Some(json!({
                    "depth": depth,
                    "chunks": chunks.len(),
                    "maxContentTokens": max_content_tokens,
                })),
            );

            let mut summaries = Vec::with_capacity(chunks.len());
            for chunk in &chunks {
                self.diagnostics.emit(
                    "Summarizing chunk",
                    Some(json!({
                        "depth": depth,
                        "chunk": chunk.index + 1,
                        "of": chunks.len(),
                        "tokens": chunk.tokens,
                    })),
                );

                let summary = self
                    .chunks
                    .summarize_chunk(&chunk.text, system_prompt, token_limit)
                    .await
                    .map_err(|e| self.failure(e))?;

                self.diagnostics.emit(
                    "Chunk summarized",
                    Some(json!({
                        "depth": depth,
                        "chunk": chunk.index + 1,
                        "summaryTokens": estimate_tokens(&summary),
                    })),
                );
                summaries.push(summary);
            }

            chunk_count += chunks.len();
            let combined = summaries.join(SUMMARY_SEPARATOR);

            if chunks.len() <= 1 {
                return Ok(SummarizationResult {
                    summary: combined,
                    chunk_count,
                    recursion_depth: depth,
                    token_count: None,
                });
            }

            content = combined;
            depth += 1;
        }
    }

    fn failure(&self, err: SummarizeError) -> SummarizeError {
        SummarizeError::SummarizationFailed {
            endpoint: self.endpoint.clone(),
            model: self.chunks.model().to_string(),
            message: err.to_string(),
        }
    }
}
