//! Token budget for a single inference request

use serde::{Deserialize, Serialize};

use crate::error::{ContextError, ContextResult};
use crate::tokens::estimate_tokens;

/// Smallest token limit accepted from settings.
pub const MIN_TOKEN_LIMIT: usize = 1_024;
/// Largest token limit accepted from settings.
pub const MAX_TOKEN_LIMIT: usize = 128_000;
/// Token limit used when nothing is configured.
pub const DEFAULT_TOKEN_LIMIT: usize = 16_384;
/// Tokens held back for estimation error and prompt template overhead.
pub const SAFETY_BUFFER: usize = 100;

/// Clamp a persisted token limit into `[MIN_TOKEN_LIMIT, MAX_TOKEN_LIMIT]`.
pub fn clamp_token_limit(token_limit: usize) -> usize {
    token_limit.clamp(MIN_TOKEN_LIMIT, MAX_TOKEN_LIMIT)
}

/// Token budget configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBudget {
    /// Context size of the model (sent as `num_ctx`)
    pub token_limit: usize,
    /// Reserved tokens subtracted from every request
    pub safety_buffer: usize,
}

impl Default for TokenBudget {
    fn default() -> Self {
        Self {
            token_limit: DEFAULT_TOKEN_LIMIT,
            safety_buffer: SAFETY_BUFFER,
        }
    }
}

impl TokenBudget {
    /// Budget for `token_limit` with the default safety buffer.
    pub fn new(token_limit: usize) -> Self {
        Self {
            token_limit,
            ..Default::default()
        }
    }

    /// Tokens left for content once the system prompt and buffer are paid for.
    /// Zero means the prompt alone does not fit.
    pub fn max_content_tokens(&self, system_prompt: &str) -> usize {
        self.token_limit
            .saturating_sub(estimate_tokens(system_prompt))
            .saturating_sub(self.safety_buffer)
    }

    /// Like [`TokenBudget::max_content_tokens`], but an empty budget is an error.
    pub fn checked_content_tokens(&self, system_prompt: &str) -> ContextResult<usize> {
        match self.max_content_tokens(system_prompt) {
            0 => Err(ContextError::BudgetExhausted {
                token_limit: self.token_limit,
                prompt_tokens: estimate_tokens(system_prompt),
                safety_buffer: self.safety_buffer,
            }),
            available => Ok(available),
        }
    }
}
