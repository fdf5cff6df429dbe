//! Error types for token budgeting

use thiserror::Error;

/// Budget and chunking error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error(
        "token budget exhausted: limit {token_limit} leaves no room after {prompt_tokens} prompt tokens and a {safety_buffer} token safety buffer"
    )]
    BudgetExhausted {
        token_limit: usize,
        prompt_tokens: usize,
        safety_buffer: usize,
    },
}

/// Result type for context operations
pub type ContextResult<T> = Result<T, ContextError>;
