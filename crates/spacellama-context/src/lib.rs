//! SpaceLlama Context - token budgeting and content chunking
//!
//! This crate provides:
//! - Heuristic token estimation
//! - Token budgets with a safety buffer and clamped limits
//! - Paragraph/sentence/word chunking within a token budget
//! - Known context sizes for common models

pub mod chunker;
pub mod error;
pub mod models;
pub mod tokens;
pub mod window;

pub use chunker::{split_into_chunks, Chunk};
pub use error::{ContextError, ContextResult};
pub use models::suggested_token_limit;
pub use tokens::estimate_tokens;
pub use window::{clamp_token_limit, TokenBudget};

/// Prelude for common imports
pub mod prelude {
    pub use crate::chunker::{split_into_chunks, Chunk};
    pub use crate::error::{ContextError, ContextResult};
    pub use crate::tokens::estimate_tokens;
    pub use crate::window::{TokenBudget, SAFETY_BUFFER};
}
