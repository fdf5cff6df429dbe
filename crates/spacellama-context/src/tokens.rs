//! Heuristic token estimation

/// Characters per estimated token.
pub const CHARS_PER_TOKEN: usize = 4;

/// Simple token estimation (approximately 4 chars per token, rounded up).
///
/// Every budget decision in the pipeline goes through this function so that
/// chunk sizing and request sizing agree with each other.
pub fn estimate_tokens(text: &str) -> usize {
    tokens_for_chars(text.chars().count())
}

/// Estimate for text already measured as `chars` characters.
pub fn tokens_for_chars(chars: usize) -> usize {
    chars.div_ceil(CHARS_PER_TOKEN)
}
