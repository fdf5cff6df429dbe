//! Known context sizes for common Ollama models

use crate::window::DEFAULT_TOKEN_LIMIT;

/// Built-in model -> context size table.
pub const MODEL_TOKEN_LIMITS: &[(&str, usize)] = &[
    ("llama3.1:8b", 128_000),
    ("llama3.1:70b", 128_000),
    ("llama3.2:1b", 128_000),
    ("llama3.2:3b", 128_000),
    ("mistral", 8_192),
    ("mixtral", 32_768),
    ("qwen2.5:7b", 32_768),
    ("qwen2.5:14b", 32_768),
];

/// Suggest a token limit for `model`.
///
/// Lookup order: exact name, case-insensitive substring match in either
/// direction, model family, then [`DEFAULT_TOKEN_LIMIT`].
pub fn suggested_token_limit(model: &str) -> usize {
    let model = model.trim();
    if model.is_empty() {
        return DEFAULT_TOKEN_LIMIT;
    }

    if let Some((_, limit)) = MODEL_TOKEN_LIMITS.iter().find(|(name, _)| *name == model) {
        return *limit;
    }

    let lowered = model.to_lowercase();
    if let Some((_, limit)) = MODEL_TOKEN_LIMITS.iter().find(|(name, _)| {
        let name = name.to_lowercase();
        name.contains(&lowered) || lowered.contains(&name)
    }) {
        return *limit;
    }

    if lowered.contains("llama3") || lowered.contains("llama-3") {
        128_000
    } else if lowered.contains("mixtral") || lowered.contains("qwen") {
        32_768
    } else {
        DEFAULT_TOKEN_LIMIT
    }
}
