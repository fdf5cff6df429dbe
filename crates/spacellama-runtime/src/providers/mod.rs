//! Inference provider implementations
//!
//! Concrete implementations of the `InferenceProvider` trait.

pub mod ollama;

pub use ollama::{ModelInfo, OllamaProvider};
