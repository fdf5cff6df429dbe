//! Settings and per-call configuration resolution
//!
//! Settings are a flat key/value map using the same keys the extension
//! stores (`ollamaEndpoint`, `ollamaModel`, `tokenLimit`, ...). A
//! [`SummarizerConfig`] is resolved from them once per summarization call.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use spacellama_context::window::{clamp_token_limit, TokenBudget, DEFAULT_TOKEN_LIMIT};
use url::Url;

use crate::error::{SettingsError, SummarizeError, SummarizeResult};

/// Recognized setting keys.
pub mod keys {
    /// Server URL
    pub const OLLAMA_ENDPOINT: &str = "ollamaEndpoint";
    /// Model name
    pub const OLLAMA_MODEL: &str = "ollamaModel";
    /// Context size in tokens
    pub const TOKEN_LIMIT: &str = "tokenLimit";
    /// Include the input token estimate in replies
    pub const REPORT_TOKEN_COUNT: &str = "reportTokenCount";
    /// Verify summaries with the fact-check model
    pub const FACT_CHECK: &str = "factCheck";
    /// Characters kept before truncation
    pub const MAX_CONTENT_CHARS: &str = "maxContentChars";
}

/// Local Ollama server.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";
/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "llama3.1:8b";
/// Content beyond this many characters is cut off.
pub const DEFAULT_MAX_CONTENT_CHARS: usize = 1_000_000;

const ENV_PREFIX: &str = "SPACELLAMA_";
const ENV_KEYS: &[(&str, &str)] = &[
    ("OLLAMA_ENDPOINT", keys::OLLAMA_ENDPOINT),
    ("OLLAMA_MODEL", keys::OLLAMA_MODEL),
    ("TOKEN_LIMIT", keys::TOKEN_LIMIT),
    ("REPORT_TOKEN_COUNT", keys::REPORT_TOKEN_COUNT),
    ("FACT_CHECK", keys::FACT_CHECK),
    ("MAX_CONTENT_CHARS", keys::MAX_CONTENT_CHARS),
];

/// Layered key/value settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(BTreeMap<String, Value>);

impl Settings {
    /// Empty settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON object of settings, e.g. an export of extension storage.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let value: Value = serde_json::from_str(&raw).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        match value {
            Value::Object(map) => Ok(Self(map.into_iter().collect())),
            _ => Err(SettingsError::NotAnObject(path.to_path_buf())),
        }
    }

    /// Read `SPACELLAMA_*` variables (e.g. `SPACELLAMA_TOKEN_LIMIT`).
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::new();
        for (suffix, key) in ENV_KEYS {
            if let Some(value) = lookup(&format!("{ENV_PREFIX}{suffix}")) {
                settings.set(*key, Value::String(value));
            }
        }
        settings
    }

    /// Builder form of [`Settings::set`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Overlay `other` on top of `self`; keys in `other` win.
    pub fn merge(mut self, other: Self) -> Self {
        self.0.extend(other.0);
        self
    }
}

/// Configuration for one summarization call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarizerConfig {
    /// Server base URL without `/api/generate`
    pub endpoint: String,
    pub model: String,
    /// Clamped context size
    pub token_limit: usize,
    pub report_token_count: bool,
    pub fact_check: bool,
    pub max_content_chars: usize,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            token_limit: DEFAULT_TOKEN_LIMIT,
            report_token_count: false,
            fact_check: false,
            max_content_chars: DEFAULT_MAX_CONTENT_CHARS,
        }
    }
}

impl SummarizerConfig {
    /// Resolve from a settings lookup, applying defaults, clamping and
    /// endpoint validation. Empty or unparsable values fall back to defaults.
    pub fn resolve(get: impl Fn(&str) -> Option<Value>) -> SummarizeResult<Self> {
        let defaults = Self::default();

        let endpoint = setting_string(get(keys::OLLAMA_ENDPOINT))
            .unwrap_or_else(|| defaults.endpoint.clone());
        let model = setting_string(get(keys::OLLAMA_MODEL)).unwrap_or(defaults.model);
        let token_limit = setting_usize(get(keys::TOKEN_LIMIT))
            .map_or(defaults.token_limit, clamp_token_limit);

        Ok(Self {
            endpoint: normalize_endpoint(&endpoint)?,
            model,
            token_limit,
            report_token_count: setting_bool(get(keys::REPORT_TOKEN_COUNT))
                .unwrap_or(defaults.report_token_count),
            fact_check: setting_bool(get(keys::FACT_CHECK)).unwrap_or(defaults.fact_check),
            max_content_chars: setting_usize(get(keys::MAX_CONTENT_CHARS))
                .unwrap_or(defaults.max_content_chars),
        })
    }

    /// Resolve from a settings map.
    pub fn from_settings(settings: &Settings) -> SummarizeResult<Self> {
        Self::resolve(|key| settings.get(key).cloned())
    }

    /// Token budget for the configured limit.
    pub fn budget(&self) -> TokenBudget {
        TokenBudget::new(self.token_limit)
    }
}

/// Strip a pasted `/api/generate` suffix and trailing slashes, then require an
/// `http`/`https` URL with a host.
pub fn normalize_endpoint(raw: &str) -> SummarizeResult<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let trimmed = trimmed
        .strip_suffix("/api/generate")
        .unwrap_or(trimmed)
        .trim_end_matches('/');

    let hint = "use a URL such as http://localhost:11434";
    let url = Url::parse(trimmed).map_err(|e| {
        SummarizeError::invalid_configuration(format!("endpoint `{raw}` is not a valid URL: {e}"), hint)
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(SummarizeError::invalid_configuration(
            format!("endpoint `{raw}` must use http:// or https://"),
            hint,
        ));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(SummarizeError::invalid_configuration(
            format!("endpoint `{raw}` has no host"),
            hint,
        ));
    }

    Ok(trimmed.to_string())
}

fn setting_string(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

fn setting_usize(value: Option<Value>) -> Option<usize> {
    let parsed = match value? {
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.filter(|n| *n > 0)
}

fn setting_bool(value: Option<Value>) -> Option<bool> {
    match value? {
        Value::Bool(b) => Some(b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use spacellama_context::window::{MAX_TOKEN_LIMIT, MIN_TOKEN_LIMIT};

    #[test]
    fn empty_settings_use_defaults() {
        let config = SummarizerConfig::from_settings(&Settings::new()).unwrap();
        assert_eq!(config, SummarizerConfig::default());
    }

    #[test]
    fn resolves_extension_storage_keys() {
        let settings = Settings::new()
            .with(keys::OLLAMA_ENDPOINT, "http://gpu-box:11434/")
            .with(keys::OLLAMA_MODEL, "mistral")
            .with(keys::TOKEN_LIMIT, 8_192)
            .with(keys::REPORT_TOKEN_COUNT, true)
            .with(keys::FACT_CHECK, "true");

        let config = SummarizerConfig::from_settings(&settings).unwrap();

        assert_eq!(config.endpoint, "http://gpu-box:11434");
        assert_eq!(config.model, "mistral");
        assert_eq!(config.token_limit, 8_192);
        assert!(config.report_token_count);
        assert!(config.fact_check);
    }

    #[test]
    fn token_limit_is_clamped() {
        let low = Settings::new().with(keys::TOKEN_LIMIT, 12);
        let high = Settings::new().with(keys::TOKEN_LIMIT, "99999999");

        assert_eq!(SummarizerConfig::from_settings(&low).unwrap().token_limit, MIN_TOKEN_LIMIT);
        assert_eq!(SummarizerConfig::from_settings(&high).unwrap().token_limit, MAX_TOKEN_LIMIT);
    }

    #[test]
    fn corrupt_values_fall_back_to_defaults() {
        let settings = Settings::new()
            .with(keys::OLLAMA_MODEL, "  ")
            .with(keys::TOKEN_LIMIT, json!("lots"))
            .with(keys::MAX_CONTENT_CHARS, json!(-5))
            .with(keys::FACT_CHECK, json!({"on": true}));

        let config = SummarizerConfig::from_settings(&settings).unwrap();

        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.token_limit, DEFAULT_TOKEN_LIMIT);
        assert_eq!(config.max_content_chars, DEFAULT_MAX_CONTENT_CHARS);
        assert!(!config.fact_check);
    }

    #[test]
    fn endpoint_strips_generate_path() {
        assert_eq!(
            normalize_endpoint("http://localhost:11434/api/generate/").unwrap(),
            "http://localhost:11434"
        );
        assert_eq!(
            normalize_endpoint(" https://ollama.lan ").unwrap(),
            "https://ollama.lan"
        );
    }

    #[test]
    fn endpoint_rejects_bad_urls() {
        for raw in ["localhost:11434", "ftp://host/models", "not a url", "file:///tmp/x"] {
            let err = normalize_endpoint(raw).unwrap_err();
            assert!(
                matches!(err, SummarizeError::InvalidConfiguration { .. }),
                "{raw} gave {err:?}"
            );
        }
    }

    #[test]
    fn env_lookup_maps_prefixed_variables() {
        let settings = Settings::from_lookup(|name| match name {
            "SPACELLAMA_OLLAMA_MODEL" => Some("qwen2.5:7b".to_string()),
            "SPACELLAMA_TOKEN_LIMIT" => Some("32768".to_string()),
            _ => None,
        });

        let config = SummarizerConfig::from_settings(&settings).unwrap();
        assert_eq!(config.model, "qwen2.5:7b");
        assert_eq!(config.token_limit, 32_768);
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn merge_prefers_overlay() {
        let base = Settings::new()
            .with(keys::OLLAMA_MODEL, "mistral")
            .with(keys::TOKEN_LIMIT, 4_096);
        let overlay = Settings::new().with(keys::OLLAMA_MODEL, "phi3");

        let merged = base.merge(overlay);

        assert_eq!(merged.get(keys::OLLAMA_MODEL), Some(&json!("phi3")));
        assert_eq!(merged.get(keys::TOKEN_LIMIT), Some(&json!(4_096)));
    }

    #[test]
    fn settings_file_must_be_an_object() {
        let dir = std::env::temp_dir().join(format!("spacellama-settings-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let good = dir.join("good.json");
        std::fs::write(&good, r#"{"ollamaModel": "mistral", "tokenLimit": 8192}"#).unwrap();
        let settings = Settings::from_json_file(&good).unwrap();
        assert_eq!(settings.get(keys::OLLAMA_MODEL), Some(&json!("mistral")));

        let bad = dir.join("bad.json");
        std::fs::write(&bad, "[1, 2, 3]").unwrap();
        assert!(matches!(
            Settings::from_json_file(&bad),
            Err(SettingsError::NotAnObject(_))
        ));

        assert!(matches!(
            Settings::from_json_file(dir.join("missing.json")),
            Err(SettingsError::Io { .. })
        ));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
