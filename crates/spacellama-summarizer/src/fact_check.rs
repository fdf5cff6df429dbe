//! Optional grounding check of a finished summary
//!
//! Asks a small classifier model whether the summary is supported by the
//! document. The verdict is advisory: it never changes the summary, and any
//! failure degrades to [`FactCheck::Unavailable`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use spacellama_runtime::{GenerateOptions, GenerateRequest, InferenceProvider};
use tracing::{debug, warn};

/// Classifier model used for fact checks.
pub const FACT_CHECK_MODEL: &str = "bespoke-minicheck:latest";
/// Context size for fact-check requests.
pub const FACT_CHECK_NUM_CTX: u32 = 30_000;

/// Fact-check verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum FactCheck {
    Supported,
    Unsupported,
    Unavailable { reason: String },
}

impl FactCheck {
    /// Short lowercase name.
    pub fn label(&self) -> &str {
        match self {
            Self::Supported => "supported",
            Self::Unsupported => "unsupported",
            Self::Unavailable { .. } => "unavailable",
        }
    }
}

/// Checks a summary against its source
pub struct FactChecker {
    provider: Arc<dyn InferenceProvider>,
    model: String,
}

impl FactChecker {
    pub fn new(provider: Arc<dyn InferenceProvider>) -> Self {
        Self {
            provider,
            model: FACT_CHECK_MODEL.to_string(),
        }
    }

    /// Use another classifier model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Prompt asking whether `summary` is supported by `document`.
    pub fn prompt(document: &str, summary: &str) -> String {
        format!(
            "Document: {document}\nClaim: This is a correct summary of the document:\n\n{summary}"
        )
    }

    /// Ask the classifier. Errors become [`FactCheck::Unavailable`].
    pub async fn check(&self, document: &str, summary: &str) -> FactCheck {
        let request = GenerateRequest::new(Self::prompt(document, summary), self.model.clone())
            .with_num_ctx(FACT_CHECK_NUM_CTX)
            .with_options(GenerateOptions {
                temperature: Some(0.0),
                num_predict: Some(2),
            });

        match self.provider.generate(request).await {
            Ok(response) => {
                let verdict = parse_verdict(&response.content);
                debug!(model = %self.model, verdict = verdict.label(), "Fact check finished");
                verdict
            }
            Err(e) => {
                warn!(model = %self.model, error = %e, "Fact check failed");
                FactCheck::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }
}

fn parse_verdict(raw: &str) -> FactCheck {
    let answer = raw.trim().to_ascii_lowercase();
    if answer.starts_with("yes") {
        FactCheck::Supported
    } else if answer.starts_with("no") {
        FactCheck::Unsupported
    } else {
        FactCheck::Unavailable {
            reason: format!("unexpected verdict `{}`", raw.trim()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spacellama_runtime::{MockProvider, ProviderError};

    #[tokio::test]
    async fn sends_deterministic_classifier_request() {
        let provider = Arc::new(MockProvider::always("Yes"));
        let checker = FactChecker::new(provider.clone());

        let verdict = checker.check("The sky is blue.", "Sky: blue.").await;

        assert_eq!(verdict, FactCheck::Supported);
        let request = &provider.requests()[0];
        assert_eq!(request.model, FACT_CHECK_MODEL);
        assert_eq!(request.num_ctx, Some(30_000));
        assert_eq!(
            request.prompt,
            "Document: The sky is blue.\nClaim: This is a correct summary of the document:\n\nSky: blue."
        );
        let options = request.options.as_ref().unwrap();
        assert_eq!(options.temperature, Some(0.0));
        assert_eq!(options.num_predict, Some(2));
    }

    #[tokio::test]
    async fn no_means_unsupported() {
        let checker = FactChecker::new(Arc::new(MockProvider::always(" No.")));
        assert_eq!(checker.check("doc", "claim").await, FactCheck::Unsupported);
    }

    #[tokio::test]
    async fn errors_degrade_to_unavailable() {
        let checker = FactChecker::new(Arc::new(MockProvider::failing(ProviderError::HttpStatus {
            status: 404,
            body: "model not found".into(),
        })))
        .with_model("minicheck");

        match checker.check("doc", "claim").await {
            FactCheck::Unavailable { reason } => assert!(reason.contains("404")),
            other => panic!("unexpected verdict: {other:?}"),
        }
    }

    #[test]
    fn odd_answers_are_unavailable() {
        assert!(matches!(parse_verdict("Maybe"), FactCheck::Unavailable { .. }));
        assert_eq!(parse_verdict("YES"), FactCheck::Supported);
    }

    #[test]
    fn serializes_with_status_tag() {
        let value = serde_json::to_value(FactCheck::Unavailable {
            reason: "offline".into(),
        })
        .unwrap();
        assert_eq!(value, serde_json::json!({ "status": "unavailable", "reason": "offline" }));
    }
}
