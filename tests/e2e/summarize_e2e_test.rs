//! End-to-end tests for the summarization pipeline
//!
//! Requests go through the background router and the real Ollama HTTP
//! client against a mock server.

use std::sync::Arc;

use httpmock::prelude::*;
use serde_json::json;
use spacellama_summarizer::prelude::*;
use spacellama_summarizer::{FactCheck, RetryConfig, StaticHost, SummaryOutcome};

fn fast_retry() -> RetryConfig {
    RetryConfig {
        initial_delay_ms: 10,
        max_delay_ms: 80,
        timeout_factor: 500,
        max_timeout_ms: 10_000,
        ..RetryConfig::default()
    }
}

fn background(settings: Settings) -> (Background, Arc<StaticHost>) {
    let host = Arc::new(StaticHost::new(settings));
    let background = Background::new(host.clone(), Arc::new(OllamaFactory)).with_retry(fast_retry());
    (background, host)
}

fn summarize(content: &str) -> HostRequest {
    HostRequest::Summarize {
        content: content.to_string(),
        system_prompt: "Summarize.".to_string(),
        url: None,
    }
}

fn expect_success(response: HostResponse) -> SummaryOutcome {
    match response {
        HostResponse::Summary(SummarizeResponse::Success(outcome)) => outcome,
        other => panic!("expected a summary, got {other:?}"),
    }
}

#[tokio::test]
async fn e2e_small_page_single_request() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/generate").json_body(json!({
                "prompt": "Summarize.\n\nFollow the above instructions and summarize the following text:\n\nHello world.",
                "model": "llama3.1:8b",
                "stream": false,
                "num_ctx": 4096
            }));
            then.status(200).json_body(json!({
                "model": "llama3.1:8b",
                "response": "A greeting to the world.",
                "done": true
            }));
        })
        .await;

    let settings = Settings::new()
        .with(keys::OLLAMA_ENDPOINT, server.base_url())
        .with(keys::TOKEN_LIMIT, 4_096);
    let (background, host) = background(settings);

    background.dispatch(summarize("Hello world.")).await;

    mock.assert_async().await;
    let messages = host.sent_messages();
    assert_eq!(messages.len(), 1);
    let value = serde_json::to_value(&messages[0]).unwrap();
    assert_eq!(
        value,
        json!({ "summary": "A greeting to the world.", "chunkCount": 1, "recursionDepth": 0 })
    );
}

#[tokio::test]
async fn e2e_pasted_generate_url_is_normalized() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(200).json_body(json!({ "response": "ok" }));
        })
        .await;

    let settings = Settings::new()
        .with(keys::OLLAMA_ENDPOINT, format!("{}/api/generate/", server.base_url()));
    let (background, _) = background(settings);

    let outcome = expect_success(background.handle(summarize("Some page text.")).await);

    mock.assert_async().await;
    assert_eq!(outcome.summary, "ok");
}

#[tokio::test]
async fn e2e_long_document_is_summarized_recursively() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(200).json_body(json!({ "response": "Short summary." }));
        })
        .await;

    let paragraph = "Rust gives you memory safety without a garbage collector. ".repeat(30);
    let content = vec![paragraph.trim(); 40].join("\n\n");
    let settings = Settings::new()
        .with(keys::OLLAMA_ENDPOINT, server.base_url())
        .with(keys::TOKEN_LIMIT, 1_024)
        .with(keys::REPORT_TOKEN_COUNT, true);
    let (background, _) = background(settings);

    let outcome = expect_success(background.handle(summarize(&content)).await);

    assert!(outcome.chunk_count >= 10, "{outcome:?}");
    assert_eq!(outcome.recursion_depth, 1);
    assert_eq!(outcome.summary, "Short summary.");
    assert_eq!(outcome.token_count, Some(content.chars().count().div_ceil(4)));
    mock.assert_hits_async(outcome.chunk_count).await;
}

#[tokio::test]
async fn e2e_server_errors_exhaust_retries() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(500).body("model failed to load");
        })
        .await;

    let settings = Settings::new()
        .with(keys::OLLAMA_ENDPOINT, server.base_url())
        .with(keys::OLLAMA_MODEL, "mistral");
    let (background, _) = background(settings);

    let response = background.handle(summarize("Hello world.")).await;

    mock.assert_hits_async(3).await;
    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["details"]["endpoint"], server.base_url());
    assert_eq!(value["details"]["model"], "mistral");
    let message = value["details"]["message"].as_str().unwrap();
    assert!(message.contains("3 attempts"), "{message}");
    assert!(message.contains("status: 500"), "{message}");

    let HostResponse::Logs { logs } = background.handle(HostRequest::GetLogs).await else {
        panic!("expected logs");
    };
    let retries = logs
        .iter()
        .filter(|e| e.message == "Retrying chunk request")
        .count();
    assert_eq!(retries, 2);
}

#[tokio::test]
async fn e2e_malformed_response_fails_fast() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(200).json_body(json!({ "error": "unexpected shape" }));
        })
        .await;

    let settings = Settings::new().with(keys::OLLAMA_ENDPOINT, server.base_url());
    let (background, _) = background(settings);

    let response = background.handle(summarize("Hello world.")).await;

    mock.assert_hits_async(1).await;
    match response {
        HostResponse::Summary(SummarizeResponse::Failure(failure)) => {
            assert!(failure.details.message.contains("malformed"), "{failure:?}");
        }
        other => panic!("expected a failure, got {other:?}"),
    }
}

#[tokio::test]
async fn e2e_fact_check_uses_classifier_model() {
    let server = MockServer::start_async().await;
    let summary_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/generate").json_body(json!({
                "prompt": "Summarize.\n\nFollow the above instructions and summarize the following text:\n\nThe sky is blue today.",
                "model": "llama3.1:8b",
                "stream": false,
                "num_ctx": 16384
            }));
            then.status(200).json_body(json!({ "response": "The sky is blue." }));
        })
        .await;
    let check_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/generate").json_body(json!({
                "prompt": "Document: The sky is blue today.\nClaim: This is a correct summary of the document:\n\nThe sky is blue.",
                "model": "bespoke-minicheck:latest",
                "stream": false,
                "num_ctx": 30000,
                "options": { "temperature": 0.0, "num_predict": 2 }
            }));
            then.status(200).json_body(json!({ "response": "Yes" }));
        })
        .await;

    let settings = Settings::new()
        .with(keys::OLLAMA_ENDPOINT, server.base_url())
        .with(keys::FACT_CHECK, true);
    let (background, _) = background(settings);

    let outcome = expect_success(background.handle(summarize("The sky is blue today.")).await);

    summary_mock.assert_async().await;
    check_mock.assert_async().await;
    assert_eq!(outcome.fact_check, Some(FactCheck::Supported));
}

#[tokio::test]
async fn e2e_unreachable_server_reports_endpoint() {
    let settings = Settings::new().with(keys::OLLAMA_ENDPOINT, "http://127.0.0.1:9");
    let (background, _) = background(settings);

    let response = background.handle(summarize("Hello world.")).await;

    let value = serde_json::to_value(&response).unwrap();
    assert!(value["error"].as_str().unwrap().contains("127.0.0.1:9"));
    assert_eq!(value["details"]["endpoint"], "http://127.0.0.1:9");
}
