//! Integration tests for the intent classifier (C2, §4.2) against a mocked
//! LLM endpoint, covering both the happy path and the degradation fallback.

use relevance_gateway::classifier;
use relevance_gateway::types::Intent;
use serde_json::json;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn strict_json_response_resolves_intent_and_expansion() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "{\"intent\": \"research\", \"expanded_query\": \"transformer attention mechanism self-attention\"}"}]
        })))
        .mount(&mock_server)
        .await;

    let client = reqwest::Client::new();
    let expanded = classifier::classify(&client, &mock_server.uri(), "claude-haiku-4-5", Some("test-key"), "transformer attention mechanism").await;

    assert_eq!(expanded.intent, Intent::Research);
    assert_eq!(expanded.text, "transformer attention mechanism self-attention");
}

#[tokio::test]
async fn prose_wrapped_response_is_still_parsed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "Sure, here's the classification:\n```json\n{\"intent\": \"code\", \"expanded_query\": \"rust async runtimes comparison\"}\n```"}]
        })))
        .mount(&mock_server)
        .await;

    let client = reqwest::Client::new();
    let expanded = classifier::classify(&client, &mock_server.uri(), "claude-haiku-4-5", Some("test-key"), "rust async runtimes").await;

    assert_eq!(expanded.intent, Intent::Code);
}

#[tokio::test]
async fn unreachable_classifier_falls_back_to_general_with_raw_query() {
    // A server that is never started: connection refused.
    let client = reqwest::Client::new();
    let expanded = classifier::classify(&client, "http://127.0.0.1:1", "claude-haiku-4-5", Some("test-key"), "some query").await;

    assert_eq!(expanded.intent, Intent::General);
    assert_eq!(expanded.text, "some query");
}

#[tokio::test]
async fn missing_api_key_falls_back_to_general() {
    let client = reqwest::Client::new();
    let expanded = classifier::classify(&client, "http://127.0.0.1:1", "claude-haiku-4-5", None, "some query").await;

    assert_eq!(expanded.intent, Intent::General);
    assert_eq!(expanded.text, "some query");
}

#[tokio::test]
async fn empty_expanded_query_falls_back_to_raw_query() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "{\"intent\": \"news\", \"expanded_query\": \"   \"}"}]
        })))
        .mount(&mock_server)
        .await;

    let client = reqwest::Client::new();
    let expanded = classifier::classify(&client, &mock_server.uri(), "claude-haiku-4-5", Some("test-key"), "raw query text").await;

    assert_eq!(expanded.intent, Intent::News);
    assert_eq!(expanded.text, "raw query text");
}
