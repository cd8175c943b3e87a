//! Integration tests for the backend fetcher (C4, §4.4) against a mocked
//! meta-search endpoint.

use relevance_gateway::backend;
use relevance_gateway::types::EnginePlan;
use serde_json::json;
use wiremock::matchers::{method, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn research_plan() -> EnginePlan {
    EnginePlan { engines: vec!["arxiv", "duckduckgo"], categories: vec!["science"] }
}

#[tokio::test]
async fn parses_hits_and_assigns_per_engine_positions() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("format", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"title": "Attention Is All You Need", "url": "https://arxiv.org/abs/1706.03762", "content": "the original transformer paper", "engine": "arxiv", "publishedDate": "2017-06"},
                {"title": "DDG hit one", "url": "https://example.com/1", "content": "snippet", "engine": "duckduckgo"},
                {"title": "A second arxiv hit", "url": "https://arxiv.org/abs/2001.00001", "content": "snippet", "engine": "arxiv"},
            ]
        })))
        .mount(&mock_server)
        .await;

    let client = reqwest::Client::new();
    let hits = backend::fetch(&client, &mock_server.uri(), "transformer attention", &research_plan()).await.unwrap();

    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].engine, "arxiv");
    assert_eq!(hits[0].position_in_engine, 1);
    assert_eq!(hits[1].engine, "duckduckgo");
    assert_eq!(hits[1].position_in_engine, 1);
    assert_eq!(hits[2].engine, "arxiv");
    assert_eq!(hits[2].position_in_engine, 2);
}

#[tokio::test]
async fn drops_hits_with_missing_fields_and_invalid_urls() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"title": "Missing URL", "content": "snippet", "engine": "duckduckgo"},
                {"title": "Bad URL", "url": "not-a-url", "content": "snippet", "engine": "duckduckgo"},
                {"title": "Good", "url": "https://example.com/good", "content": "snippet", "engine": "duckduckgo"},
            ]
        })))
        .mount(&mock_server)
        .await;

    let client = reqwest::Client::new();
    let hits = backend::fetch(&client, &mock_server.uri(), "query", &research_plan()).await.unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].title, "Good");
}

#[tokio::test]
async fn non_2xx_backend_response_is_fatal() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET")).respond_with(ResponseTemplate::new(500)).mount(&mock_server).await;

    let client = reqwest::Client::new();
    let result = backend::fetch(&client, &mock_server.uri(), "query", &research_plan()).await;

    assert!(matches!(result, Err(relevance_gateway::error::PipelineError::BackendUnavailable(_))));
}

#[tokio::test]
async fn malformed_json_body_is_fatal() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&mock_server)
        .await;

    let client = reqwest::Client::new();
    let result = backend::fetch(&client, &mock_server.uri(), "query", &research_plan()).await;

    assert!(matches!(result, Err(relevance_gateway::error::PipelineError::BackendUnavailable(_))));
}
