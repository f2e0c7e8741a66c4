//! Embedding client tests against a mocked OpenAI-compatible server
//!
//! These tests use wiremock to stand in for LM Studio and validate:
//! - Request shape and response parsing
//! - Retrying while a just-in-time model loads
//! - Errors that are not retried
//! - The end to end path from config to stored embeddings

mod common;

use memoria::embeddings::{EmbeddingProvider, OpenAiCompatibleEmbeddings};
use memoria::types::NewMemory;
use memoria::utils::toml_config::ConfigManager;
use memoria::{MemorySystem, SearchRequest};
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============= Helper Functions =============

fn embedding_response(vector: &[f32]) -> serde_json::Value {
    json!({
        "object": "list",
        "data": [{ "object": "embedding", "index": 0, "embedding": vector }],
        "model": "nomic-embed-text",
    })
}

fn model_loading_response() -> ResponseTemplate {
    ResponseTemplate::new(404).set_body_json(json!({ "error": "Model does not exist: nomic-embed-text" }))
}

fn client(server: &MockServer) -> OpenAiCompatibleEmbeddings {
    OpenAiCompatibleEmbeddings::new(&server.uri(), "nomic-embed-text")
        .unwrap()
        .with_retries(3, 2)
        .with_retry_delay(Duration::from_millis(10))
}

// ============= Client Tests =============

#[tokio::test]
async fn test_embed_posts_to_v1_embeddings() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(body_partial_json(json!({ "model": "nomic-embed-text", "input": "hello" })))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(embedding_response(&[0.1, 0.2, 0.3])))
        .expect(1)
        .mount(&server)
        .await;

    let embedder = client(&server).with_api_key(Some("sk-test".into()));
    assert_eq!(embedder.endpoint(), format!("{}/v1/embeddings", server.uri()));

    let vector = embedder.embed("hello").await.unwrap();
    assert_eq!(vector, vec![0.1, 0.2, 0.3]);
}

#[tokio::test]
async fn test_retries_while_model_loads() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(model_loading_response())
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(embedding_response(&[1.0, 0.0])))
        .mount(&server)
        .await;

    let vector = client(&server).embed("warm up").await.unwrap();
    assert_eq!(vector, vec![1.0, 0.0]);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_gives_up_after_warmup_budget() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(model_loading_response())
        .expect(3)
        .mount(&server)
        .await;

    let err = client(&server).embed("never loads").await.unwrap_err();
    assert_eq!(err.kind(), "embedding");
    assert!(err.to_string().contains("did not load after 3 attempts"), "{}", err);
}

#[tokio::test]
async fn test_smaller_budget_once_warmed_up() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(embedding_response(&[0.5])))
        .mount(&server)
        .await;

    let embedder = client(&server);
    embedder.embed("first").await.unwrap();

    server.reset().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(model_loading_response())
        .expect(2)
        .mount(&server)
        .await;

    assert!(embedder.embed("second").await.is_err());
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server).embed("boom").await.unwrap_err();
    assert!(err.to_string().contains("500"), "{}", err);
}

#[tokio::test]
async fn test_empty_embedding_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .mount(&server)
        .await;

    let err = client(&server).embed("nothing").await.unwrap_err();
    assert!(err.to_string().contains("Empty embedding"), "{}", err);
}

// ============= End to End =============

#[tokio::test]
async fn test_system_opened_from_config_embeds_and_searches() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(embedding_response(&[0.6, 0.8, 0.0])))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = common::test_config();
    config.storage.data_dir = dir.path().to_path_buf();
    config.embeddings.base_url = server.uri();
    config.embeddings.retry_delay_secs = 0;

    let system = MemorySystem::open(ConfigManager::from_config(config)).await.unwrap();
    let health = system.get_system_health().await;
    assert_eq!(health.embedding_service.status, "healthy");
    assert_eq!(health.embedding_service.dimensions, Some(3));

    system
        .create_memory(NewMemory::new("Keeps a spare key under the mat"))
        .await
        .unwrap();
    system.wait_for_embeddings().await;

    let response = system.search_memories(&SearchRequest::new("where is the key")).await.unwrap();
    assert_eq!(response.count, 1);
    assert!(response.results[0].similarity_score > 0.99);
}
