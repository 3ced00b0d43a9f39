use shelf_core::config::EmbeddingConfig;
use shelf_core::{EmbeddingProvider, Error};
use shelf_inference::HttpEmbeddingClient;
use std::time::Duration;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, dimension: usize) -> HttpEmbeddingClient {
    HttpEmbeddingClient::new(&EmbeddingConfig {
        service_url: server.uri(),
        dimension,
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

#[tokio::test]
async fn test_embed_single() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embed"))
        .and(body_json(serde_json::json!({ "text": "hello world" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "text": "hello world",
            "embedding": [0.1, 0.2, 0.3],
            "dimension": 3
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, 3);
    let embedding = client.embed("hello world").await.unwrap();
    assert_eq!(embedding, vec![0.1, 0.2, 0.3]);
}

#[tokio::test]
async fn test_embed_batch_in_one_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embed/batch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "texts": ["a", "b"],
            "embeddings": [[1.0, 0.0], [0.0, 1.0]],
            "count": 2,
            "dimension": 2
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, 2);
    let embeddings = client
        .embed_batch(&["a".to_string(), "b".to_string()])
        .await
        .unwrap();
    assert_eq!(embeddings, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
}

#[tokio::test]
async fn test_batch_count_mismatch_is_an_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embed/batch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "embeddings": [[1.0, 0.0]]
        })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, 2);
    let result = client.embed_batch(&["a".to_string(), "b".to_string()]).await;
    assert!(matches!(result, Err(Error::Inference(_))));
}

#[tokio::test]
async fn test_wrong_dimension_is_an_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "embedding": [0.1, 0.2]
        })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, 3);
    let result = client.embed("text").await;
    assert!(matches!(result, Err(Error::DimensionMismatch { expected: 3, got: 2 })));
}

#[tokio::test]
async fn test_service_error_carries_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embed"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, 3);
    let err = client.embed("text").await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("500"), "unexpected error: {}", message);
    assert!(message.contains("model not loaded"));
}

#[tokio::test]
async fn test_classify_and_health() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/classify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "text": "some text",
            "is_article": true,
            "confidence": 0.82,
            "classification_details": { "label": "POSITIVE" }
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "healthy",
            "embedding_model": "all-MiniLM-L6-v2",
            "classifier_model": "distilbert",
            "embedding_model_loaded": true,
            "classifier_loaded": true
        })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, 3);
    let classification = client.classify("some text").await.unwrap();
    assert!(classification.is_article);
    assert!((classification.confidence - 0.82).abs() < 1e-9);

    let health = client.health().await.unwrap();
    assert_eq!(health.status, "healthy");
    assert!(health.embedding_model_loaded);
}

#[tokio::test]
async fn test_similarity_round_trip() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/similarity"))
        .and(body_json(serde_json::json!({
            "embedding1": [1.0, 0.0],
            "embedding2": [0.0, 1.0]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "similarity": 0.0 })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, 2);
    let similarity = client.similarity(&[1.0, 0.0], &[0.0, 1.0]).await.unwrap();
    assert_eq!(similarity, 0.0);
}
