//! Tests for the videos table client.

use std::time::Duration;

use serial_test::serial;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use reel_models::{VideoPatch, VideoRecord, VideoStatus};

use crate::client::{StateConfig, VideoStore};
use crate::error::StateError;
use crate::retry::RetryConfig;

fn store_for(server: &MockServer) -> VideoStore {
    VideoStore::new(StateConfig {
        base_url: server.uri(),
        service_key: "service-key".into(),
        timeout: Duration::from_secs(5),
        retry: RetryConfig {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 2,
        },
    })
    .unwrap()
}

fn row_json(record: &VideoRecord) -> serde_json::Value {
    serde_json::json!([record])
}

#[test]
#[serial]
fn test_config_from_env() {
    std::env::set_var("STATE_STORE_URL", "https://api.example.com/");
    std::env::set_var("SERVICE_ROLE_KEY", "service-key");

    let config = StateConfig::from_env().unwrap();
    assert_eq!(config.base_url, "https://api.example.com");
    assert_eq!(config.service_key, "service-key");

    std::env::remove_var("STATE_STORE_URL");
    std::env::remove_var("SERVICE_ROLE_KEY");

    assert!(StateConfig::from_env().is_err());
}

#[test]
fn test_error_classification() {
    let err = StateError::from_http_status(429, "slow down");
    assert!(matches!(err, StateError::RateLimited(_)));
    assert!(err.is_retryable());

    let err = StateError::from_http_status(503, "unavailable");
    assert!(err.is_retryable());

    let err = StateError::from_http_status(400, "bad request");
    assert!(!err.is_retryable());

    let err = StateError::from_http_status(401, "nope");
    assert!(matches!(err, StateError::AuthError(_)));
}

#[tokio::test]
async fn test_insert_returns_representation() {
    let server = MockServer::start().await;
    let record = VideoRecord::new("A cat learns to surf.");

    Mock::given(method("POST"))
        .and(path("/rest/v1/videos"))
        .and(header("Prefer", "return=representation"))
        .respond_with(ResponseTemplate::new(201).set_body_json(row_json(&record)))
        .mount(&server)
        .await;

    let stored = store_for(&server).insert(&record).await.unwrap();
    assert_eq!(stored.id, record.id);
    assert_eq!(stored.status, VideoStatus::Created);
}

#[tokio::test]
async fn test_get_maps_empty_array_to_not_found() {
    let server = MockServer::start().await;
    let record = VideoRecord::new("premise");

    Mock::given(method("GET"))
        .and(path("/rest/v1/videos"))
        .and(query_param("id", format!("eq.{}", record.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let err = store_for(&server).get(&record.id).await.unwrap_err();
    assert!(matches!(err, StateError::NotFound(_)));
}

#[tokio::test]
async fn test_update_patches_row() {
    let server = MockServer::start().await;
    let mut record = VideoRecord::new("premise");
    record.status = VideoStatus::ScriptGenerating;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/videos"))
        .and(query_param("id", format!("eq.{}", record.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(row_json(&record)))
        .mount(&server)
        .await;

    let patch = VideoPatch::status(VideoStatus::ScriptGenerating);
    let updated = store_for(&server).update(&record.id, &patch).await.unwrap();
    assert_eq!(updated.status, VideoStatus::ScriptGenerating);
}

#[tokio::test]
async fn test_update_retries_transient_then_succeeds() {
    let server = MockServer::start().await;
    let record = VideoRecord::new("premise");

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/videos"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/videos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(row_json(&record)))
        .mount(&server)
        .await;

    let updated = store_for(&server)
        .update(&record.id, &VideoPatch::new())
        .await
        .unwrap();
    assert_eq!(updated.id, record.id);
}

#[tokio::test]
async fn test_record_round_trips_through_row_json() {
    let mut record = VideoRecord::new("premise");
    record.status = VideoStatus::AssetsGenerating;
    record.image_urls = vec!["https://img/1".into(), String::new()];
    record.dirty_scenes = [1u32].into_iter().collect();
    record.image_upload_progress = 50;

    let json = serde_json::to_string(&record).unwrap();
    let back: VideoRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(back.status, VideoStatus::AssetsGenerating);
    assert_eq!(back.image_urls.len(), 2);
    assert!(back.dirty_scenes.contains(&1));
}
