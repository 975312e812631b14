//! Tests for the ingester HTTP API.
//!
//! Each test runs the real router against a local mock feed and a
//! throwaway SQLite database.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use ingester::{build_router, RetryPolicy, ServerState};
use ingestion::{IngestionConfig, IngestionPipeline};
use test_utils::*;

struct Harness {
    _dir: TempDir,
    feed: MockFeed,
    app: Router,
}

async fn harness(response: MockResponse) -> Harness {
    let dir = TempDir::new().unwrap();
    let feed = MockFeed::start(response).await;

    let mut config = IngestionConfig::new(feed.url(), "CWA-TEST-KEY");
    config.db_path = dir.path().join("data.db");
    config.request_timeout_secs = 1;

    let pipeline = IngestionPipeline::from_config(&config).await.unwrap();
    let state = Arc::new(ServerState::new(pipeline, RetryPolicy::none()));

    Harness {
        _dir: dir,
        feed,
        app: build_router(state),
    }
}

async fn call(app: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

// ============================================================================
// /weather display states
// ============================================================================

#[tokio::test]
async fn test_weather_before_first_run() {
    let h = harness(MockResponse::json(sample_region_forecast())).await;

    let (status, body) = call(&h.app, "GET", "/weather").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "no_database");
    assert!(body.get("table").is_none());
    assert_eq!(h.feed.request_count(), 0);
}

#[tokio::test]
async fn test_ingest_then_weather_ready() {
    let h = harness(MockResponse::json(sample_region_forecast())).await;

    let (status, body) = call(&h.app, "POST", "/ingest").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "complete");
    assert_eq!(body["result"]["records_written"], 2);
    assert_eq!(body["result"]["shape"], "region_forecast");

    let (status, body) = call(&h.app, "GET", "/weather").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "ready");
    assert_eq!(body["mode"], "forecast");
    assert_eq!(body["table"]["columns"][0], "Location");
    assert_eq!(body["table"]["columns"][1], "Min Temperature (°C)");
    assert_eq!(body["table"]["rows"][0][0], "Taipei");
    assert_eq!(body["table"]["rows"][1][0], "Kaohsiung");
    assert!(body["last_ingested_at"].is_string());
}

#[tokio::test]
async fn test_partial_run_and_empty_state() {
    let payload = region_forecast_payload(vec![region_forecast_location_without("Taipei", "MaxT")]);
    let h = harness(MockResponse::json(payload)).await;

    let (status, body) = call(&h.app, "POST", "/ingest").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "partial");
    assert_eq!(body["result"]["records_written"], 0);
    assert_eq!(body["result"]["locations_skipped"], 1);

    let (_, body) = call(&h.app, "GET", "/weather").await;
    assert_eq!(body["state"], "empty");
    assert_eq!(body["table"]["rows"].as_array().unwrap().len(), 0);
    assert!(body["last_ingested_at"].is_string());

    let (_, status) = call(&h.app, "GET", "/status").await;
    assert_eq!(status["last_ingested_at"], body["last_ingested_at"]);
}

#[tokio::test]
async fn test_failed_run_keeps_table_and_shows_excerpt() {
    let h = harness(MockResponse::json(sample_region_forecast())).await;
    call(&h.app, "POST", "/ingest").await;

    h.feed.respond_with(MockResponse::json(failure_payload()));
    let (status, body) = call(&h.app, "POST", "/ingest").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["status"], "failed");
    assert_eq!(body["error"]["kind"], "upstream");

    let (_, body) = call(&h.app, "GET", "/weather").await;
    assert_eq!(body["state"], "ingestion_failed");
    assert!(body["last_error"]["excerpt"]
        .as_str()
        .unwrap()
        .contains("Authorization key is invalid"));
    assert_eq!(body["table"]["rows"].as_array().unwrap().len(), 2);

    // A later success clears the failure state.
    h.feed.respond_with(MockResponse::json(sample_region_forecast()));
    call(&h.app, "POST", "/ingest").await;
    let (_, body) = call(&h.app, "GET", "/weather").await;
    assert_eq!(body["state"], "ready");
    assert!(body.get("last_error").is_none());
}

#[tokio::test]
async fn test_schema_failure_is_bad_gateway() {
    let h = harness(MockResponse::json(unknown_shape_payload())).await;

    let (status, body) = call(&h.app, "POST", "/ingest").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["kind"], "schema");

    let (_, body) = call(&h.app, "GET", "/weather").await;
    assert_eq!(body["state"], "ingestion_failed");
    assert!(body.get("table").is_none());
}

// ============================================================================
// /status, /health, /metrics
// ============================================================================

#[tokio::test]
async fn test_status_lists_runs() {
    let h = harness(MockResponse::json(sample_region_forecast())).await;
    call(&h.app, "POST", "/ingest").await;

    let (status, body) = call(&h.app, "GET", "/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "forecast");
    assert_eq!(body["total_completed"], 1);
    assert_eq!(body["recent"][0]["status"], "complete");
    assert_eq!(body["recent"][0]["trigger"], "manual");
    assert_eq!(body["recent"][0]["records_written"], 2);
    assert!(body["active"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_health() {
    let h = harness(MockResponse::json(sample_region_forecast())).await;

    let (status, body) = call(&h.app, "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "ingester");
}

#[tokio::test]
async fn test_metrics_without_recorder_is_empty() {
    let h = harness(MockResponse::json(sample_region_forecast())).await;

    let response = h
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(bytes.is_empty());
}
