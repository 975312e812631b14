//! HTTP server for the ingester service.
//!
//! Provides endpoints for:
//! - `POST /ingest` - Run ingestion now
//! - `GET /weather` - Dashboard view of the stored snapshot
//! - `GET /status` - Active/recent runs
//! - `GET /health` - Health check
//! - `GET /metrics` - Prometheus metrics

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

use ingestion::{IngestionError, IngestionPipeline, IngestionResult};
use storage::Snapshot;
use weather_common::{FeedMode, TableView};

use crate::retry::{run_with_retry, RetryPolicy};
use crate::tracker::{IngestionTracker, RunFailure, RunTrigger, TrackerStatus};

/// Shared state for the HTTP server.
pub struct ServerState {
    pub pipeline: IngestionPipeline,
    pub tracker: IngestionTracker,
    pub retry: RetryPolicy,
    /// Held for the whole of a run; runs never overlap
    run_lock: Mutex<()>,
    metrics: Option<PrometheusHandle>,
}

impl ServerState {
    pub fn new(pipeline: IngestionPipeline, retry: RetryPolicy) -> Self {
        Self {
            pipeline,
            tracker: IngestionTracker::new(),
            retry,
            run_lock: Mutex::new(()),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Run ingestion once (with retries), serialized against other runs.
pub async fn run_ingestion(
    state: &ServerState,
    trigger: RunTrigger,
) -> (String, Result<IngestionResult, IngestionError>) {
    let _guard = state.run_lock.lock().await;

    let id = Uuid::new_v4().to_string();
    info!(id = %id, trigger = ?trigger, "Starting ingestion run");

    state.tracker.start(&id, trigger).await;
    let outcome = run_with_retry(&state.pipeline, &state.retry).await;
    state.tracker.complete(&id, &outcome).await;

    if let Err(e) = &outcome {
        error!(id = %id, kind = e.kind(), error = %e, "Ingestion run failed");
    }

    (id, outcome)
}

/// Response body for /ingest endpoint.
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub run_id: String,
    /// `complete`, `partial` or `failed`
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<IngestionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RunFailure>,
}

/// Response body for /weather endpoint.
#[derive(Debug, Serialize)]
pub struct WeatherResponse {
    /// `no_database`, `empty`, `ready` or `ingestion_failed`
    pub state: &'static str,
    pub message: String,
    pub mode: FeedMode,
    /// Stored snapshot; still present after a failed run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<TableView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_ingested_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<RunFailure>,
}

/// Response for /status endpoint.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub mode: FeedMode,
    pub database: String,
    pub last_ingested_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub runs: TrackerStatus,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

fn failure_status(err: &IngestionError) -> StatusCode {
    match err {
        IngestionError::Feed(_) | IngestionError::Schema { .. } => StatusCode::BAD_GATEWAY,
        IngestionError::Store(_) | IngestionError::InvalidConfig(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn internal_error(message: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

/// POST /ingest - Run ingestion now
async fn ingest_handler(Extension(state): Extension<Arc<ServerState>>) -> Response {
    let (run_id, outcome) = run_ingestion(&state, RunTrigger::Manual).await;

    match outcome {
        Ok(result) => {
            let response = IngestResponse {
                run_id,
                status: result.status().as_str().to_string(),
                result: Some(result),
                error: None,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            let response = IngestResponse {
                run_id,
                status: "failed".to_string(),
                result: None,
                error: Some(RunFailure::from(&e)),
            };
            (failure_status(&e), Json(response)).into_response()
        }
    }
}

/// GET /weather - Current snapshot with a display state
async fn weather_handler(Extension(state): Extension<Arc<ServerState>>) -> Response {
    let store = state.pipeline.store();

    let snapshot = match store.snapshot().await {
        Ok(snapshot) => snapshot,
        Err(e) => return internal_error(e.to_string()),
    };
    let last_ingested_at = match store.last_ingested_at().await {
        Ok(at) => at,
        Err(e) => return internal_error(e.to_string()),
    };
    let last_failure = state.tracker.last_failure().await;

    let (view_state, message, table) = match (last_failure.as_ref(), snapshot) {
        (Some(run), snapshot) => {
            let detail = run
                .error
                .as_ref()
                .map(|e| e.message.clone())
                .unwrap_or_default();
            let table = match snapshot {
                Snapshot::Ready(table) => Some(table),
                _ => None,
            };
            (
                "ingestion_failed",
                format!("The last ingestion run failed: {}", detail),
                table,
            )
        }
        (None, Snapshot::NotInitialized) => (
            "no_database",
            "No data yet: ingestion has never run. POST /ingest to fetch the feed.".to_string(),
            None,
        ),
        (None, Snapshot::Empty) => (
            "empty",
            "The last ingestion run stored no records.".to_string(),
            Some(TableView::from_records(store.mode(), &[])),
        ),
        (None, Snapshot::Ready(table)) => {
            let message = format!("{} locations", table.len());
            ("ready", message, Some(table))
        }
    };

    Json(WeatherResponse {
        state: view_state,
        message,
        mode: store.mode(),
        table,
        last_ingested_at,
        last_error: last_failure.and_then(|run| run.error),
    })
    .into_response()
}

/// GET /status - Run history and store summary
async fn status_handler(Extension(state): Extension<Arc<ServerState>>) -> Response {
    let store = state.pipeline.store();
    let last_ingested_at = match store.last_ingested_at().await {
        Ok(at) => at,
        Err(e) => return internal_error(e.to_string()),
    };

    Json(StatusResponse {
        mode: store.mode(),
        database: store.path().display().to_string(),
        last_ingested_at,
        runs: state.tracker.get_status().await,
    })
    .into_response()
}

/// GET /health - Health check
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "ingester".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /metrics - Prometheus metrics
async fn metrics_handler(Extension(state): Extension<Arc<ServerState>>) -> impl IntoResponse {
    let body = state
        .metrics
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default();

    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4",
        )],
        body,
    )
}

/// Build the HTTP router.
pub fn build_router(state: Arc<ServerState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ingest", post(ingest_handler))
        .route("/weather", get(weather_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(Extension(state))
}

/// Start the HTTP server.
pub async fn start_server(state: Arc<ServerState>, port: u16) -> anyhow::Result<()> {
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(port = port, "Starting ingester HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
