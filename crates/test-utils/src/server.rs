//! Local mock of the upstream feed.
//!
//! Answers every request with a configurable status and body, optionally
//! after a delay, and records the query parameters of each request.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use serde_json::Value;
use tokio::task::JoinHandle;

/// What the mock feed sends back.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub body: String,
    pub delay: Option<Duration>,
}

impl MockResponse {
    /// `200 OK` with the given JSON document.
    pub fn json(body: Value) -> Self {
        Self {
            status: 200,
            body: body.to_string(),
            delay: None,
        }
    }

    /// Arbitrary status and raw body.
    pub fn raw(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

struct FeedState {
    response: Mutex<MockResponse>,
    requests: Mutex<Vec<HashMap<String, String>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A running mock feed bound to an ephemeral localhost port.
///
/// The server task is aborted when this is dropped.
pub struct MockFeed {
    url: String,
    state: Arc<FeedState>,
    handle: JoinHandle<()>,
}

impl MockFeed {
    /// Start serving `response` on `127.0.0.1:<ephemeral>`.
    pub async fn start(response: MockResponse) -> Self {
        let state = Arc::new(FeedState {
            response: Mutex::new(response),
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .fallback(serve_feed)
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock feed listener");
        let addr = listener.local_addr().expect("mock feed local address");

        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            url: format!("http://{}/api/v1/rest/datastore/F-C0032-001", addr),
            state,
            handle,
        }
    }

    /// Endpoint URL to put in the client configuration.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Replace the response for subsequent requests.
    pub fn respond_with(&self, response: MockResponse) {
        *lock(&self.state.response) = response;
    }

    /// Query parameters of every request received so far.
    pub fn requests(&self) -> Vec<HashMap<String, String>> {
        lock(&self.state.requests).clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.state.requests).len()
    }
}

impl Drop for MockFeed {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve_feed(
    State(state): State<Arc<FeedState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    lock(&state.requests).push(params);
    let response = lock(&state.response).clone();

    if let Some(delay) = response.delay {
        tokio::time::sleep(delay).await;
    }

    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        response.body,
    )
        .into_response()
}
