//! Tracking of active and recent ingestion runs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;

use ingestion::{IngestionError, IngestionResult};

/// What started a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunTrigger {
    /// `POST /ingest`
    Manual,
    /// Poll interval elapsed
    Scheduled,
}

/// An ingestion run in progress.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveRun {
    pub id: String,
    pub trigger: RunTrigger,
    pub started_at: DateTime<Utc>,
}

/// Why a run failed, with the diagnostics the dashboard shows.
#[derive(Debug, Clone, Serialize)]
pub struct RunFailure {
    pub kind: String,
    pub message: String,
    /// Raw response excerpt, when the feed sent something
    pub excerpt: Option<String>,
}

impl From<&IngestionError> for RunFailure {
    fn from(err: &IngestionError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
            excerpt: err.excerpt().map(str::to_string),
        }
    }
}

/// A finished ingestion run.
#[derive(Debug, Clone, Serialize)]
pub struct CompletedRun {
    pub id: String,
    pub trigger: RunTrigger,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// `complete`, `partial` or `failed`
    pub status: String,
    pub records_written: usize,
    pub locations_skipped: usize,
    pub error: Option<RunFailure>,
}

/// Response for /status endpoint.
#[derive(Debug, Serialize)]
pub struct TrackerStatus {
    pub active: Vec<ActiveRun>,
    pub recent: Vec<CompletedRun>,
    pub total_completed: usize,
}

/// Tracking for ingestion runs.
pub struct IngestionTracker {
    active: Mutex<HashMap<String, ActiveRun>>,
    completed: Mutex<VecDeque<CompletedRun>>,
    max_completed: usize,
}

impl Default for IngestionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestionTracker {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(HashMap::new()),
            completed: Mutex::new(VecDeque::new()),
            max_completed: 100,
        }
    }

    pub async fn start(&self, id: &str, trigger: RunTrigger) {
        let run = ActiveRun {
            id: id.to_string(),
            trigger,
            started_at: Utc::now(),
        };
        self.active.lock().await.insert(id.to_string(), run);
    }

    pub async fn complete(&self, id: &str, outcome: &Result<IngestionResult, IngestionError>) {
        let mut active = self.active.lock().await;
        let Some(run) = active.remove(id) else {
            return;
        };

        let completed_at = Utc::now();
        let duration_ms = (completed_at - run.started_at).num_milliseconds().max(0) as u64;

        let (status, records_written, locations_skipped, error) = match outcome {
            Ok(result) => (
                result.status().as_str().to_string(),
                result.records_written,
                result.locations_skipped,
                None,
            ),
            Err(e) => ("failed".to_string(), 0, 0, Some(RunFailure::from(e))),
        };

        let mut completed = self.completed.lock().await;
        completed.push_front(CompletedRun {
            id: run.id,
            trigger: run.trigger,
            started_at: run.started_at,
            completed_at,
            duration_ms,
            status,
            records_written,
            locations_skipped,
            error,
        });

        // Keep only recent entries
        while completed.len() > self.max_completed {
            completed.pop_back();
        }
    }

    /// Most recent finished run.
    pub async fn last_run(&self) -> Option<CompletedRun> {
        self.completed.lock().await.front().cloned()
    }

    /// The most recent run, if it failed.
    pub async fn last_failure(&self) -> Option<CompletedRun> {
        self.last_run().await.filter(|run| run.error.is_some())
    }

    pub async fn get_status(&self) -> TrackerStatus {
        let active = self.active.lock().await;
        let completed = self.completed.lock().await;

        TrackerStatus {
            active: active.values().cloned().collect(),
            recent: completed.iter().take(20).cloned().collect(),
            total_completed: completed.len(),
        }
    }
}
