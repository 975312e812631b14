//! The "run ingestion now" operation.

use std::time::Instant;

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use serde::Serialize;
use tracing::{info, instrument, warn};

use storage::WeatherStore;
use weather_common::FeedMode;

use crate::client::{FeedClient, FeedSource};
use crate::config::IngestionConfig;
use crate::error::{IngestionError, Result};
use crate::extract::extract_records;
use crate::shapes::{resolve_locations, FeedShape};

/// Overall outcome of a run that stored a new snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every location became a record (duplicates aside)
    Complete,
    /// At least one location was skipped
    Partial,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Complete => "complete",
            RunStatus::Partial => "partial",
        }
    }
}

/// Result of a successful ingestion run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionResult {
    pub records_written: usize,
    /// Entries in the feed's location list
    pub locations_seen: usize,
    pub locations_skipped: usize,
    pub duplicates_dropped: usize,
    pub shape: FeedShape,
    pub mode: FeedMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl IngestionResult {
    pub fn status(&self) -> RunStatus {
        if self.locations_skipped > 0 {
            RunStatus::Partial
        } else {
            RunStatus::Complete
        }
    }
}

/// Fetch, resolve, extract and store, in that order.
///
/// Any run-level failure returns before the store is written, so the
/// previous snapshot survives every error this returns.
pub struct IngestionPipeline {
    source: Box<dyn FeedSource>,
    store: WeatherStore,
}

impl IngestionPipeline {
    pub fn new(source: Box<dyn FeedSource>, store: WeatherStore) -> Self {
        Self { source, store }
    }

    /// Build the HTTP feed client and open the configured store.
    pub async fn from_config(config: &IngestionConfig) -> Result<Self> {
        let client = FeedClient::new(config)?;
        let store = WeatherStore::open(&config.db_path, config.mode).await?;
        Ok(Self::new(Box::new(client), store))
    }

    pub fn store(&self) -> &WeatherStore {
        &self.store
    }

    pub fn mode(&self) -> FeedMode {
        self.store.mode()
    }

    /// Run one ingestion.
    #[instrument(skip(self), fields(mode = %self.mode()))]
    pub async fn run(&self) -> Result<IngestionResult> {
        let started_at = Utc::now();
        let timer = Instant::now();

        let result = self.run_inner(started_at).await;

        histogram!("ingestion_run_duration_seconds").record(timer.elapsed().as_secs_f64());
        match &result {
            Ok(result) => {
                counter!("ingestion_runs_total", "outcome" => result.status().as_str())
                    .increment(1);
                counter!("ingestion_records_written_total")
                    .increment(result.records_written as u64);
                counter!("ingestion_locations_skipped_total")
                    .increment(result.locations_skipped as u64);
            }
            Err(e) => {
                counter!("ingestion_runs_total", "outcome" => "failed").increment(1);
                warn!(kind = e.kind(), error = %e, "Ingestion run failed");
            }
        }

        result
    }

    async fn run_inner(&self, started_at: DateTime<Utc>) -> Result<IngestionResult> {
        let mode = self.mode();
        let payload = self.source.fetch().await?;

        let resolved = resolve_locations(&payload.body).ok_or_else(|| {
            let tried: Vec<String> = FeedShape::PROBE_ORDER
                .iter()
                .map(|shape| shape.path_description())
                .collect();
            IngestionError::Schema {
                message: format!("no location list found at {}", tried.join(", ")),
                excerpt: payload.excerpt.clone(),
            }
        })?;

        if resolved.shape.mode() != mode {
            return Err(IngestionError::Schema {
                message: format!(
                    "feed has {} shape ({} records) but this store holds {} records",
                    resolved.shape,
                    resolved.shape.mode(),
                    mode
                ),
                excerpt: payload.excerpt.clone(),
            });
        }

        let outcome = extract_records(&resolved, mode, started_at);

        self.store.initialize().await?;
        let records_written = self
            .store
            .replace_all(&outcome.records, started_at)
            .await?;

        let result = IngestionResult {
            records_written,
            locations_seen: resolved.entries.len(),
            locations_skipped: outcome.skipped.len(),
            duplicates_dropped: outcome.duplicates.len(),
            shape: resolved.shape,
            mode,
            started_at,
            finished_at: Utc::now(),
        };

        info!(
            shape = %result.shape,
            seen = result.locations_seen,
            written = result.records_written,
            skipped = result.locations_skipped,
            duplicates = result.duplicates_dropped,
            status = result.status().as_str(),
            "Ingestion run completed"
        );

        Ok(result)
    }
}
