//! Caller-side retry around a pipeline run.
//!
//! Only transport failures are retried, with exponential backoff. Upstream,
//! schema and store failures need an operator and are returned at once.

use std::time::Duration;

use ingestion::{IngestionError, IngestionPipeline, IngestionResult};
use tracing::warn;

/// Backoff settings for transport failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry (doubles each retry)
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self::with_max_retries(0)
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// Run the pipeline, retrying transport failures per `policy`.
pub async fn run_with_retry(
    pipeline: &IngestionPipeline,
    policy: &RetryPolicy,
) -> Result<IngestionResult, IngestionError> {
    let mut retry_count = 0;

    loop {
        match pipeline.run().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_retryable() && retry_count < policy.max_retries => {
                retry_count += 1;
                let delay = policy.delay_for(retry_count);

                warn!(
                    error = %e,
                    retry = retry_count,
                    max_retries = policy.max_retries,
                    delay_secs = delay.as_secs_f64(),
                    "Feed unreachable, retrying"
                );

                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
