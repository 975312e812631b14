//! Weather feed ingestion library.
//!
//! Fetches the upstream weather feed, locates its location list under any
//! of the known response shapes, extracts one validated record per
//! location and atomically replaces the local snapshot store.
//!
//! # Architecture
//!
//! - [`client`]: the outbound HTTP request and top-level success check
//! - [`shapes`]: ordered probes that normalize each known response shape
//! - [`extract`]: per-location field extraction and validation
//! - [`pipeline`]: the "run ingestion" entry point tying it together
//!
//! Per-location failures are logged and counted; only transport, upstream,
//! schema and store failures abort a run, and an aborted run never touches
//! the stored dataset.

pub mod client;
pub mod config;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod shapes;

// Re-exports
pub use client::{FeedClient, FeedSource, RawPayload};
pub use config::IngestionConfig;
pub use error::{FeedError, IngestionError, RecordError, Result, EXCERPT_LIMIT};
pub use extract::{extract_records, ExtractionOutcome, SkippedLocation};
pub use pipeline::{IngestionPipeline, IngestionResult, RunStatus};
pub use shapes::{resolve_locations, FeedShape, ResolvedFeed};
