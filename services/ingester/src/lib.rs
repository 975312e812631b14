//! Weather feed ingester service library.
//!
//! This module exposes the internal modules for testing purposes.

pub mod retry;
pub mod server;
pub mod tracker;

pub use retry::{run_with_retry, RetryPolicy};
pub use server::{build_router, run_ingestion, start_server, ServerState};
pub use tracker::{IngestionTracker, RunTrigger};
