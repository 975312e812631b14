//! Storage for the weather feed services.
//!
//! A single SQLite table holds the latest ingested snapshot. Writers
//! replace it wholesale inside one transaction; readers (the dashboard)
//! query it concurrently and only ever see committed snapshots.

pub mod error;
pub mod weather_store;

pub use error::{StoreError, StoreResult};
pub use weather_store::{Snapshot, WeatherStore, TABLE_NAME};
