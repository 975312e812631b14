//! Error types for the storage crate.

use thiserror::Error;
use weather_common::FeedMode;

/// Errors raised by [`crate::WeatherStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// The weather table does not exist yet (no ingestion has run).
    #[error("weather table not initialized in {0}")]
    NotInitialized(String),

    /// The existing table was created for the other feed mode.
    #[error(
        "stored table has {found} columns but the store is configured for {expected}; \
         reinitialize the database (this deletes the stored dataset)"
    )]
    SchemaMismatch { expected: FeedMode, found: String },

    /// A record of the wrong mode was handed to the store.
    #[error("record for '{location}' is a {found} reading but the store holds {expected} records")]
    ModeMismatch {
        location: String,
        expected: FeedMode,
        found: FeedMode,
    },

    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to prepare database path: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
