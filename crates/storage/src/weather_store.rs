//! Snapshot store for ingested weather records using SQLite with sqlx.
//!
//! Holds exactly one table, `weather`, whose layout is fixed by the
//! deployment's [`FeedMode`]. Every ingestion run swaps the whole table
//! contents inside a single transaction, and the database runs in WAL mode
//! so concurrent readers keep seeing the last committed snapshot until the
//! swap commits.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info, warn};

use weather_common::{FeedMode, Reading, TableView, WeatherRecord};

use crate::error::{StoreError, StoreResult};

/// Name of the single table holding the current snapshot.
pub const TABLE_NAME: &str = "weather";

const FORECAST_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS weather (
        location TEXT NOT NULL PRIMARY KEY CHECK (length(location) > 0),
        position INTEGER NOT NULL,
        min_temperature REAL NOT NULL,
        max_temperature REAL NOT NULL,
        description TEXT NOT NULL CHECK (length(description) > 0),
        observed_at TEXT NOT NULL,
        ingested_at TEXT NOT NULL
    )
"#;

const OBSERVATION_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS weather (
        location TEXT NOT NULL PRIMARY KEY CHECK (length(location) > 0),
        position INTEGER NOT NULL,
        temperature REAL NOT NULL,
        description TEXT,
        observed_at TEXT NOT NULL,
        ingested_at TEXT NOT NULL
    )
"#;

fn schema_sql(mode: FeedMode) -> &'static str {
    match mode {
        FeedMode::Forecast => FORECAST_SCHEMA,
        FeedMode::Observation => OBSERVATION_SCHEMA,
    }
}

/// What the display layer should show.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    /// No table yet: ingestion has never run against this database.
    NotInitialized,
    /// The last successful run stored zero records.
    Empty,
    Ready(TableView),
}

/// Accessor for the weather snapshot table.
#[derive(Debug, Clone)]
pub struct WeatherStore {
    pool: SqlitePool,
    mode: FeedMode,
    path: PathBuf,
}

impl WeatherStore {
    /// Open (creating the file if needed) the database at `path`.
    ///
    /// This does not create the table; call [`WeatherStore::initialize`].
    pub async fn open(path: &Path, mode: FeedMode) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        info!(path = %path.display(), mode = %mode, "Opened weather database");

        Ok(Self {
            pool,
            mode,
            path: path.to_path_buf(),
        })
    }

    pub fn mode(&self) -> FeedMode {
        self.mode
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensure the table exists. Safe to call before every run.
    pub async fn initialize(&self) -> StoreResult<()> {
        let columns = self.table_columns().await?;

        if columns.is_empty() {
            sqlx::query(schema_sql(self.mode)).execute(&self.pool).await?;
            info!(table = TABLE_NAME, mode = %self.mode, "Created weather table");
            return Ok(());
        }

        self.check_layout(&columns)?;
        debug!(table = TABLE_NAME, "Weather table already present");
        Ok(())
    }

    /// Drop and recreate the table. Destroys the stored dataset.
    pub async fn reinitialize(&self) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DROP TABLE IF EXISTS weather")
            .execute(&mut *tx)
            .await?;
        sqlx::query(schema_sql(self.mode)).execute(&mut *tx).await?;
        sqlx::query(&user_version_pragma(0))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        warn!(
            path = %self.path.display(),
            mode = %self.mode,
            "Reinitialized weather table, previous dataset discarded"
        );
        Ok(())
    }

    /// Atomically replace the stored dataset with `records`.
    ///
    /// Either every record becomes visible at commit, or (on any error)
    /// the transaction rolls back and the previous dataset stays intact.
    /// Records are stored in the given order, stamped with `ingested_at`,
    /// which is also kept in the database header so an empty snapshot still
    /// reports when it was written.
    pub async fn replace_all(
        &self,
        records: &[WeatherRecord],
        ingested_at: DateTime<Utc>,
    ) -> StoreResult<usize> {
        if let Some(record) = records.iter().find(|r| r.mode() != self.mode) {
            return Err(StoreError::ModeMismatch {
                location: record.location.clone(),
                expected: self.mode,
                found: record.mode(),
            });
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM weather").execute(&mut *tx).await?;
        sqlx::query(&user_version_pragma(header_seconds(ingested_at)))
            .execute(&mut *tx)
            .await?;

        let ingested_at = ingested_at.to_rfc3339();

        for (position, record) in records.iter().enumerate() {
            let observed_at = record.observed_at.to_rfc3339();

            match &record.reading {
                Reading::Forecast {
                    min_temperature,
                    max_temperature,
                    description,
                } => {
                    sqlx::query(
                        r#"
                        INSERT INTO weather (
                            location, position, min_temperature, max_temperature,
                            description, observed_at, ingested_at
                        ) VALUES (?, ?, ?, ?, ?, ?, ?)
                        "#,
                    )
                    .bind(&record.location)
                    .bind(position as i64)
                    .bind(*min_temperature)
                    .bind(*max_temperature)
                    .bind(description)
                    .bind(&observed_at)
                    .bind(&ingested_at)
                    .execute(&mut *tx)
                    .await?;
                }
                Reading::Observation {
                    temperature,
                    description,
                } => {
                    sqlx::query(
                        r#"
                        INSERT INTO weather (
                            location, position, temperature,
                            description, observed_at, ingested_at
                        ) VALUES (?, ?, ?, ?, ?, ?)
                        "#,
                    )
                    .bind(&record.location)
                    .bind(position as i64)
                    .bind(*temperature)
                    .bind(description.as_deref())
                    .bind(&observed_at)
                    .bind(&ingested_at)
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        tx.commit().await?;

        debug!(count = records.len(), "Replaced weather snapshot");
        Ok(records.len())
    }

    /// All stored records in feed order.
    pub async fn query_all(&self) -> StoreResult<Vec<WeatherRecord>> {
        let columns = self.table_columns().await?;
        if columns.is_empty() {
            return Err(StoreError::NotInitialized(self.path.display().to_string()));
        }
        self.check_layout(&columns)?;

        match self.mode {
            FeedMode::Forecast => {
                let rows: Vec<(String, f64, f64, String, String)> = sqlx::query_as(
                    r#"
                    SELECT location, min_temperature, max_temperature, description, observed_at
                    FROM weather
                    ORDER BY position ASC
                    "#,
                )
                .fetch_all(&self.pool)
                .await?;

                rows.into_iter()
                    .map(|(location, min, max, description, observed_at)| {
                        let observed_at = parse_stored_time(&observed_at, &location)?;
                        Ok(WeatherRecord::forecast(
                            location,
                            min,
                            max,
                            description,
                            observed_at,
                        ))
                    })
                    .collect()
            }
            FeedMode::Observation => {
                let rows: Vec<(String, f64, Option<String>, String)> = sqlx::query_as(
                    r#"
                    SELECT location, temperature, description, observed_at
                    FROM weather
                    ORDER BY position ASC
                    "#,
                )
                .fetch_all(&self.pool)
                .await?;

                rows.into_iter()
                    .map(|(location, temperature, description, observed_at)| {
                        let observed_at = parse_stored_time(&observed_at, &location)?;
                        Ok(WeatherRecord::observation(
                            location,
                            temperature,
                            description,
                            observed_at,
                        ))
                    })
                    .collect()
            }
        }
    }

    /// All stored records as a labelled table.
    pub async fn query_table(&self) -> StoreResult<TableView> {
        let records = self.query_all().await?;
        Ok(TableView::from_records(self.mode, &records))
    }

    /// Classify the stored state for the display layer.
    pub async fn snapshot(&self) -> StoreResult<Snapshot> {
        match self.query_table().await {
            Ok(table) if table.is_empty() => Ok(Snapshot::Empty),
            Ok(table) => Ok(Snapshot::Ready(table)),
            Err(StoreError::NotInitialized(_)) => Ok(Snapshot::NotInitialized),
            Err(e) => Err(e),
        }
    }

    /// When the stored snapshot was written, if there is one.
    pub async fn last_ingested_at(&self) -> StoreResult<Option<DateTime<Utc>>> {
        if self.table_columns().await?.is_empty() {
            return Ok(None);
        }

        let row: (Option<String>,) = sqlx::query_as("SELECT MAX(ingested_at) FROM weather")
            .fetch_one(&self.pool)
            .await?;
        if let Some(value) = row.0 {
            return parse_stored_time(&value, "<snapshot>").map(Some);
        }

        // No rows: fall back to the time of the last (empty) replace.
        let (version,): (i64,) = sqlx::query_as("PRAGMA user_version")
            .fetch_one(&self.pool)
            .await?;
        let seconds = i64::from(version as i32 as u32);
        if seconds == 0 {
            return Ok(None);
        }
        Ok(DateTime::from_timestamp(seconds, 0))
    }

    /// Close the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn table_columns(&self) -> StoreResult<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM pragma_table_info('weather')")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    fn check_layout(&self, columns: &[String]) -> StoreResult<()> {
        let has = |name: &str| columns.iter().any(|c| c == name);

        let found = if has("min_temperature") && has("max_temperature") {
            Some(FeedMode::Forecast)
        } else if has("temperature") {
            Some(FeedMode::Observation)
        } else {
            None
        };

        match found {
            Some(mode) if mode == self.mode => Ok(()),
            Some(mode) => Err(StoreError::SchemaMismatch {
                expected: self.mode,
                found: mode.to_string(),
            }),
            None => Err(StoreError::SchemaMismatch {
                expected: self.mode,
                found: format!("unrecognized ({})", columns.join(", ")),
            }),
        }
    }
}

/// `user_version` is a signed 32-bit header field; its bits hold unsigned
/// Unix seconds.
fn header_seconds(at: DateTime<Utc>) -> i32 {
    at.timestamp().clamp(0, i64::from(u32::MAX)) as u32 as i32
}

fn user_version_pragma(value: i32) -> String {
    format!("PRAGMA user_version = {}", value)
}

fn parse_stored_time(value: &str, location: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| {
            StoreError::CorruptRow(format!("bad timestamp '{}' for '{}': {}", value, location, e))
        })
}
