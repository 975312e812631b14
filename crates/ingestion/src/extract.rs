//! Per-location record extraction.
//!
//! Every location is extracted independently: a missing element, a
//! non-numeric value or an implausible temperature skips that location
//! only. Only the first time bucket of each element is read, so forecast
//! rows always describe the nearest forecast period.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use weather_common::{is_plausible_temperature, parse_feed_timestamp, FeedMode, WeatherRecord};

use crate::error::RecordError;
use crate::shapes::{LocationEntry, ResolvedFeed};

/// Logical element keys per feed mode.
pub mod element_keys {
    /// Forecast minimum temperature
    pub const MIN_TEMPERATURE: &str = "MinT";
    /// Forecast maximum temperature
    pub const MAX_TEMPERATURE: &str = "MaxT";
    /// Forecast weather description
    pub const FORECAST_DESCRIPTION: &str = "Wx";
    /// Station instantaneous air temperature
    pub const TEMPERATURE: &str = "AirTemperature";
    /// Station weather description
    pub const OBSERVATION_DESCRIPTION: &str = "Weather";
}

/// Value the stations report for "no reading".
const MISSING_SENTINEL: &str = "-99";

/// A location that was not turned into a record.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedLocation {
    pub index: usize,
    pub name: Option<String>,
    pub error: RecordError,
}

/// Records extracted from one payload, plus what was left out.
#[derive(Debug, Clone, Default)]
pub struct ExtractionOutcome {
    /// Valid records in feed order, unique by location
    pub records: Vec<WeatherRecord>,
    pub skipped: Vec<SkippedLocation>,
    /// Later repeats of an already-seen location name
    pub duplicates: Vec<String>,
}

/// Extract one record per valid location; first occurrence of a name wins.
///
/// `ingested_at` stands in for entries without their own timestamp.
pub fn extract_records(
    resolved: &ResolvedFeed,
    mode: FeedMode,
    ingested_at: DateTime<Utc>,
) -> ExtractionOutcome {
    let mut outcome = ExtractionOutcome::default();
    let mut seen = HashSet::new();

    for entry in &resolved.entries {
        match extract_record(entry, mode, ingested_at) {
            Ok(record) => {
                if seen.insert(record.location.clone()) {
                    outcome.records.push(record);
                } else {
                    warn!(
                        index = entry.index,
                        location = %record.location,
                        "Dropping duplicate location"
                    );
                    outcome.duplicates.push(record.location);
                }
            }
            Err(error) => {
                warn!(
                    index = entry.index,
                    location = entry.name.as_deref().unwrap_or("<unnamed>"),
                    error = %error,
                    "Skipping location"
                );
                outcome.skipped.push(SkippedLocation {
                    index: entry.index,
                    name: entry.name.clone(),
                    error,
                });
            }
        }
    }

    outcome
}

/// Extract and validate a single location.
pub fn extract_record(
    entry: &LocationEntry,
    mode: FeedMode,
    ingested_at: DateTime<Utc>,
) -> Result<WeatherRecord, RecordError> {
    let name = entry.name.clone().ok_or(RecordError::MissingName)?;
    let observed_at = observed_at(entry, ingested_at);

    match mode {
        FeedMode::Forecast => {
            let min = temperature(entry, element_keys::MIN_TEMPERATURE)?;
            let max = temperature(entry, element_keys::MAX_TEMPERATURE)?;
            let description = required_text(entry, element_keys::FORECAST_DESCRIPTION)?;

            if min > max {
                return Err(RecordError::InvertedRange { min, max });
            }

            Ok(WeatherRecord::forecast(name, min, max, description, observed_at))
        }
        FeedMode::Observation => {
            let value = temperature(entry, element_keys::TEMPERATURE)?;
            let description = optional_text(entry, element_keys::OBSERVATION_DESCRIPTION);

            Ok(WeatherRecord::observation(name, value, description, observed_at))
        }
    }
}

fn observed_at(entry: &LocationEntry, ingested_at: DateTime<Utc>) -> DateTime<Utc> {
    match entry.observed_at.as_deref() {
        Some(raw) => parse_feed_timestamp(raw).unwrap_or_else(|e| {
            debug!(index = entry.index, error = %e, "Unparseable feed timestamp, using ingestion time");
            ingested_at
        }),
        None => ingested_at,
    }
}

fn element_value<'a>(entry: &'a LocationEntry, key: &str) -> Result<&'a Value, RecordError> {
    entry
        .element(key)
        .and_then(|e| e.value.as_ref())
        .filter(|v| !v.is_null())
        .ok_or_else(|| RecordError::MissingElement(key.to_string()))
}

fn temperature(entry: &LocationEntry, key: &str) -> Result<f64, RecordError> {
    let value = parse_number(key, element_value(entry, key)?)?;

    if !is_plausible_temperature(value) {
        return Err(RecordError::Implausible {
            element: key.to_string(),
            value,
        });
    }

    Ok(value)
}

/// Accept JSON numbers and numeric strings; reject anything not finite.
fn parse_number(key: &str, value: &Value) -> Result<f64, RecordError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| RecordError::NotNumeric {
            element: key.to_string(),
            value: value.to_string(),
        })
}

fn required_text(entry: &LocationEntry, key: &str) -> Result<String, RecordError> {
    element_value(entry, key)?
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| RecordError::EmptyText(key.to_string()))
}

fn optional_text(entry: &LocationEntry, key: &str) -> Option<String> {
    entry
        .element(key)
        .and_then(|e| e.value.as_ref())
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != MISSING_SENTINEL)
        .map(str::to_string)
}
