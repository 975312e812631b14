//! Weather record types.
//!
//! A deployment consumes exactly one kind of feed, so every record in a
//! stored dataset carries the same [`Reading`] variant. [`FeedMode`] is the
//! tag that selects it and, through the store, the table layout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lowest plausible surface temperature (exclusive).
///
/// The upstream feed reports missing sensor values with sentinels such as
/// `-99` or `-999`, all of which fall at or below this bound.
pub const PLAUSIBLE_MIN_CELSIUS: f64 = -90.0;

/// Highest plausible surface temperature (inclusive).
pub const PLAUSIBLE_MAX_CELSIUS: f64 = 65.0;

/// Returns true when `value` is a finite temperature inside
/// `(PLAUSIBLE_MIN_CELSIUS, PLAUSIBLE_MAX_CELSIUS]`.
pub fn is_plausible_temperature(value: f64) -> bool {
    value.is_finite() && value > PLAUSIBLE_MIN_CELSIUS && value <= PLAUSIBLE_MAX_CELSIUS
}

/// Which record shape a deployment ingests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FeedMode {
    /// Min/max temperature forecasts with a condition description.
    #[default]
    Forecast,
    /// Instantaneous station temperature readings.
    Observation,
}

impl FeedMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedMode::Forecast => "forecast",
            FeedMode::Observation => "observation",
        }
    }
}

impl fmt::Display for FeedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "forecast" => Ok(FeedMode::Forecast),
            "observation" => Ok(FeedMode::Observation),
            other => Err(format!(
                "unknown feed mode '{}', expected 'forecast' or 'observation'",
                other
            )),
        }
    }
}

/// Measured or forecast values for one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Reading {
    Forecast {
        min_temperature: f64,
        max_temperature: f64,
        description: String,
    },
    Observation {
        temperature: f64,
        description: Option<String>,
    },
}

impl Reading {
    pub fn mode(&self) -> FeedMode {
        match self {
            Reading::Forecast { .. } => FeedMode::Forecast,
            Reading::Observation { .. } => FeedMode::Observation,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            Reading::Forecast { description, .. } => Some(description.as_str()),
            Reading::Observation { description, .. } => description.as_deref(),
        }
    }
}

/// One row of the stored dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    /// Display name of the region, township or station
    pub location: String,
    pub reading: Reading,
    /// Feed timestamp, or the ingestion time when the feed has none
    pub observed_at: DateTime<Utc>,
}

impl WeatherRecord {
    pub fn forecast(
        location: impl Into<String>,
        min_temperature: f64,
        max_temperature: f64,
        description: impl Into<String>,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            location: location.into(),
            reading: Reading::Forecast {
                min_temperature,
                max_temperature,
                description: description.into(),
            },
            observed_at,
        }
    }

    pub fn observation(
        location: impl Into<String>,
        temperature: f64,
        description: Option<String>,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            location: location.into(),
            reading: Reading::Observation {
                temperature,
                description,
            },
            observed_at,
        }
    }

    pub fn mode(&self) -> FeedMode {
        self.reading.mode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plausibility_bounds() {
        assert!(is_plausible_temperature(35.2));
        assert!(is_plausible_temperature(-89.9));
        assert!(!is_plausible_temperature(-90.0));
        assert!(!is_plausible_temperature(-90.1));
        assert!(!is_plausible_temperature(-999.0));
        assert!(is_plausible_temperature(65.0));
        assert!(!is_plausible_temperature(65.1));
        assert!(!is_plausible_temperature(f64::NAN));
        assert!(!is_plausible_temperature(f64::INFINITY));
    }

    #[test]
    fn test_feed_mode_parse() {
        assert_eq!("forecast".parse::<FeedMode>().unwrap(), FeedMode::Forecast);
        assert_eq!(" Observation ".parse::<FeedMode>().unwrap(), FeedMode::Observation);
        assert!("hourly".parse::<FeedMode>().is_err());
    }
}
