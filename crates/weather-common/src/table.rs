//! Tabular view of the stored dataset for the display layer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::record::{FeedMode, Reading, WeatherRecord};

/// Column labels plus rows, ready to render as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableView {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl TableView {
    /// Human-readable column labels for a feed mode.
    pub fn columns_for(mode: FeedMode) -> Vec<String> {
        let labels: &[&str] = match mode {
            FeedMode::Forecast => &[
                "Location",
                "Min Temperature (°C)",
                "Max Temperature (°C)",
                "Description",
                "Observed At",
            ],
            FeedMode::Observation => {
                &["Location", "Temperature (°C)", "Description", "Observed At"]
            }
        };
        labels.iter().map(|s| s.to_string()).collect()
    }

    /// Build a table from records of a single mode.
    pub fn from_records(mode: FeedMode, records: &[WeatherRecord]) -> Self {
        let rows = records
            .iter()
            .map(|record| {
                let observed_at = Value::from(record.observed_at.to_rfc3339());
                match &record.reading {
                    Reading::Forecast {
                        min_temperature,
                        max_temperature,
                        description,
                    } => vec![
                        Value::from(record.location.clone()),
                        Value::from(*min_temperature),
                        Value::from(*max_temperature),
                        Value::from(description.clone()),
                        observed_at,
                    ],
                    Reading::Observation {
                        temperature,
                        description,
                    } => vec![
                        Value::from(record.location.clone()),
                        Value::from(*temperature),
                        description.clone().map(Value::from).unwrap_or(Value::Null),
                        observed_at,
                    ],
                }
            })
            .collect();

        Self {
            columns: Self::columns_for(mode),
            rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}
