//! Tests for the display table built from stored records.

use chrono::{TimeZone, Utc};
use serde_json::Value;
use weather_common::{FeedMode, TableView, WeatherRecord};

// ============================================================================
// Column labels
// ============================================================================

#[test]
fn test_forecast_columns() {
    let columns = TableView::columns_for(FeedMode::Forecast);
    assert_eq!(columns.len(), 5);
    assert_eq!(columns[0], "Location");
    assert_eq!(columns[3], "Description");
}

#[test]
fn test_observation_columns() {
    let columns = TableView::columns_for(FeedMode::Observation);
    assert_eq!(
        columns,
        vec!["Location", "Temperature (°C)", "Description", "Observed At"]
    );
}

// ============================================================================
// Rows
// ============================================================================

#[test]
fn test_forecast_rows_follow_record_order() {
    let at = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    let records = vec![
        WeatherRecord::forecast("Taipei", 20.0, 28.0, "Cloudy", at),
        WeatherRecord::forecast("Hualien", 22.5, 30.0, "Sunny", at),
    ];

    let table = TableView::from_records(FeedMode::Forecast, &records);
    assert_eq!(table.len(), 2);
    assert_eq!(table.rows[0][0], Value::from("Taipei"));
    assert_eq!(table.rows[0][1], Value::from(20.0));
    assert_eq!(table.rows[1][3], Value::from("Sunny"));
    assert_eq!(table.rows[1][4], Value::from(at.to_rfc3339()));
}

#[test]
fn test_observation_missing_description_is_null() {
    let at = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    let records = vec![WeatherRecord::observation("Banqiao", 31.4, None, at)];

    let table = TableView::from_records(FeedMode::Observation, &records);
    assert_eq!(table.rows[0][1], Value::from(31.4));
    assert_eq!(table.rows[0][2], Value::Null);
}

#[test]
fn test_empty_table() {
    let table = TableView::from_records(FeedMode::Forecast, &[]);
    assert!(table.is_empty());
    assert_eq!(table.columns.len(), 5);
}

// ============================================================================
// Serialization
// ============================================================================

#[test]
fn test_reading_serializes_with_mode_tag() {
    let at = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    let record = WeatherRecord::observation("Banqiao", 31.4, Some("Clear".into()), at);
    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["reading"]["mode"], "observation");
    assert_eq!(json["reading"]["temperature"], 31.4);
}
