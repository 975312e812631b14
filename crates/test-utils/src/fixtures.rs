//! Feed payload fixtures.
//!
//! Builders for the three response shapes the upstream feed has used,
//! plus the failure and unknown-shape documents tests need. Numeric values
//! are written as strings where the real feed does so.

use serde_json::{json, Value};

/// Observation timestamp used by the station fixtures (UTC+8 local time).
pub const SAMPLE_OBS_TIME: &str = "2024-07-01T12:00:00+08:00";

/// One county/city entry (`records.location[]`).
pub fn region_forecast_location(name: &str, min_t: &str, max_t: &str, wx: &str) -> Value {
    json!({
        "locationName": name,
        "weatherElement": [
            {"elementName": "Wx", "time": [
                {"startTime": "2024-07-01 12:00:00", "endTime": "2024-07-01 18:00:00",
                 "parameter": {"parameterName": wx, "parameterValue": "1"}},
                {"startTime": "2024-07-01 18:00:00", "endTime": "2024-07-02 06:00:00",
                 "parameter": {"parameterName": "Rain", "parameterValue": "8"}}
            ]},
            {"elementName": "PoP", "time": [
                {"parameter": {"parameterName": "10", "parameterUnit": "%"}}
            ]},
            {"elementName": "MinT", "time": [
                {"parameter": {"parameterName": min_t, "parameterUnit": "C"}},
                {"parameter": {"parameterName": "-999", "parameterUnit": "C"}}
            ]},
            {"elementName": "CI", "time": [
                {"parameter": {"parameterName": "Comfortable"}}
            ]},
            {"elementName": "MaxT", "time": [
                {"parameter": {"parameterName": max_t, "parameterUnit": "C"}},
                {"parameter": {"parameterName": "-999", "parameterUnit": "C"}}
            ]}
        ]
    })
}

/// Region forecast entry without the given element.
pub fn region_forecast_location_without(name: &str, missing: &str) -> Value {
    let mut location = region_forecast_location(name, "20", "28", "Cloudy");
    if let Some(elements) = location["weatherElement"].as_array_mut() {
        elements.retain(|e| e["elementName"] != missing);
    }
    location
}

/// Wrap entries in a successful region forecast document.
pub fn region_forecast_payload(locations: Vec<Value>) -> Value {
    json!({
        "success": "true",
        "result": {"resource_id": "F-C0032-001"},
        "records": {
            "datasetDescription": "36-hour forecast",
            "location": locations
        }
    })
}

/// One township entry (`records.locations[*].location[]`).
pub fn township_forecast_location(name: &str, min_t: &str, max_t: &str, wx: &str) -> Value {
    let element = |element_name: &str, value: &str| {
        json!({
            "elementName": element_name,
            "time": [{
                "startTime": "2024-07-01 12:00:00",
                "endTime": "2024-07-01 18:00:00",
                "elementValue": [{"value": value, "measures": "C"}]
            }]
        })
    };

    json!({
        "locationName": name,
        "geocode": "6300100",
        "weatherElement": [
            element("MinT", min_t),
            element("MaxT", max_t),
            element("Wx", wx)
        ]
    })
}

/// Wrap entries in a successful township forecast document with a single
/// county group.
pub fn township_forecast_payload(locations: Vec<Value>) -> Value {
    township_forecast_groups(vec![("Taipei City", locations)])
}

/// Township forecast document with one `locations[]` group per county.
pub fn township_forecast_groups(groups: Vec<(&str, Vec<Value>)>) -> Value {
    let groups: Vec<Value> = groups
        .into_iter()
        .map(|(county, locations)| {
            json!({
                "datasetDescription": "Township forecast",
                "locationsName": county,
                "location": locations
            })
        })
        .collect();

    json!({
        "success": "true",
        "records": {"locations": groups}
    })
}

/// One automatic station entry (`records.Station[]`).
pub fn station_observation(name: &str, air_temperature: Value, weather: &str) -> Value {
    json!({
        "StationName": name,
        "StationId": "C0A9C0",
        "ObsTime": {"DateTime": SAMPLE_OBS_TIME},
        "WeatherElement": {
            "Weather": weather,
            "AirTemperature": air_temperature,
            "RelativeHumidity": 74,
            "Now": {"Precipitation": 0.0}
        }
    })
}

/// Wrap entries in a successful station observation document.
pub fn station_observation_payload(stations: Vec<Value>) -> Value {
    json!({
        "success": "true",
        "result": {"resource_id": "O-A0003-001"},
        "records": {"Station": stations}
    })
}

/// The body the feed sends for a rejected API key.
pub fn failure_payload() -> Value {
    json!({
        "success": "false",
        "message": "Authorization key is invalid"
    })
}

/// A successful document whose location list is nowhere the probes look.
pub fn unknown_shape_payload() -> Value {
    json!({
        "success": "true",
        "records": {
            "data": {"location": [{"locationName": "Taipei"}]}
        }
    })
}

/// The usual small forecast document: Taipei and Kaohsiung, both valid.
pub fn sample_region_forecast() -> Value {
    region_forecast_payload(vec![
        region_forecast_location("Taipei", "20", "28", "Cloudy"),
        region_forecast_location("Kaohsiung", "26", "33", "Sunny"),
    ])
}
