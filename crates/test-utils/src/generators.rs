//! Generators for larger synthetic feed documents.
//!
//! Values follow predictable patterns so tests can check what was stored
//! without keeping the generated input around.

use serde_json::{json, Value};

use crate::fixtures::{
    region_forecast_location, region_forecast_payload, station_observation,
    station_observation_payload,
};

/// Name of the `index`-th generated location.
///
/// ```
/// use test_utils::generated_location_name;
///
/// assert_eq!(generated_location_name(7), "Location 007");
/// ```
pub fn generated_location_name(index: usize) -> String {
    format!("Location {:03}", index)
}

/// Minimum temperature of the `index`-th generated forecast location.
///
/// Cycles through 10..=29 °C; the maximum is always five degrees higher.
pub fn generated_min_temperature(index: usize) -> f64 {
    10.0 + (index % 20) as f64
}

/// A region forecast document with `count` valid, distinct locations.
///
/// ```
/// use test_utils::generate_region_forecast;
///
/// let payload = generate_region_forecast(3);
/// assert_eq!(payload["records"]["location"].as_array().unwrap().len(), 3);
/// ```
pub fn generate_region_forecast(count: usize) -> Value {
    let locations = (0..count)
        .map(|i| {
            let min = generated_min_temperature(i);
            region_forecast_location(
                &generated_location_name(i),
                &format!("{}", min),
                &format!("{}", min + 5.0),
                "Partly cloudy",
            )
        })
        .collect();

    region_forecast_payload(locations)
}

/// A station document with `count` stations, every `invalid_every`-th one
/// reporting the `-99` sentinel instead of a temperature.
///
/// Pass `0` to make every station valid.
pub fn generate_station_observations(count: usize, invalid_every: usize) -> Value {
    let stations = (0..count)
        .map(|i| {
            let invalid = invalid_every > 0 && (i + 1) % invalid_every == 0;
            let temperature = if invalid {
                json!(-99)
            } else {
                json!(20.0 + (i % 15) as f64 * 0.5)
            };
            station_observation(&generated_location_name(i), temperature, "Cloudy")
        })
        .collect();

    station_observation_payload(stations)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_names_are_unique() {
        let payload = generate_region_forecast(50);
        let locations = payload["records"]["location"].as_array().unwrap();
        let mut names: Vec<_> = locations
            .iter()
            .map(|l| l["locationName"].as_str().unwrap())
            .collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 50);
    }

    #[test]
    fn test_station_sentinels() {
        let payload = generate_station_observations(9, 3);
        let stations = payload["records"]["Station"].as_array().unwrap();
        let sentinels = stations
            .iter()
            .filter(|s| s["WeatherElement"]["AirTemperature"] == json!(-99))
            .count();
        assert_eq!(sentinels, 3);
    }

    #[test]
    fn test_no_invalid_stations_when_disabled() {
        let payload = generate_station_observations(5, 0);
        let stations = payload["records"]["Station"].as_array().unwrap();
        assert!(stations
            .iter()
            .all(|s| s["WeatherElement"]["AirTemperature"] != json!(-99)));
    }
}
