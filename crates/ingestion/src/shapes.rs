//! Known response shapes of the upstream feed.
//!
//! The location list has lived at different nesting paths across feed
//! generations. Each [`FeedShape`] knows its path and how to turn one of
//! its location entries into the shared [`LocationEntry`] form; the shapes
//! are probed in [`FeedShape::PROBE_ORDER`] and the first path that
//! resolves to an array wins. A path may fan out over an array of groups,
//! in which case the groups' location arrays are concatenated in feed order.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use weather_common::FeedMode;

/// One step of a path into the feed document.
#[derive(Debug, Clone, Copy)]
enum PathStep {
    Key(&'static str),
    /// Every element of an array
    Each,
}

use PathStep::{Each, Key};

/// A documented feed response shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedShape {
    /// County/city forecast (`records.location[]`, F-C0032-001 style)
    RegionForecast,
    /// Township forecast (`records.locations[*].location[]`, F-D0047 style)
    TownshipForecast,
    /// Automatic station observations (`records.Station[]`, O-A0003-001 style)
    StationObservation,
}

impl FeedShape {
    /// Order in which shapes are tried.
    pub const PROBE_ORDER: [FeedShape; 3] = [
        FeedShape::RegionForecast,
        FeedShape::TownshipForecast,
        FeedShape::StationObservation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedShape::RegionForecast => "region_forecast",
            FeedShape::TownshipForecast => "township_forecast",
            FeedShape::StationObservation => "station_observation",
        }
    }

    /// Record shape this feed produces.
    pub fn mode(&self) -> FeedMode {
        match self {
            FeedShape::RegionForecast | FeedShape::TownshipForecast => FeedMode::Forecast,
            FeedShape::StationObservation => FeedMode::Observation,
        }
    }

    fn path(&self) -> &'static [PathStep] {
        match self {
            FeedShape::RegionForecast => &[Key("records"), Key("location")],
            FeedShape::TownshipForecast => {
                &[Key("records"), Key("locations"), Each, Key("location")]
            }
            FeedShape::StationObservation => &[Key("records"), Key("Station")],
        }
    }

    /// Dotted rendering of the path, for diagnostics.
    pub fn path_description(&self) -> String {
        let mut out = String::new();
        for step in self.path() {
            match step {
                Key(key) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(key);
                }
                Each => out.push_str("[*]"),
            }
        }
        out
    }

    /// Location entries at this shape's path, flattened across groups.
    /// `None` unless at least one branch of the path ends at an array.
    fn locate<'a>(&self, body: &'a Value) -> Option<Vec<&'a Value>> {
        let mut current = vec![body];
        for step in self.path() {
            current = match step {
                Key(key) => current.into_iter().filter_map(|v| v.get(*key)).collect(),
                Each => current
                    .into_iter()
                    .filter_map(Value::as_array)
                    .flatten()
                    .collect(),
            };
        }

        let lists: Vec<&Vec<Value>> = current.into_iter().filter_map(Value::as_array).collect();
        if lists.is_empty() {
            return None;
        }
        Some(lists.into_iter().flatten().collect())
    }

    fn normalize(&self, index: usize, entry: &Value) -> LocationEntry {
        match self {
            FeedShape::RegionForecast => LocationEntry {
                index,
                name: text_at(entry, "/locationName"),
                elements: element_list(entry, "/time/0/parameter/parameterName"),
                observed_at: None,
            },
            FeedShape::TownshipForecast => LocationEntry {
                index,
                name: text_at(entry, "/locationName"),
                elements: element_list(entry, "/time/0/elementValue/0/value"),
                observed_at: None,
            },
            FeedShape::StationObservation => LocationEntry {
                index,
                name: text_at(entry, "/StationName"),
                elements: element_map(entry),
                observed_at: text_at(entry, "/ObsTime/DateTime"),
            },
        }
    }
}

impl fmt::Display for FeedShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A weather element reduced to its first (nearest) time bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementEntry {
    pub key: String,
    pub value: Option<Value>,
}

/// Shape-independent form of one location entry.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationEntry {
    /// Position in the feed's location list
    pub index: usize,
    pub name: Option<String>,
    pub elements: Vec<ElementEntry>,
    /// Raw per-record timestamp, when the shape has one
    pub observed_at: Option<String>,
}

impl LocationEntry {
    /// First element with the given key.
    pub fn element(&self, key: &str) -> Option<&ElementEntry> {
        self.elements.iter().find(|e| e.key == key)
    }
}

/// Location list found in a feed document.
#[derive(Debug, Clone)]
pub struct ResolvedFeed {
    pub shape: FeedShape,
    pub entries: Vec<LocationEntry>,
}

/// Probe the known shapes in order; `None` when none matches.
pub fn resolve_locations(body: &Value) -> Option<ResolvedFeed> {
    FeedShape::PROBE_ORDER.iter().find_map(|shape| {
        let list = shape.locate(body)?;
        Some(ResolvedFeed {
            shape: *shape,
            entries: list
                .into_iter()
                .enumerate()
                .map(|(index, entry)| shape.normalize(index, entry))
                .collect(),
        })
    })
}

fn text_at(entry: &Value, pointer: &str) -> Option<String> {
    entry
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// `weatherElement: [{elementName, time: [...]}, ...]`
fn element_list(entry: &Value, value_pointer: &str) -> Vec<ElementEntry> {
    entry
        .get("weatherElement")
        .and_then(Value::as_array)
        .map(|elements| {
            elements
                .iter()
                .filter_map(|element| {
                    let key = element.get("elementName")?.as_str()?;
                    Some(ElementEntry {
                        key: key.to_string(),
                        value: element.pointer(value_pointer).cloned(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// `WeatherElement: {AirTemperature: 25.3, Weather: "晴", ...}`
fn element_map(entry: &Value) -> Vec<ElementEntry> {
    entry
        .get("WeatherElement")
        .and_then(Value::as_object)
        .map(|elements| {
            elements
                .iter()
                .filter(|(_, value)| value.is_number() || value.is_string())
                .map(|(key, value)| ElementEntry {
                    key: key.clone(),
                    value: Some(value.clone()),
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_region_forecast_shape() {
        let body = json!({
            "success": "true",
            "records": {"location": [{
                "locationName": "Taipei",
                "weatherElement": [
                    {"elementName": "MinT", "time": [
                        {"parameter": {"parameterName": "20"}},
                        {"parameter": {"parameterName": "18"}}
                    ]}
                ]
            }]}
        });

        let resolved = resolve_locations(&body).unwrap();
        assert_eq!(resolved.shape, FeedShape::RegionForecast);
        assert_eq!(resolved.entries.len(), 1);

        let entry = &resolved.entries[0];
        assert_eq!(entry.name.as_deref(), Some("Taipei"));
        assert_eq!(entry.element("MinT").unwrap().value, Some(json!("20")));
    }

    #[test]
    fn test_township_forecast_shape() {
        let body = json!({
            "records": {"locations": [{
                "locationsName": "Taipei City",
                "location": [{
                    "locationName": "Da'an District",
                    "weatherElement": [
                        {"elementName": "MaxT", "time": [{"elementValue": [{"value": "31", "measures": "C"}]}]}
                    ]
                }]
            }]}
        });

        let resolved = resolve_locations(&body).unwrap();
        assert_eq!(resolved.shape, FeedShape::TownshipForecast);
        assert_eq!(
            resolved.entries[0].element("MaxT").unwrap().value,
            Some(json!("31"))
        );
    }

    #[test]
    fn test_township_groups_are_concatenated() {
        let township = |name: &str| {
            json!({
                "locationName": name,
                "weatherElement": [
                    {"elementName": "MinT", "time": [{"elementValue": [{"value": "25"}]}]}
                ]
            })
        };
        let body = json!({
            "records": {"locations": [
                {"locationsName": "Taipei City", "location": [township("Da'an District"), township("Xinyi District")]},
                {"locationsName": "No districts"},
                {"locationsName": "Kaohsiung City", "location": [township("Lingya District")]}
            ]}
        });

        let resolved = resolve_locations(&body).unwrap();
        assert_eq!(resolved.shape, FeedShape::TownshipForecast);

        let names: Vec<_> = resolved
            .entries
            .iter()
            .map(|e| (e.index, e.name.as_deref().unwrap()))
            .collect();
        assert_eq!(
            names,
            vec![
                (0, "Da'an District"),
                (1, "Xinyi District"),
                (2, "Lingya District")
            ]
        );
    }

    #[test]
    fn test_township_groups_without_locations_fall_through() {
        let body = json!({"records": {"locations": [{"locationsName": "Taipei City"}]}});
        assert!(resolve_locations(&body).is_none());

        let body = json!({"records": {"locations": []}});
        assert!(resolve_locations(&body).is_none());
    }

    #[test]
    fn test_station_observation_shape() {
        let body = json!({
            "records": {"Station": [{
                "StationName": "Banqiao",
                "ObsTime": {"DateTime": "2024-07-01T12:00:00+08:00"},
                "WeatherElement": {
                    "Weather": "晴",
                    "AirTemperature": 31.4,
                    "Now": {"Precipitation": 0.0}
                }
            }]}
        });

        let resolved = resolve_locations(&body).unwrap();
        assert_eq!(resolved.shape, FeedShape::StationObservation);
        assert_eq!(resolved.shape.mode(), FeedMode::Observation);

        let entry = &resolved.entries[0];
        assert_eq!(entry.observed_at.as_deref(), Some("2024-07-01T12:00:00+08:00"));
        assert_eq!(entry.element("AirTemperature").unwrap().value, Some(json!(31.4)));
        assert!(entry.element("Now").is_none());
    }

    #[test]
    fn test_null_or_non_list_paths_fall_through() {
        let body = json!({
            "records": {
                "location": null,
                "Station": [{"StationName": "Tamsui"}]
            }
        });
        assert_eq!(
            resolve_locations(&body).unwrap().shape,
            FeedShape::StationObservation
        );

        let body = json!({"records": {"location": {"locationName": "Taipei"}}});
        assert!(resolve_locations(&body).is_none());
    }

    #[test]
    fn test_unknown_shape() {
        let body = json!({"success": "true", "result": {"data": []}});
        assert!(resolve_locations(&body).is_none());
    }

    #[test]
    fn test_empty_list_resolves() {
        let body = json!({"records": {"location": []}});
        let resolved = resolve_locations(&body).unwrap();
        assert!(resolved.entries.is_empty());
    }

    #[test]
    fn test_path_descriptions() {
        assert_eq!(FeedShape::RegionForecast.path_description(), "records.location");
        assert_eq!(
            FeedShape::TownshipForecast.path_description(),
            "records.locations[*].location"
        );
        assert_eq!(FeedShape::StationObservation.path_description(), "records.Station");
    }

    #[test]
    fn test_malformed_entry_normalizes_to_nameless() {
        let body = json!({"records": {"location": [42, {"locationName": "  "}]}});
        let resolved = resolve_locations(&body).unwrap();
        assert!(resolved.entries.iter().all(|e| e.name.is_none()));
        assert!(resolved.entries.iter().all(|e| e.elements.is_empty()));
    }
}
