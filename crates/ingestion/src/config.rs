//! Ingestion configuration.
//!
//! One explicit object carries everything the feed client and the store
//! need. It can be built in code, loaded from a YAML file, or read from
//! `WEATHER_*` environment variables.

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use weather_common::FeedMode;

use crate::error::{IngestionError, Result};

/// Environment variable names.
pub mod env_vars {
    pub const ENDPOINT_URL: &str = "WEATHER_ENDPOINT_URL";
    pub const API_KEY: &str = "WEATHER_API_KEY";
    pub const FORMAT: &str = "WEATHER_FORMAT";
    pub const REQUEST_TIMEOUT_SECS: &str = "WEATHER_REQUEST_TIMEOUT_SECS";
    pub const DB_PATH: &str = "WEATHER_DB_PATH";
    pub const FEED_MODE: &str = "WEATHER_FEED_MODE";
    pub const CA_CERT_PATH: &str = "WEATHER_CA_CERT_PATH";
}

/// Configuration for one deployment (one feed, one store).
#[derive(Clone, Deserialize)]
pub struct IngestionConfig {
    /// Feed endpoint, without the key/format query parameters
    #[serde(default = "default_endpoint_url")]
    pub endpoint_url: String,

    /// Upstream API key, sent as the `Authorization` query parameter
    #[serde(default)]
    pub api_key: String,

    /// Output format selector, sent as the `format` query parameter
    #[serde(default = "default_format")]
    pub format: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// SQLite database file
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Record shape this deployment stores
    #[serde(default)]
    pub mode: FeedMode,

    /// Extra PEM root certificate to trust for the feed host
    #[serde(default)]
    pub ca_cert_path: Option<PathBuf>,
}

fn default_endpoint_url() -> String {
    "https://opendata.cwa.gov.tw/api/v1/rest/datastore/F-C0032-001".to_string()
}

fn default_format() -> String {
    "JSON".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data.db")
}

impl fmt::Debug for IngestionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionConfig")
            .field("endpoint_url", &self.endpoint_url)
            .field("api_key", &"<redacted>")
            .field("format", &self.format)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("db_path", &self.db_path)
            .field("mode", &self.mode)
            .field("ca_cert_path", &self.ca_cert_path)
            .finish()
    }
}

impl IngestionConfig {
    /// Configuration with defaults for everything but endpoint and key.
    pub fn new(endpoint_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            api_key: api_key.into(),
            format: default_format(),
            request_timeout_secs: default_request_timeout_secs(),
            db_path: default_db_path(),
            mode: FeedMode::default(),
            ca_cert_path: None,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new(
            lookup(env_vars::ENDPOINT_URL).unwrap_or_else(default_endpoint_url),
            lookup(env_vars::API_KEY).unwrap_or_default(),
        );

        if let Some(format) = lookup(env_vars::FORMAT) {
            config.format = format;
        }

        if let Some(raw) = lookup(env_vars::REQUEST_TIMEOUT_SECS) {
            config.request_timeout_secs = raw.trim().parse().map_err(|_| {
                IngestionError::InvalidConfig(format!(
                    "{} must be a whole number of seconds, got '{}'",
                    env_vars::REQUEST_TIMEOUT_SECS,
                    raw
                ))
            })?;
        }

        if let Some(path) = lookup(env_vars::DB_PATH) {
            config.db_path = PathBuf::from(path);
        }

        if let Some(raw) = lookup(env_vars::FEED_MODE) {
            config.mode = raw.parse().map_err(IngestionError::InvalidConfig)?;
        }

        config.ca_cert_path = lookup(env_vars::CA_CERT_PATH)
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file.
    pub fn from_yaml(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            IngestionError::InvalidConfig(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: IngestionConfig = serde_yaml::from_str(&content).map_err(|e| {
            IngestionError::InvalidConfig(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })?;

        config.validate()?;
        debug!(path = %path.display(), mode = %config.mode, "Loaded ingestion config");
        Ok(config)
    }

    /// Reject configurations that cannot possibly work.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(IngestionError::InvalidConfig(format!(
                "an API key is required (set {} or api_key)",
                env_vars::API_KEY
            )));
        }

        let url = reqwest::Url::parse(&self.endpoint_url).map_err(|e| {
            IngestionError::InvalidConfig(format!(
                "endpoint_url '{}' is not a valid URL: {}",
                self.endpoint_url, e
            ))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(IngestionError::InvalidConfig(format!(
                "endpoint_url must use http or https, got '{}'",
                url.scheme()
            )));
        }

        if self.request_timeout_secs == 0 {
            return Err(IngestionError::InvalidConfig(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }

        if self.format.trim().is_empty() {
            return Err(IngestionError::InvalidConfig(
                "format must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config = IngestionConfig::from_lookup(lookup_from(&[(env_vars::API_KEY, "CWA-KEY")]))
            .unwrap();

        assert_eq!(config.api_key, "CWA-KEY");
        assert_eq!(config.format, "JSON");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.db_path, PathBuf::from("data.db"));
        assert_eq!(config.mode, FeedMode::Forecast);
        assert!(config.ca_cert_path.is_none());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = IngestionConfig::from_lookup(lookup_from(&[
            (env_vars::API_KEY, "CWA-KEY"),
            (env_vars::ENDPOINT_URL, "https://example.org/api/O-A0003-001"),
            (env_vars::REQUEST_TIMEOUT_SECS, "5"),
            (env_vars::DB_PATH, "/var/lib/weather/obs.db"),
            (env_vars::FEED_MODE, "observation"),
        ]))
        .unwrap();

        assert_eq!(config.endpoint_url, "https://example.org/api/O-A0003-001");
        assert_eq!(config.request_timeout_secs, 5);
        assert_eq!(config.mode, FeedMode::Observation);
        assert_eq!(config.db_path, PathBuf::from("/var/lib/weather/obs.db"));
    }

    #[test]
    fn test_missing_api_key_rejected() {
        let err = IngestionConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, IngestionError::InvalidConfig(_)));
    }

    #[test]
    fn test_bad_values_rejected() {
        assert!(IngestionConfig::from_lookup(lookup_from(&[
            (env_vars::API_KEY, "k"),
            (env_vars::REQUEST_TIMEOUT_SECS, "soon"),
        ]))
        .is_err());

        assert!(IngestionConfig::from_lookup(lookup_from(&[
            (env_vars::API_KEY, "k"),
            (env_vars::FEED_MODE, "hourly"),
        ]))
        .is_err());

        assert!(IngestionConfig::from_lookup(lookup_from(&[
            (env_vars::API_KEY, "k"),
            (env_vars::ENDPOINT_URL, "ftp://example.org/feed"),
        ]))
        .is_err());
    }

    #[test]
    fn test_parse_yaml_config() {
        let yaml = r#"
endpoint_url: "https://opendata.cwa.gov.tw/api/v1/rest/datastore/O-A0003-001"
api_key: "CWA-KEY"
request_timeout_secs: 10
db_path: "/data/weather.db"
mode: observation
"#;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ingester.yaml");
        std::fs::write(&path, yaml).unwrap();

        let config = IngestionConfig::from_yaml(&path).unwrap();
        assert_eq!(config.mode, FeedMode::Observation);
        assert_eq!(config.request_timeout_secs, 10);
        assert_eq!(config.format, "JSON");
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = IngestionConfig::new("https://example.org/feed", "SECRET-KEY");
        let printed = format!("{:?}", config);
        assert!(!printed.contains("SECRET-KEY"));
        assert!(printed.contains("<redacted>"));
    }
}
