//! Upstream feed client.
//!
//! Issues a single GET against the configured endpoint with the API key
//! and format selector as query parameters, and hands back the parsed JSON
//! once it is known to be well-formed and to report success. Deeper
//! structural checks belong to [`crate::shapes`]. No retries happen here.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Certificate, Client, Url};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::IngestionConfig;
use crate::error::{excerpt, FeedError, IngestionError, Result};

/// A fetched, well-formed, success-reporting feed document.
#[derive(Debug, Clone)]
pub struct RawPayload {
    pub body: Value,
    /// Leading part of the raw body, for diagnostics
    pub excerpt: String,
    pub fetched_at: DateTime<Utc>,
}

impl RawPayload {
    /// Wrap an already-parsed document.
    pub fn from_value(body: Value) -> Self {
        let excerpt = excerpt(&body.to_string());
        Self {
            body,
            excerpt,
            fetched_at: Utc::now(),
        }
    }
}

/// Anything that can produce a feed document.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self) -> std::result::Result<RawPayload, FeedError>;
}

/// HTTP client for the upstream weather API.
pub struct FeedClient {
    client: Client,
    endpoint_url: Url,
    api_key: String,
    format: String,
}

impl FeedClient {
    /// Build a client from configuration.
    ///
    /// Certificates are always validated. `ca_cert_path`, when set, adds a
    /// trusted root instead of weakening verification.
    pub fn new(config: &IngestionConfig) -> Result<Self> {
        config.validate()?;

        let endpoint_url = Url::parse(&config.endpoint_url)
            .map_err(|e| IngestionError::InvalidConfig(format!("invalid endpoint_url: {}", e)))?;

        let timeout = config.request_timeout();
        let mut builder = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .user_agent(concat!("weather-ingester/", env!("CARGO_PKG_VERSION")));

        if let Some(path) = &config.ca_cert_path {
            let pem = std::fs::read(path).map_err(|e| {
                IngestionError::InvalidConfig(format!(
                    "cannot read CA certificate {}: {}",
                    path.display(),
                    e
                ))
            })?;
            if !String::from_utf8_lossy(&pem).contains("-----BEGIN CERTIFICATE-----") {
                return Err(IngestionError::InvalidConfig(format!(
                    "CA certificate {} contains no PEM certificate block",
                    path.display()
                )));
            }
            let certificate = Certificate::from_pem(&pem).map_err(|e| {
                IngestionError::InvalidConfig(format!(
                    "CA certificate {} is not valid PEM: {}",
                    path.display(),
                    e
                ))
            })?;
            builder = builder.add_root_certificate(certificate);
        }

        let client = builder.build().map_err(|e| {
            IngestionError::InvalidConfig(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            endpoint_url,
            api_key: config.api_key.clone(),
            format: config.format.clone(),
        })
    }

    pub fn endpoint_url(&self) -> &Url {
        &self.endpoint_url
    }
}

#[async_trait]
impl FeedSource for FeedClient {
    #[instrument(skip(self), fields(endpoint = %self.endpoint_url))]
    async fn fetch(&self) -> std::result::Result<RawPayload, FeedError> {
        let response = self
            .client
            .get(self.endpoint_url.clone())
            .query(&[
                ("Authorization", self.api_key.as_str()),
                ("format", self.format.as_str()),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;
        let body_excerpt = excerpt(&text);

        debug!(status = status.as_u16(), bytes = text.len(), "Received feed response");

        if !status.is_success() {
            return Err(FeedError::Upstream {
                status: Some(status.as_u16()),
                message: format!("feed returned HTTP {}", status),
                excerpt: body_excerpt,
            });
        }

        let body: Value = serde_json::from_str(&text).map_err(|e| FeedError::Upstream {
            status: Some(status.as_u16()),
            message: format!("response is not valid JSON: {}", e),
            excerpt: body_excerpt.clone(),
        })?;

        if !reports_success(&body) {
            return Err(FeedError::Upstream {
                status: Some(status.as_u16()),
                message: "feed did not report success".to_string(),
                excerpt: body_excerpt,
            });
        }

        Ok(RawPayload {
            body,
            excerpt: body_excerpt,
            fetched_at: Utc::now(),
        })
    }
}

/// Whether the top-level `success` indicator is present and true.
///
/// The upstream API writes it as the string `"true"`; a JSON boolean is
/// accepted too.
pub fn reports_success(body: &Value) -> bool {
    match body.get("success") {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(flag)) => flag.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn transport_error(err: reqwest::Error) -> FeedError {
    let timed_out = err.is_timeout();
    // The request URL carries the API key; keep it out of messages.
    let err = err.without_url();

    let mut message = err.to_string();
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }

    FeedError::Transport { message, timed_out }
}
