//! Error types for the ingestion crate.

use storage::StoreError;
use thiserror::Error;

/// Maximum number of characters of a raw response kept for diagnostics.
pub const EXCERPT_LIMIT: usize = 512;

/// Truncate `text` to [`EXCERPT_LIMIT`] characters.
pub fn excerpt(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(EXCERPT_LIMIT).collect();
    if chars.next().is_some() {
        format!("{}…", head)
    } else {
        head
    }
}

fn status_label(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {})", code),
        None => String::new(),
    }
}

/// Failures of the feed request itself.
#[derive(Error, Debug)]
pub enum FeedError {
    /// Network, timeout or TLS failure. Retryable by the caller.
    #[error("Transport error: {message}")]
    Transport { message: String, timed_out: bool },

    /// The feed answered but reported failure (bad status, `success`
    /// missing or false, body not JSON). Needs operator action.
    #[error("Upstream error{}: {message}", status_label(.status))]
    Upstream {
        status: Option<u16>,
        message: String,
        excerpt: String,
    },
}

/// Run-level failures. Any of these leaves the stored dataset untouched.
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error(transparent)]
    Feed(#[from] FeedError),

    /// The payload matched none of the known location-list shapes.
    #[error("Unrecognized feed schema: {message}")]
    Schema { message: String, excerpt: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl IngestionError {
    /// Short machine-readable category.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestionError::Feed(FeedError::Transport { .. }) => "transport",
            IngestionError::Feed(FeedError::Upstream { .. }) => "upstream",
            IngestionError::Schema { .. } => "schema",
            IngestionError::Store(_) => "store",
            IngestionError::InvalidConfig(_) => "config",
        }
    }

    /// Only transport failures are worth retrying without operator action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, IngestionError::Feed(FeedError::Transport { .. }))
    }

    /// Raw response excerpt, when the failure came with one.
    pub fn excerpt(&self) -> Option<&str> {
        match self {
            IngestionError::Feed(FeedError::Upstream { excerpt, .. })
            | IngestionError::Schema { excerpt, .. } => Some(excerpt.as_str()),
            _ => None,
        }
    }
}

/// Per-location extraction failures. Always recovered by skipping the
/// location; never aborts a run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("location name missing or empty")]
    MissingName,

    #[error("required element '{0}' missing")]
    MissingElement(String),

    #[error("element '{element}' value {value} is not a finite number")]
    NotNumeric { element: String, value: String },

    #[error("element '{element}' value {value} is outside the plausible temperature range")]
    Implausible { element: String, value: f64 },

    #[error("element '{0}' has no text")]
    EmptyText(String),

    #[error("minimum temperature {min} exceeds maximum {max}")]
    InvertedRange { min: f64, max: f64 },
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_truncates() {
        let long = "x".repeat(EXCERPT_LIMIT + 100);
        let cut = excerpt(&long);
        assert_eq!(cut.chars().count(), EXCERPT_LIMIT + 1);
        assert!(cut.ends_with('…'));

        assert_eq!(excerpt("short"), "short");
    }

    #[test]
    fn test_excerpt_respects_char_boundaries() {
        let text = "臺".repeat(EXCERPT_LIMIT * 2);
        let cut = excerpt(&text);
        assert!(cut.starts_with('臺'));
        assert_eq!(cut.chars().count(), EXCERPT_LIMIT + 1);
    }

    #[test]
    fn test_error_classification() {
        let transport = IngestionError::from(FeedError::Transport {
            message: "connection refused".into(),
            timed_out: false,
        });
        assert!(transport.is_retryable());
        assert_eq!(transport.kind(), "transport");
        assert!(transport.excerpt().is_none());

        let upstream = IngestionError::from(FeedError::Upstream {
            status: Some(401),
            message: "HTTP 401 Unauthorized".into(),
            excerpt: "{\"message\":\"bad key\"}".into(),
        });
        assert!(!upstream.is_retryable());
        assert_eq!(upstream.kind(), "upstream");
        assert_eq!(upstream.excerpt(), Some("{\"message\":\"bad key\"}"));
        assert!(upstream.to_string().contains("HTTP 401"));
    }
}
