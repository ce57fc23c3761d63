//! Error types for the TrafficJunky integration.
//!
//! Run-level failures (login, campaign listing) abort a run; per-campaign and
//! per-bid failures are logged by the caller and degraded locally.

use reqwest::Url;
use thiserror::Error;

/// Errors that can occur when talking to TrafficJunky.
#[derive(Debug, Error)]
pub enum MarketplaceError {
    /// Username or password not provided.
    #[error("missing marketplace username or password")]
    MissingCredentials,

    /// Login page did not contain the `_token` form field.
    #[error("could not scrape login token from sign-in page")]
    TokenNotFound,

    /// Non-2xx response.
    #[error("HTTP {status} from {url}")]
    Http {
        /// Request URL with the API key redacted.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// Response body did not have the expected shape.
    #[error("malformed response from {context}: {detail}")]
    MalformedResponse {
        /// Endpoint or field path being decoded.
        context: String,
        /// What was wrong.
        detail: String,
    },

    /// Transport-level failure.
    #[error("network error: {0}")]
    Network(String),

    /// Request timeout.
    #[error("request timeout: {0}")]
    Timeout(String),

    /// Run was cancelled or hit its deadline.
    #[error("operation cancelled")]
    Cancelled,

    /// Identifier unsafe to place in a URL path.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl MarketplaceError {
    /// Creates an HTTP error, redacting the API key from the URL.
    pub fn http(url: &Url, status: u16) -> Self {
        Self::Http {
            url: redact_url(url),
            status,
        }
    }

    /// Creates a malformed response error.
    pub fn malformed(context: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::MalformedResponse {
            context: context.into(),
            detail: detail.into(),
        }
    }

    /// Creates a malformed response error for a field of the wrong JSON kind.
    pub fn wrong_type(context: impl Into<String>, field: &str, expected: &str, actual: &str) -> Self {
        Self::malformed(
            context,
            format!("field '{field}' expected {expected}, found {actual}"),
        )
    }

    /// Returns the HTTP status code if this is an HTTP error.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true if retrying the same request may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) => true,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Returns the suggested retry delay in milliseconds, if applicable.
    #[must_use]
    pub fn retry_delay_ms(&self) -> Option<u64> {
        match self {
            Self::Network(_) | Self::Timeout(_) => Some(1000),
            Self::Http { status: 429, .. } => Some(5000),
            Self::Http { status, .. } if *status >= 500 => Some(2000),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for MarketplaceError {
    fn from(err: reqwest::Error) -> Self {
        // reqwest includes the request URL in its message; drop it to keep the key out of logs
        let err = err.without_url();
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Network(format!("connection failed: {err}"))
        } else if err.is_decode() {
            Self::malformed("response body", err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for MarketplaceError {
    fn from(err: serde_json::Error) -> Self {
        Self::malformed("response body", err.to_string())
    }
}

/// Returns `url` with any `api_key` query value replaced.
#[must_use]
pub fn redact_url(url: &Url) -> String {
    if !url.query_pairs().any(|(k, _)| k == "api_key") {
        return url.to_string();
    }

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "api_key" {
                "REDACTED".to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), v)
        })
        .collect();

    let mut redacted = url.clone();
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted.to_string()
}

/// Result type alias for marketplace operations.
pub type Result<T> = std::result::Result<T, MarketplaceError>;
