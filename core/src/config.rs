//! Client configuration parsed from environment variables.

use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    /// Whole-request timeout. `None` leaves the transport default in place.
    pub request_timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: None,
            connect_timeout: None,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            ..Self::default()
        }
    }

    /// Build config from environment variables.
    ///
    /// Optional:
    /// - `JOURNAL_BASE_URL`: default `http://localhost:8000`
    /// - `JOURNAL_REQUEST_TIMEOUT_SECS`: unset means no timeout
    /// - `JOURNAL_CONNECT_TIMEOUT_SECS`: unset means no timeout
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let base_url = lookup("JOURNAL_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let secs = |key: &str| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
        };
        Self {
            base_url,
            request_timeout: secs("JOURNAL_REQUEST_TIMEOUT_SECS"),
            connect_timeout: secs("JOURNAL_CONNECT_TIMEOUT_SECS"),
        }
    }
}
