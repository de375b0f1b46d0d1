//! Client configuration.

use hlai_core::defaults::API_BASE_URL;
use hlai_core::{Error, Result};

/// Configuration for [`crate::DashboardClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the dashboard API (no trailing path).
    pub base_url: String,
    /// Per-request timeout in seconds. `None` means no timeout; failures only
    /// surface through the transport or a non-2xx status.
    pub timeout_seconds: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: API_BASE_URL.to_string(),
            timeout_seconds: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `HLAI_API_BASE_URL` | `http://localhost:3002` |
    /// | `HLAI_HTTP_TIMEOUT_SECS` | unset (no timeout) |
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("HLAI_API_BASE_URL")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| API_BASE_URL.to_string()),
            timeout_seconds: std::env::var("HLAI_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout_seconds(mut self, secs: u64) -> Self {
        self.timeout_seconds = Some(secs);
        self
    }

    /// Reject base URLs that are empty or not http(s).
    pub fn validate(&self) -> Result<()> {
        let base = self.base_url.trim();
        if base.is_empty() {
            return Err(Error::Config("API base URL is empty".to_string()));
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(Error::Config(format!(
                "API base URL must start with http:// or https://, got {}",
                base
            )));
        }
        if self.timeout_seconds == Some(0) {
            return Err(Error::Config("HTTP timeout must be positive".to_string()));
        }
        Ok(())
    }

    /// Base URL without a trailing slash.
    pub fn base(&self) -> &str {
        self.base_url.trim().trim_end_matches('/')
    }
}
