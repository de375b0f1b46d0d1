//! Realtime connection configuration.

use std::time::Duration;

use thiserror::Error;

use hlai_core::defaults::{
    API_BASE_URL, COMMAND_CENTER_DEBOUNCE_MS, DEDUP_TTL_SECS, RECONNECT_MAX_MS,
    RECONNECT_STEP_MS, SOCKET_PATH, STORE_CHANNEL_CAPACITY,
};

/// Invalid realtime configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid socket base URL: {0:?}")]
    InvalidUrl(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Configuration for [`crate::RealtimeManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeConfig {
    /// Socket base, e.g. `wss://api.example.com`. `http(s)` bases are
    /// converted when the socket URL is built.
    pub ws_base_url: String,
    /// How long an identity key suppresses duplicates.
    pub dedup_ttl: Duration,
    /// Trailing debounce before a command-center refetch.
    pub command_center_debounce: Duration,
    /// Reconnect delay per attempt.
    pub reconnect_step: Duration,
    /// Upper bound on the reconnect delay.
    pub reconnect_max: Duration,
    /// Capacity of the store's change channel.
    pub store_channel_capacity: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            ws_base_url: ws_base_from_api(API_BASE_URL),
            dedup_ttl: Duration::from_secs(DEDUP_TTL_SECS),
            command_center_debounce: Duration::from_millis(COMMAND_CENTER_DEBOUNCE_MS),
            reconnect_step: Duration::from_millis(RECONNECT_STEP_MS),
            reconnect_max: Duration::from_millis(RECONNECT_MAX_MS),
            store_channel_capacity: STORE_CHANNEL_CAPACITY,
        }
    }
}

impl RealtimeConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `HLAI_WS_BASE_URL` | derived from `HLAI_API_BASE_URL` | Socket base URL |
    /// | `HLAI_DEDUP_TTL_SECS` | `120` | Duplicate suppression window |
    /// | `HLAI_COMMAND_CENTER_DEBOUNCE_MS` | `750` | Snapshot refetch debounce |
    /// | `HLAI_RECONNECT_STEP_MS` | `1000` | Reconnect delay per attempt |
    /// | `HLAI_RECONNECT_MAX_MS` | `15000` | Reconnect delay cap |
    /// | `HLAI_STORE_CHANNEL_CAPACITY` | `256` | Store change channel capacity |
    pub fn from_env() -> Self {
        let ws_base_url = std::env::var("HLAI_WS_BASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| {
                let api = std::env::var("HLAI_API_BASE_URL")
                    .unwrap_or_else(|_| API_BASE_URL.to_string());
                ws_base_from_api(&api)
            });

        Self {
            ws_base_url,
            dedup_ttl: Duration::from_secs(env_u64("HLAI_DEDUP_TTL_SECS", DEDUP_TTL_SECS)),
            command_center_debounce: Duration::from_millis(env_u64(
                "HLAI_COMMAND_CENTER_DEBOUNCE_MS",
                COMMAND_CENTER_DEBOUNCE_MS,
            )),
            reconnect_step: Duration::from_millis(env_u64(
                "HLAI_RECONNECT_STEP_MS",
                RECONNECT_STEP_MS,
            )),
            reconnect_max: Duration::from_millis(env_u64(
                "HLAI_RECONNECT_MAX_MS",
                RECONNECT_MAX_MS,
            )),
            store_channel_capacity: std::env::var("HLAI_STORE_CHANNEL_CAPACITY")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(STORE_CHANNEL_CAPACITY),
        }
    }

    pub fn with_ws_base_url(mut self, url: impl Into<String>) -> Self {
        self.ws_base_url = url.into();
        self
    }

    pub fn with_dedup_ttl(mut self, ttl: Duration) -> Self {
        self.dedup_ttl = ttl;
        self
    }

    pub fn with_command_center_debounce(mut self, debounce: Duration) -> Self {
        self.command_center_debounce = debounce;
        self
    }

    /// Set the reconnect step and cap.
    pub fn with_reconnect(mut self, step: Duration, max: Duration) -> Self {
        self.reconnect_step = step;
        self.reconnect_max = max;
        self
    }

    pub fn with_store_channel_capacity(mut self, capacity: usize) -> Self {
        self.store_channel_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.ws_base_url.trim();
        let rest = ["ws://", "wss://", "http://", "https://"]
            .iter()
            .find_map(|scheme| base.strip_prefix(scheme));
        match rest {
            Some(host) if !host.trim_matches('/').is_empty() => {}
            _ => return Err(ConfigError::InvalidUrl(self.ws_base_url.clone())),
        }

        if self.dedup_ttl.is_zero() {
            return Err(ConfigError::Zero("dedup_ttl"));
        }
        if self.command_center_debounce.is_zero() {
            return Err(ConfigError::Zero("command_center_debounce"));
        }
        if self.reconnect_step.is_zero() {
            return Err(ConfigError::Zero("reconnect_step"));
        }
        if self.reconnect_max.is_zero() {
            return Err(ConfigError::Zero("reconnect_max"));
        }
        if self.store_channel_capacity == 0 {
            return Err(ConfigError::Zero("store_channel_capacity"));
        }
        Ok(())
    }

    /// `{wsBase}/ws?token=<token>` with the token percent-encoded.
    pub fn socket_url(&self, token: &str) -> String {
        format!(
            "{}{}?token={}",
            ws_base_from_api(&self.ws_base_url),
            SOCKET_PATH,
            urlencoding::encode(token)
        )
    }
}

/// Map an HTTP API base onto its socket scheme (`http→ws`, `https→wss`).
pub fn ws_base_from_api(api_base: &str) -> String {
    let trimmed = api_base.trim().trim_end_matches('/');
    if let Some(rest) = trimmed.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        trimmed.to_string()
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}
