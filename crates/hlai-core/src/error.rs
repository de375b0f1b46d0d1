//! Error types for the HomeListingAI dashboard core.

use thiserror::Error;

use crate::billing::BillingLimitError;

/// Result type alias using the dashboard core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for dashboard operations.
///
/// Transport and envelope failures stay inside the realtime layer; only REST
/// failures (`Request`, `Api`) and plan-limit violations (`BillingLimit`) are
/// meant to reach UI-visible state.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP/network request failed before a response was received
    #[error("Request error: {0}")]
    Request(String),

    /// Non-2xx response from the dashboard API. Displays the server message
    /// verbatim so UI layers can show it as-is.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// The server reported a plan-limit violation (`error == "limit_reached"`)
    #[error(transparent)]
    BillingLimit(#[from] BillingLimitError),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No usable session identity
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Realtime transport failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an API error from status and message.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// HTTP status if this error came from a response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The typed plan-limit error, if this is one.
    pub fn billing_limit(&self) -> Option<&BillingLimitError> {
        match self {
            Self::BillingLimit(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::LimitModal;

    #[test]
    fn test_api_error_displays_server_message() {
        let err = Error::api(500, "server_error");
        assert_eq!(err.to_string(), "server_error");
        assert_eq!(err.status_code(), Some(500));
    }

    #[test]
    fn test_error_display_request() {
        let err = Error::Request("network unreachable".to_string());
        assert_eq!(err.to_string(), "Request error: network unreachable");
        assert_eq!(err.status_code(), None);
    }

    #[test]
    fn test_error_display_transport() {
        let err = Error::Transport("socket closed".to_string());
        assert_eq!(err.to_string(), "Transport error: socket closed");
    }

    #[test]
    fn test_billing_limit_accessor() {
        let err: Error = BillingLimitError {
            feature: "reports".to_string(),
            modal: LimitModal::default(),
            plan_id: "free".to_string(),
            used: 3,
            limit: 3,
        }
        .into();

        let limit = err.billing_limit().expect("billing limit error");
        assert_eq!(limit.feature, "reports");
        assert!(Error::Internal("x".into()).billing_limit().is_none());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
        assert!(err.to_string().starts_with("Serialization error:"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
