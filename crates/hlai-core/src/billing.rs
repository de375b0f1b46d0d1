//! Billing entitlement error contract.
//!
//! Every API-calling function inspects the JSON body of a non-2xx response.
//! When `error == "limit_reached"` the failure becomes a typed
//! [`BillingLimitError`] carrying upgrade-prompt copy; any other `error`
//! string becomes a plain [`Error::Api`] with that string as its message.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::defaults::LIMIT_REACHED;
use crate::error::Error;
use crate::lenient;

/// Upgrade-prompt copy shown when a plan limit is hit. Fields the server
/// leaves out keep their default copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitModal {
    pub title: String,
    pub body: String,
    pub primary: String,
    pub secondary: String,
}

impl Default for LimitModal {
    fn default() -> Self {
        Self {
            title: "You're at your limit.".to_string(),
            body: "Upgrade to keep capturing leads and sending reports without interruptions."
                .to_string(),
            primary: "Upgrade now".to_string(),
            secondary: "Not now".to_string(),
        }
    }
}

/// A plan-limit violation reported by the server.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("limit_reached: {feature} ({used}/{limit} on plan {plan_id})")]
pub struct BillingLimitError {
    /// Key of the limited capability (e.g. `reports`).
    pub feature: String,
    pub modal: LimitModal,
    pub plan_id: String,
    pub used: i64,
    pub limit: i64,
}

/// Body of a non-2xx dashboard API response. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default, deserialize_with = "lenient::non_empty_string")]
    pub error: Option<String>,
    #[serde(default, deserialize_with = "lenient::non_empty_string")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient::non_empty_string")]
    pub feature: Option<String>,
    #[serde(default)]
    pub modal: Option<Value>,
    #[serde(default, deserialize_with = "lenient::non_empty_string")]
    pub plan_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::count")]
    pub used: i64,
    #[serde(default, deserialize_with = "lenient::count")]
    pub limit: i64,
}

impl ApiErrorBody {
    /// Parse a response body; anything that is not a JSON object reads as empty.
    pub fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }

    /// Whether the server reported the `limit_reached` sentinel.
    pub fn is_limit_reached(&self) -> bool {
        self.error.as_deref() == Some(LIMIT_REACHED)
    }

    /// Convert into the error a caller should see for `status`.
    pub fn into_error(self, status: u16) -> Error {
        if self.is_limit_reached() {
            let modal = self
                .modal
                .and_then(|m| serde_json::from_value::<LimitModal>(m).ok())
                .unwrap_or_default();
            return BillingLimitError {
                feature: self.feature.unwrap_or_else(|| "unknown".to_string()),
                modal,
                plan_id: self.plan_id.unwrap_or_else(|| "free".to_string()),
                used: self.used,
                limit: self.limit,
            }
            .into();
        }

        let message = self
            .error
            .or(self.message)
            .unwrap_or_else(|| format!("Request failed ({})", status));
        Error::api(status, message)
    }
}

/// Map a non-2xx response to the error contract.
pub fn error_from_response(status: u16, body: &str) -> Error {
    ApiErrorBody::parse(body).into_error(status)
}
