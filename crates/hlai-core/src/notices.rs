//! User-facing notices: API-error reports and realtime toasts.
//!
//! Neither kind is rendered here. [`ApiErrorNotifier`] fans notices out to
//! whichever UI layer subscribes, and [`ToastNotice::for_event`] decides which
//! realtime events deserve a toast and with what copy.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::defaults::{NOTICE_CHANNEL_CAPACITY, TOAST_DURATION_MS};
use crate::error::Error;
use crate::events::{RealtimeEvent, RealtimeEventEnvelope};

/// A failed API call reported to the UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiErrorNotice {
    pub title: String,
    pub description: String,
    /// Where the failure happened (e.g. `dashboard.load_leads`).
    pub context: Option<String>,
    /// Display form of the underlying error.
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ApiErrorNotice {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            context: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_error(mut self, error: &Error) -> Self {
        self.error = Some(error.to_string());
        self
    }
}

/// Process-local fan-out of [`ApiErrorNotice`]s.
#[derive(Debug, Clone)]
pub struct ApiErrorNotifier {
    sender: broadcast::Sender<ApiErrorNotice>,
}

impl Default for ApiErrorNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiErrorNotifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(NOTICE_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ApiErrorNotice> {
        self.sender.subscribe()
    }

    /// Publish a notice. Returns how many subscribers received it; zero is
    /// not an error.
    pub fn notify(&self, notice: ApiErrorNotice) -> usize {
        debug!(
            subsystem = "client",
            title = %notice.title,
            context = notice.context.as_deref().unwrap_or_default(),
            "API error notice"
        );
        self.sender.send(notice).unwrap_or(0)
    }
}

/// A transient notification triggered by a realtime event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToastNotice {
    pub title: String,
    pub body: String,
    #[serde(serialize_with = "serialize_duration_ms")]
    pub duration: Duration,
}

fn serialize_duration_ms<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

impl ToastNotice {
    pub fn new(title: &str, body: &str) -> Self {
        Self {
            title: title.to_string(),
            body: body.to_string(),
            duration: Duration::from_millis(TOAST_DURATION_MS),
        }
    }

    /// Toast for an event, if the event warrants one.
    ///
    /// Only `lead.created` and the four known `reminder.outcome` outcomes
    /// (matched case-insensitively) produce a toast.
    pub fn for_event(envelope: &RealtimeEventEnvelope) -> Option<Self> {
        match &envelope.event {
            RealtimeEvent::LeadCreated(_) => {
                Some(Self::new("New lead captured", "Tap to open and follow up."))
            }
            RealtimeEvent::ReminderOutcome(payload) => {
                let outcome = payload.outcome.as_deref()?.to_lowercase();
                let (title, body) = match outcome.as_str() {
                    "confirmed" => ("Appointment confirmed", "Nice \u{2014} one less no-show."),
                    "reschedule_requested" => ("Reschedule requested", "Tap to pick a new time."),
                    "voicemail_left" => ("Voicemail left", "We\u{2019}ll try again if needed."),
                    "failed" => ("Reminder failed", "Tap to retry or call the lead."),
                    _ => return None,
                };
                Some(Self::new(title, body))
            }
            _ => None,
        }
    }
}
