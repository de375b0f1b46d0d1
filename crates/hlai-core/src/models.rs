//! Normalized entity records and REST snapshot shapes.
//!
//! These types mirror the JSON returned by the dashboard API so that bulk
//! snapshots deserialize straight into the records the realtime store holds.
//! Server-computed aggregates (command center, metrics, billing) are treated
//! as opaque and only ever replaced wholesale.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::events::{AppointmentPayload, LeadPayload};
use crate::lenient;

// =============================================================================
// LEADS
// =============================================================================

/// Lead buying intent bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum IntentLevel {
    Hot,
    #[default]
    Warm,
    Cold,
}

impl IntentLevel {
    /// Case-insensitive parse; `None` for anything unrecognized.
    pub fn parse_loose(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "hot" => Some(Self::Hot),
            "warm" => Some(Self::Warm),
            "cold" => Some(Self::Cold),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hot => "Hot",
            Self::Warm => "Warm",
            Self::Cold => "Cold",
        }
    }
}

impl fmt::Display for IntentLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for IntentLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value
            .as_ref()
            .and_then(Value::as_str)
            .and_then(Self::parse_loose)
            .unwrap_or_default())
    }
}

/// Listing summary attached to leads and appointments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingRef {
    #[serde(default, deserialize_with = "lenient::string_or_default")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
}

/// A lead as the dashboard displays it, keyed by `id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizedLead {
    #[serde(deserialize_with = "lenient::string_or_default")]
    pub id: String,
    #[serde(deserialize_with = "lenient::string_or_default")]
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    #[serde(deserialize_with = "lenient::string_or_default")]
    pub status: String,
    #[serde(deserialize_with = "lenient::string_or_default")]
    pub source_type: String,
    pub intent_level: IntentLevel,
    /// 0 to 100.
    #[serde(deserialize_with = "lenient::count")]
    pub intent_score: i64,
    #[serde(deserialize_with = "lenient::string_or_default")]
    pub timeline: String,
    #[serde(deserialize_with = "lenient::string_or_default")]
    pub financing: String,
    pub lead_summary: Option<String>,
    pub next_best_action: Option<String>,
    pub last_activity_at: Option<String>,
    #[serde(deserialize_with = "lenient::string_or_default")]
    pub last_activity_relative: String,
    pub last_message_preview: Option<String>,
    #[serde(deserialize_with = "lenient::string_or_default")]
    pub created_at: String,
    pub listing_id: Option<String>,
    pub last_agent_action_at: Option<String>,
    pub listing: Option<ListingRef>,
}

// =============================================================================
// APPOINTMENTS
// =============================================================================

/// Lead summary attached to an appointment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppointmentLeadRef {
    #[serde(deserialize_with = "lenient::string_or_default")]
    pub id: String,
    #[serde(deserialize_with = "lenient::string_or_default")]
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Latest reminder attempt for an appointment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderOutcome {
    #[serde(deserialize_with = "lenient::string_or_default")]
    pub status: String,
    #[serde(deserialize_with = "lenient::string_or_default")]
    pub reminder_type: String,
    #[serde(deserialize_with = "lenient::string_or_default")]
    pub scheduled_for: String,
    #[serde(deserialize_with = "lenient::object")]
    pub provider_response: Option<Map<String, Value>>,
}

/// An appointment as the dashboard displays it, keyed by `id`.
///
/// `startsAt` and `startIso` always hold the same instant; both keys are kept
/// for older consumers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizedAppointment {
    #[serde(deserialize_with = "lenient::string_or_default")]
    pub id: String,
    #[serde(rename = "startsAt")]
    pub starts_at: Option<String>,
    #[serde(rename = "startIso")]
    pub start_iso: Option<String>,
    #[serde(deserialize_with = "lenient::string_or_default")]
    pub status: String,
    #[serde(rename = "normalizedStatus", deserialize_with = "lenient::string_or_default")]
    pub normalized_status: String,
    pub location: Option<String>,
    pub lead: Option<AppointmentLeadRef>,
    pub listing: Option<ListingRef>,
    #[serde(deserialize_with = "lenient::string_or_default")]
    pub confirmation_status: String,
    pub last_reminder_outcome: Option<ReminderOutcome>,
}

impl NormalizedAppointment {
    /// Start instant, preferring `startsAt`.
    pub fn start(&self) -> Option<&str> {
        self.starts_at.as_deref().or(self.start_iso.as_deref())
    }
}

// =============================================================================
// COMMAND CENTER
// =============================================================================

/// Headline counts of the command center.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandCenterStats {
    #[serde(deserialize_with = "lenient::count")]
    pub new_leads_today: i64,
    #[serde(deserialize_with = "lenient::count")]
    pub unworked_leads: i64,
    #[serde(deserialize_with = "lenient::count")]
    pub appointments_today: i64,
    #[serde(deserialize_with = "lenient::count")]
    pub confirmations_7d: i64,
}

/// Queue rows share the realtime lead payload shape.
pub type LeadQueueItem = LeadPayload;

/// Queue rows share the realtime appointment payload shape.
pub type AppointmentQueueItem = AppointmentPayload;

/// Ranked work queues of the command center.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandCenterQueues {
    pub new_leads_to_work: Vec<LeadQueueItem>,
    pub appointments_coming_up: Vec<AppointmentQueueItem>,
    pub needs_attention: Vec<AppointmentQueueItem>,
}

/// Server-computed command-center aggregate, replaced atomically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandCenterSnapshot {
    pub stats: CommandCenterStats,
    pub queues: CommandCenterQueues,
}

// =============================================================================
// METRICS
// =============================================================================

/// Reporting window for derived metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MetricsRange {
    #[default]
    #[serde(rename = "7d")]
    SevenDays,
    #[serde(rename = "30d")]
    ThirtyDays,
}

impl MetricsRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SevenDays => "7d",
            Self::ThirtyDays => "30d",
        }
    }
}

impl fmt::Display for MetricsRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source label with its lead count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopSource {
    #[serde(deserialize_with = "lenient::non_empty_string")]
    pub label: Option<String>,
    #[serde(deserialize_with = "lenient::count")]
    pub count: i64,
}

/// Agent-level ROI metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoiMetrics {
    #[serde(deserialize_with = "lenient::count")]
    pub leads_captured: i64,
    #[serde(deserialize_with = "lenient::count")]
    pub leads_contacted: i64,
    #[serde(deserialize_with = "lenient::count")]
    pub appointments_set: i64,
    #[serde(deserialize_with = "lenient::count")]
    pub appointments_confirmed: i64,
    #[serde(deserialize_with = "lenient::count")]
    pub confirmations: i64,
    #[serde(deserialize_with = "lenient::count")]
    pub reschedule_requests: i64,
    #[serde(deserialize_with = "lenient::number")]
    pub reminder_success_rate: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub time_to_first_action_minutes: Option<f64>,
    #[serde(deserialize_with = "lenient::count")]
    pub unworked_leads: i64,
    #[serde(deserialize_with = "lenient::non_empty_string")]
    pub top_listing_id: Option<String>,
    #[serde(deserialize_with = "lenient::count")]
    pub top_listing_leads: i64,
    pub top_source: Option<TopSource>,
}

impl RoiMetrics {
    /// True when any headline number is non-zero.
    pub fn has_data(&self) -> bool {
        self.leads_captured > 0
            || self.appointments_set > 0
            || self.confirmations > 0
            || self.top_source.as_ref().is_some_and(|s| s.count > 0)
    }
}

/// Per-listing counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingPerformanceMetrics {
    #[serde(deserialize_with = "lenient::count")]
    pub leads_count: i64,
    #[serde(deserialize_with = "lenient::count")]
    pub appointments_count: i64,
    #[serde(deserialize_with = "lenient::count")]
    pub appointments_confirmed: i64,
    pub status_breakdown: BTreeMap<String, f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub qr_usage: Option<f64>,
    pub top_source: Option<TopSource>,
}

/// Lead totals for one source type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceTypeTotal {
    #[serde(deserialize_with = "lenient::non_empty_string")]
    pub source_type: Option<String>,
    #[serde(deserialize_with = "lenient::count")]
    pub total: i64,
}

/// Lead totals for one tracked source key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceKeyTotal {
    #[serde(deserialize_with = "lenient::non_empty_string")]
    pub source_key: Option<String>,
    #[serde(deserialize_with = "lenient::count")]
    pub total: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceBreakdown {
    pub by_source_type: Vec<SourceTypeTotal>,
    pub by_source_key: Vec<SourceKeyTotal>,
}

/// Listing performance response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingPerformanceReport {
    #[serde(deserialize_with = "lenient::non_empty_string")]
    pub listing_id: Option<String>,
    pub metrics: ListingPerformanceMetrics,
    pub breakdown: SourceBreakdown,
}

impl ListingPerformanceReport {
    /// The leading lead source: the server's explicit label when given,
    /// otherwise the highest-total source type. Label `None` when empty.
    pub fn top_source(&self) -> TopSource {
        if let Some(explicit) = &self.metrics.top_source {
            if explicit.label.is_some() {
                return explicit.clone();
            }
        }

        // rev() so ties resolve to the first row, as the server ranks them
        match self
            .breakdown
            .by_source_type
            .iter()
            .rev()
            .max_by_key(|row| row.total)
        {
            Some(top) => TopSource {
                label: Some(prettify_source_label(top.source_type.as_deref())),
                count: top.total,
            },
            None => TopSource {
                label: Some("None".to_string()),
                count: 0,
            },
        }
    }

    pub fn has_data(&self) -> bool {
        self.metrics.leads_count > 0
            || self.metrics.appointments_count > 0
            || self.metrics.appointments_confirmed > 0
    }
}

/// Human label for a lead source type.
pub fn prettify_source_label(value: Option<&str>) -> String {
    let normalized = value.unwrap_or_default().to_lowercase();
    match normalized.as_str() {
        "" => "None".to_string(),
        "open_house" => "Open House".to_string(),
        "qr" | "sign" => "Sign".to_string(),
        "social" => "Social".to_string(),
        "link" => "Link".to_string(),
        other => {
            let mut label = String::with_capacity(other.len());
            let mut at_word_start = true;
            for c in other.replace('_', " ").chars() {
                let is_word = c.is_alphanumeric();
                if is_word && at_word_start {
                    label.extend(c.to_uppercase());
                } else {
                    label.push(c);
                }
                at_word_start = !is_word;
            }
            label
        }
    }
}

/// ROI snapshot shown on the billing page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingValueProof {
    #[serde(deserialize_with = "lenient::non_empty_string")]
    pub range: Option<String>,
    pub roi: Option<RoiMetrics>,
}

// =============================================================================
// BILLING
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingPlan {
    pub id: String,
    pub name: String,
    pub status: String,
    #[serde(deserialize_with = "lenient::number")]
    pub price_monthly_usd: Option<f64>,
    pub current_period_start: Option<String>,
    pub current_period_end: Option<String>,
    pub cancel_at_period_end: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageMeter {
    #[serde(deserialize_with = "lenient::count")]
    pub used: i64,
    #[serde(deserialize_with = "lenient::count")]
    pub limit: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingUsage {
    pub active_listings: UsageMeter,
    pub reports_per_month: UsageMeter,
    pub reminder_calls_per_month: UsageMeter,
    pub stored_leads_cap: UsageMeter,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageWarning {
    pub key: String,
    #[serde(deserialize_with = "lenient::number")]
    pub percent: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingCopy {
    pub header: String,
    pub subhead: String,
    pub warning_banner: String,
}

/// Plan, usage meters and limit warnings for the agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardBilling {
    pub plan: BillingPlan,
    pub usage: BillingUsage,
    pub limits: BTreeMap<String, f64>,
    pub warnings: Vec<UsageWarning>,
    pub copy: Option<BillingCopy>,
}
