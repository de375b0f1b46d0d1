//! Request and response shapes of the dashboard API.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use hlai_core::lenient;
use hlai_core::{NormalizedAppointment, NormalizedLead, RoiMetrics};

/// Leads list tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LeadsTab {
    #[default]
    New,
    All,
}

impl LeadsTab {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::All => "All",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadsSort {
    HotFirst,
    Newest,
}

impl LeadsSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HotFirst => "hot_first",
            Self::Newest => "newest",
        }
    }
}

/// Filters for the leads list. A value of `"all"` is the same as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeadsFilter {
    pub tab: LeadsTab,
    pub status: Option<String>,
    pub intent: Option<String>,
    pub listing_id: Option<String>,
    /// `24h`, `7d` or `30d`.
    pub timeframe: Option<String>,
    pub sort: Option<LeadsSort>,
}

impl LeadsFilter {
    pub(crate) fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("tab", self.tab.as_str().to_string())];
        let filters = [
            ("status", &self.status),
            ("intent", &self.intent),
            ("listingId", &self.listing_id),
            ("timeframe", &self.timeframe),
        ];
        for (key, value) in filters {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty() && *v != "all") {
                pairs.push((key, value.to_string()));
            }
        }
        if let Some(sort) = self.sort {
            pairs.push(("sort", sort.as_str().to_string()));
        }
        pairs
    }
}

/// Appointment list window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppointmentsView {
    Today,
    #[default]
    Week,
}

impl AppointmentsView {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Week => "week",
        }
    }
}

/// A local agent action on a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentAction {
    CallClicked,
    EmailClicked,
    StatusChanged,
    AppointmentCreated,
    AppointmentUpdated,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentActionRequest {
    pub lead_id: String,
    pub action: AgentAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl AgentActionRequest {
    pub fn new(lead_id: impl Into<String>, action: AgentAction) -> Self {
        Self {
            lead_id: lead_id.into(),
            action,
            metadata: None,
        }
    }
}

/// The action row the server recorded.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AgentActionRecord {
    pub id: Option<String>,
    pub lead_id: String,
    pub action: String,
    pub created_at: String,
}

/// Leads list response, sent either as `{ "leads": [...] }` or a bare array.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "LeadsBody")]
pub struct LeadsPage {
    pub leads: Vec<NormalizedLead>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LeadsBody {
    List(Vec<NormalizedLead>),
    Page {
        #[serde(default, deserialize_with = "lenient::list_or_default")]
        leads: Vec<NormalizedLead>,
    },
}

impl From<LeadsBody> for LeadsPage {
    fn from(body: LeadsBody) -> Self {
        match body {
            LeadsBody::List(leads) | LeadsBody::Page { leads } => Self { leads },
        }
    }
}

/// Appointments list response, sent either as an object or a bare array.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "AppointmentsBody")]
pub struct AppointmentsPage {
    pub appointments: Vec<NormalizedAppointment>,
    pub counts: BTreeMap<String, i64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AppointmentsBody {
    List(Vec<NormalizedAppointment>),
    Page {
        #[serde(default, deserialize_with = "lenient::list_or_default")]
        appointments: Vec<NormalizedAppointment>,
        #[serde(default, deserialize_with = "lenient::count_map")]
        counts: BTreeMap<String, i64>,
    },
}

impl From<AppointmentsBody> for AppointmentsPage {
    fn from(body: AppointmentsBody) -> Self {
        match body {
            AppointmentsBody::List(appointments) => Self {
                appointments,
                counts: BTreeMap::new(),
            },
            AppointmentsBody::Page {
                appointments,
                counts,
            } => Self {
                appointments,
                counts,
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RoiMetricsResponse {
    pub metrics: RoiMetrics,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct AgentActionResponse {
    pub action: AgentActionRecord,
}

#[derive(Debug, Serialize)]
pub(crate) struct EntitlementCheckRequest<'a> {
    pub feature: &'a str,
    pub requested_units: u32,
    pub context: &'a Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ReportTrackRequest<'a> {
    pub listing_id: &'a str,
    pub reference_id: String,
}
