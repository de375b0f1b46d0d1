//! Realtime event types, envelope schema, and wire parsing.
//!
//! The dashboard backend pushes JSON frames over the realtime socket:
//!
//! ```text
//! {"type":"lead.created","v":1,"ts":"2024-01-01T00:00:00Z","agent_id":"a1","payload":{"lead_id":"L1",...}}
//! ```
//!
//! Frames are parsed into a [`RealtimeEventEnvelope`] whose `event` is a
//! tagged union over the closed [`RealtimeEventType`] set. Each variant carries
//! a partially-optional payload record; every payload field tolerates missing
//! or wrong-typed values (see [`crate::lenient`]). Envelopes are immutable once
//! parsed and consumers only ever borrow them.
//!
//! ## Schema Evolution
//!
//! - `v` is the protocol version; anything other than `1` is rejected.
//! - Unknown payload fields are ignored.
//! - Unknown event types are rejected at parse time.

use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::defaults::PROTOCOL_VERSION;
use crate::lenient;

// ============================================================================
// Event types
// ============================================================================

/// Closed set of realtime event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RealtimeEventType {
    #[serde(rename = "lead.created")]
    LeadCreated,
    #[serde(rename = "lead.updated")]
    LeadUpdated,
    #[serde(rename = "lead.status_changed")]
    LeadStatusChanged,
    #[serde(rename = "appointment.created")]
    AppointmentCreated,
    #[serde(rename = "appointment.updated")]
    AppointmentUpdated,
    #[serde(rename = "reminder.outcome")]
    ReminderOutcome,
    #[serde(rename = "reminder.updated")]
    ReminderUpdated,
    #[serde(rename = "listing.updated")]
    ListingUpdated,
    #[serde(rename = "listing.performance.updated")]
    ListingPerformanceUpdated,
    #[serde(rename = "system.ready")]
    SystemReady,
}

impl RealtimeEventType {
    /// Every event type, in protocol order.
    pub const ALL: [RealtimeEventType; 10] = [
        Self::LeadCreated,
        Self::LeadUpdated,
        Self::LeadStatusChanged,
        Self::AppointmentCreated,
        Self::AppointmentUpdated,
        Self::ReminderOutcome,
        Self::ReminderUpdated,
        Self::ListingUpdated,
        Self::ListingPerformanceUpdated,
        Self::SystemReady,
    ];

    /// Wire name (e.g. `"lead.created"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LeadCreated => "lead.created",
            Self::LeadUpdated => "lead.updated",
            Self::LeadStatusChanged => "lead.status_changed",
            Self::AppointmentCreated => "appointment.created",
            Self::AppointmentUpdated => "appointment.updated",
            Self::ReminderOutcome => "reminder.outcome",
            Self::ReminderUpdated => "reminder.updated",
            Self::ListingUpdated => "listing.updated",
            Self::ListingPerformanceUpdated => "listing.performance.updated",
            Self::SystemReady => "system.ready",
        }
    }
}

impl FromStr for RealtimeEventType {
    type Err = EnvelopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| EnvelopeError::UnknownType(s.to_string()))
    }
}

impl fmt::Display for RealtimeEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Payloads
// ============================================================================

/// Entity ids any payload may carry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityRefs {
    #[serde(
        default,
        deserialize_with = "lenient::non_empty_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub lead_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::non_empty_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub appointment_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::non_empty_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub listing_id: Option<String>,
}

impl EntityRefs {
    /// First present of lead, appointment, listing id.
    pub fn primary_id(&self) -> Option<&str> {
        self.lead_id
            .as_deref()
            .or(self.appointment_id.as_deref())
            .or(self.listing_id.as_deref())
    }
}

/// Fields of `lead.*` events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeadPayload {
    #[serde(flatten)]
    pub refs: EntityRefs,
    #[serde(default, deserialize_with = "lenient::non_empty_string", skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::non_empty_string", skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "lenient::non_empty_string", skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient::non_empty_string", skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient::non_empty_string", skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::non_empty_string", skip_serializing_if = "Option::is_none")]
    pub intent_level: Option<String>,
    #[serde(default, deserialize_with = "lenient::number", skip_serializing_if = "Option::is_none")]
    pub intent_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient::non_empty_string", skip_serializing_if = "Option::is_none")]
    pub timeline: Option<String>,
    #[serde(default, deserialize_with = "lenient::non_empty_string", skip_serializing_if = "Option::is_none")]
    pub financing: Option<String>,
    #[serde(default, deserialize_with = "lenient::non_empty_string", skip_serializing_if = "Option::is_none")]
    pub lead_summary_preview: Option<String>,
    #[serde(default, deserialize_with = "lenient::non_empty_string", skip_serializing_if = "Option::is_none")]
    pub last_activity_at: Option<String>,
    #[serde(default, deserialize_with = "lenient::non_empty_string", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "lenient::non_empty_string", skip_serializing_if = "Option::is_none")]
    pub listing_address: Option<String>,
    #[serde(default, deserialize_with = "lenient::non_empty_string", skip_serializing_if = "Option::is_none")]
    pub last_agent_action_at: Option<String>,
}

/// Fields of `appointment.*` events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppointmentPayload {
    #[serde(flatten)]
    pub refs: EntityRefs,
    #[serde(default, deserialize_with = "lenient::non_empty_string", skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<String>,
    #[serde(default, deserialize_with = "lenient::non_empty_string", skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient::non_empty_string", skip_serializing_if = "Option::is_none")]
    pub lead_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::non_empty_string", skip_serializing_if = "Option::is_none")]
    pub lead_phone: Option<String>,
    #[serde(default, deserialize_with = "lenient::non_empty_string", skip_serializing_if = "Option::is_none")]
    pub lead_email: Option<String>,
    #[serde(default, deserialize_with = "lenient::non_empty_string", skip_serializing_if = "Option::is_none")]
    pub listing_address: Option<String>,
    #[serde(default, deserialize_with = "lenient::non_empty_string", skip_serializing_if = "Option::is_none")]
    pub confirmation_status: Option<String>,
    #[serde(default, deserialize_with = "lenient::non_empty_string", skip_serializing_if = "Option::is_none")]
    pub last_reminder_outcome: Option<String>,
}

/// Fields of `reminder.outcome` events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReminderOutcomePayload {
    #[serde(flatten)]
    pub refs: EntityRefs,
    #[serde(default, deserialize_with = "lenient::non_empty_string", skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(default, deserialize_with = "lenient::non_empty_string", skip_serializing_if = "Option::is_none")]
    pub occurred_at: Option<String>,
    #[serde(default, deserialize_with = "lenient::non_empty_string", skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, deserialize_with = "lenient::non_empty_string", skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Fields of `reminder.updated` events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReminderUpdatePayload {
    #[serde(flatten)]
    pub refs: EntityRefs,
    #[serde(default, deserialize_with = "lenient::non_empty_string", skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(default, deserialize_with = "lenient::non_empty_string", skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient::non_empty_string", skip_serializing_if = "Option::is_none")]
    pub reminder_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::non_empty_string", skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<String>,
    #[serde(default, deserialize_with = "lenient::object", skip_serializing_if = "Option::is_none")]
    pub provider_response: Option<Map<String, Value>>,
}

// ============================================================================
// Events
// ============================================================================

/// A realtime event, one variant per [`RealtimeEventType`].
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    LeadCreated(LeadPayload),
    LeadUpdated(LeadPayload),
    LeadStatusChanged(LeadPayload),
    AppointmentCreated(AppointmentPayload),
    AppointmentUpdated(AppointmentPayload),
    ReminderOutcome(ReminderOutcomePayload),
    ReminderUpdated(ReminderUpdatePayload),
    ListingUpdated(EntityRefs),
    ListingPerformanceUpdated(EntityRefs),
    SystemReady(EntityRefs),
}

impl RealtimeEvent {
    /// The closed type tag of this event.
    pub fn event_type(&self) -> RealtimeEventType {
        match self {
            Self::LeadCreated(_) => RealtimeEventType::LeadCreated,
            Self::LeadUpdated(_) => RealtimeEventType::LeadUpdated,
            Self::LeadStatusChanged(_) => RealtimeEventType::LeadStatusChanged,
            Self::AppointmentCreated(_) => RealtimeEventType::AppointmentCreated,
            Self::AppointmentUpdated(_) => RealtimeEventType::AppointmentUpdated,
            Self::ReminderOutcome(_) => RealtimeEventType::ReminderOutcome,
            Self::ReminderUpdated(_) => RealtimeEventType::ReminderUpdated,
            Self::ListingUpdated(_) => RealtimeEventType::ListingUpdated,
            Self::ListingPerformanceUpdated(_) => RealtimeEventType::ListingPerformanceUpdated,
            Self::SystemReady(_) => RealtimeEventType::SystemReady,
        }
    }

    /// Entity ids carried by the payload.
    pub fn refs(&self) -> &EntityRefs {
        match self {
            Self::LeadCreated(p) | Self::LeadUpdated(p) | Self::LeadStatusChanged(p) => &p.refs,
            Self::AppointmentCreated(p) | Self::AppointmentUpdated(p) => &p.refs,
            Self::ReminderOutcome(p) => &p.refs,
            Self::ReminderUpdated(p) => &p.refs,
            Self::ListingUpdated(r) | Self::ListingPerformanceUpdated(r) | Self::SystemReady(r) => r,
        }
    }

    /// Decode a payload object for the given type.
    fn from_payload(event_type: RealtimeEventType, payload: Value) -> Result<Self, EnvelopeError> {
        fn decode<T: serde::de::DeserializeOwned>(payload: Value) -> Result<T, EnvelopeError> {
            serde_json::from_value(payload).map_err(|e| EnvelopeError::Malformed(e.to_string()))
        }

        Ok(match event_type {
            RealtimeEventType::LeadCreated => Self::LeadCreated(decode(payload)?),
            RealtimeEventType::LeadUpdated => Self::LeadUpdated(decode(payload)?),
            RealtimeEventType::LeadStatusChanged => Self::LeadStatusChanged(decode(payload)?),
            RealtimeEventType::AppointmentCreated => Self::AppointmentCreated(decode(payload)?),
            RealtimeEventType::AppointmentUpdated => Self::AppointmentUpdated(decode(payload)?),
            RealtimeEventType::ReminderOutcome => Self::ReminderOutcome(decode(payload)?),
            RealtimeEventType::ReminderUpdated => Self::ReminderUpdated(decode(payload)?),
            RealtimeEventType::ListingUpdated => Self::ListingUpdated(decode(payload)?),
            RealtimeEventType::ListingPerformanceUpdated => {
                Self::ListingPerformanceUpdated(decode(payload)?)
            }
            RealtimeEventType::SystemReady => Self::SystemReady(decode(payload)?),
        })
    }
}

/// Borrowed view of a payload for serialization.
#[derive(Serialize)]
#[serde(untagged)]
enum PayloadRef<'a> {
    Lead(&'a LeadPayload),
    Appointment(&'a AppointmentPayload),
    ReminderOutcome(&'a ReminderOutcomePayload),
    ReminderUpdate(&'a ReminderUpdatePayload),
    Refs(&'a EntityRefs),
}

impl<'a> From<&'a RealtimeEvent> for PayloadRef<'a> {
    fn from(event: &'a RealtimeEvent) -> Self {
        match event {
            RealtimeEvent::LeadCreated(p)
            | RealtimeEvent::LeadUpdated(p)
            | RealtimeEvent::LeadStatusChanged(p) => Self::Lead(p),
            RealtimeEvent::AppointmentCreated(p) | RealtimeEvent::AppointmentUpdated(p) => {
                Self::Appointment(p)
            }
            RealtimeEvent::ReminderOutcome(p) => Self::ReminderOutcome(p),
            RealtimeEvent::ReminderUpdated(p) => Self::ReminderUpdate(p),
            RealtimeEvent::ListingUpdated(r)
            | RealtimeEvent::ListingPerformanceUpdated(r)
            | RealtimeEvent::SystemReady(r) => Self::Refs(r),
        }
    }
}

// ============================================================================
// Envelope
// ============================================================================

/// Reasons a frame is rejected before reaching the store.
#[derive(Debug, Error, PartialEq)]
pub enum EnvelopeError {
    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("missing event type")]
    MissingType,

    #[error("unknown event type: {0}")]
    UnknownType(String),

    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(String),
}

/// Raw wire shape, before validation.
#[derive(Deserialize)]
struct WireEnvelope {
    #[serde(rename = "type", default, deserialize_with = "lenient::non_empty_string")]
    event_type: Option<String>,
    #[serde(default)]
    v: Option<Value>,
    #[serde(default, deserialize_with = "lenient::non_empty_string")]
    ts: Option<String>,
    #[serde(default, deserialize_with = "lenient::non_empty_string")]
    agent_id: Option<String>,
    #[serde(default)]
    payload: Value,
}

/// A validated realtime event frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeEventEnvelope {
    /// Protocol version (always `1` after validation).
    pub v: i64,
    /// Server-assigned occurrence timestamp, kept verbatim.
    pub ts: String,
    /// Owning agent (tenant).
    pub agent_id: String,
    /// Typed event and payload.
    pub event: RealtimeEvent,
}

impl RealtimeEventEnvelope {
    /// Build a current-version envelope.
    pub fn new(event: RealtimeEvent, ts: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            v: PROTOCOL_VERSION,
            ts: ts.into(),
            agent_id: agent_id.into(),
            event,
        }
    }

    /// Parse and validate a text frame.
    pub fn parse(text: &str) -> Result<Self, EnvelopeError> {
        let wire: WireEnvelope =
            serde_json::from_str(text).map_err(|e| EnvelopeError::Malformed(e.to_string()))?;
        Self::from_wire(wire)
    }

    /// Validate an already-decoded JSON value.
    pub fn from_value(value: Value) -> Result<Self, EnvelopeError> {
        let wire: WireEnvelope =
            serde_json::from_value(value).map_err(|e| EnvelopeError::Malformed(e.to_string()))?;
        Self::from_wire(wire)
    }

    fn from_wire(wire: WireEnvelope) -> Result<Self, EnvelopeError> {
        let raw_type = wire.event_type.ok_or(EnvelopeError::MissingType)?;
        let event_type: RealtimeEventType = raw_type.parse()?;

        let version = wire.v.as_ref().and_then(Value::as_f64);
        if version != Some(PROTOCOL_VERSION as f64) {
            return Err(EnvelopeError::UnsupportedVersion(
                wire.v.map(|v| v.to_string()).unwrap_or_else(|| "none".to_string()),
            ));
        }

        let payload = match wire.payload {
            Value::Object(map) => Value::Object(map),
            _ => Value::Object(Map::new()),
        };

        Ok(Self {
            v: PROTOCOL_VERSION,
            ts: wire.ts.unwrap_or_default(),
            agent_id: wire.agent_id.unwrap_or_default(),
            event: RealtimeEvent::from_payload(event_type, payload)?,
        })
    }

    pub fn event_type(&self) -> RealtimeEventType {
        self.event.event_type()
    }

    pub fn refs(&self) -> &EntityRefs {
        self.event.refs()
    }

    /// Listing id carried by the payload, if any.
    pub fn listing_id(&self) -> Option<&str> {
        self.refs().listing_id.as_deref()
    }

    /// De-duplication key: `{type}:{entityId}:{ts}` where `entityId` is the
    /// first present of lead, appointment, listing id, else the type itself.
    pub fn identity_key(&self) -> String {
        let event_type = self.event_type().as_str();
        let entity_id = self.refs().primary_id().unwrap_or(event_type);
        format!("{}:{}:{}", event_type, entity_id, self.ts)
    }
}

impl Serialize for RealtimeEventEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("RealtimeEventEnvelope", 5)?;
        state.serialize_field("type", self.event_type().as_str())?;
        state.serialize_field("v", &self.v)?;
        state.serialize_field("ts", &self.ts)?;
        state.serialize_field("agent_id", &self.agent_id)?;
        state.serialize_field("payload", &PayloadRef::from(&self.event))?;
        state.end()
    }
}

// ============================================================================
// Tests
// ============================================================================
