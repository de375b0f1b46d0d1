//! Pure mapping from realtime payloads to normalized records.
//!
//! Every function takes the record currently held by the store (if any) and
//! produces a complete replacement. A field is taken from the payload when it
//! is present and non-empty, otherwise from the current record, otherwise
//! from a field-specific default in [`crate::defaults`]. A realtime delta
//! therefore never downgrades a populated field to its default.
//!
//! `now` is injected so results are deterministic under test.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::defaults;
use crate::events::{AppointmentPayload, LeadPayload, ReminderOutcomePayload, ReminderUpdatePayload};
use crate::models::{
    AppointmentLeadRef, IntentLevel, ListingRef, NormalizedAppointment, NormalizedLead,
    ReminderOutcome,
};

/// Format an instant the way the dashboard API does (`2024-01-01T00:00:00.000Z`).
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Normalize a timestamp string to UTC, or return `fallback` if it is absent
/// or unparseable.
pub fn to_iso(value: Option<&str>, fallback: String) -> String {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(parse_timestamp)
        .map(iso_timestamp)
        .unwrap_or(fallback)
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// A non-empty string from the record, if any.
fn present(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.trim().is_empty())
}

fn present_str(value: &str) -> Option<&str> {
    Some(value).filter(|v| !v.trim().is_empty())
}

/// First present of `payload`, then `current`, else `default`.
fn pick(payload: Option<&String>, current: Option<&str>, default: &str) -> String {
    present(payload)
        .or(current.and_then(present_str))
        .unwrap_or(default)
        .to_string()
}

/// First present of `payload`, then `current`, else absent.
fn pick_opt(payload: Option<&String>, current: Option<&String>) -> Option<String> {
    present(payload).or(present(current)).map(str::to_string)
}

/// Merge a lead payload into the current record.
///
/// Returns `None` when the payload carries no `lead_id`.
pub fn map_lead_payload(
    payload: &LeadPayload,
    current: Option<&NormalizedLead>,
    now: DateTime<Utc>,
) -> Option<NormalizedLead> {
    let lead_id = present(payload.refs.lead_id.as_ref())?.to_string();
    let now_iso = iso_timestamp(now);

    let listing_id = pick_opt(
        payload.refs.listing_id.as_ref(),
        current.and_then(|c| c.listing_id.as_ref()),
    );
    let last_activity_at = to_iso(
        payload.last_activity_at.as_deref(),
        pick_opt(None, current.and_then(|c| c.last_activity_at.as_ref()))
            .unwrap_or_else(|| now_iso.clone()),
    );
    let created_at = to_iso(
        payload.created_at.as_deref(),
        current
            .and_then(|c| present_str(&c.created_at))
            .map(str::to_string)
            .unwrap_or_else(|| now_iso.clone()),
    );
    let summary = present(payload.lead_summary_preview.as_ref())
        .or(current.and_then(|c| present(c.lead_summary.as_ref())))
        .or(current.and_then(|c| present(c.last_message_preview.as_ref())))
        .unwrap_or(defaults::LEAD_SUMMARY)
        .to_string();

    let intent_level = payload
        .intent_level
        .as_deref()
        .and_then(IntentLevel::parse_loose)
        .or(current.map(|c| c.intent_level))
        .unwrap_or_default();
    let intent_score = payload
        .intent_score
        .map(|score| score.round() as i64)
        .or(current.map(|c| c.intent_score))
        .unwrap_or(0)
        .clamp(0, 100);

    let listing = listing_id.as_ref().map(|id| {
        let known = current
            .and_then(|c| c.listing.as_ref())
            .filter(|listing| &listing.id == id);
        ListingRef {
            id: id.clone(),
            address: pick_opt(
                payload.listing_address.as_ref(),
                known.and_then(|l| l.address.as_ref()),
            ),
            city: known.and_then(|l| l.city.clone()),
            state: known.and_then(|l| l.state.clone()),
            zip: known.and_then(|l| l.zip.clone()),
        }
    });

    Some(NormalizedLead {
        id: lead_id,
        name: pick(
            payload.full_name.as_ref(),
            current.map(|c| c.name.as_str()),
            defaults::LEAD_NAME,
        ),
        phone: pick_opt(payload.phone.as_ref(), current.and_then(|c| c.phone.as_ref())),
        email: pick_opt(payload.email.as_ref(), current.and_then(|c| c.email.as_ref())),
        status: pick(
            payload.status.as_ref(),
            current.map(|c| c.status.as_str()),
            defaults::LEAD_STATUS,
        ),
        source_type: pick(
            payload.source_type.as_ref(),
            current.map(|c| c.source_type.as_str()),
            defaults::UNKNOWN,
        ),
        intent_level,
        intent_score,
        timeline: pick(
            payload.timeline.as_ref(),
            current.map(|c| c.timeline.as_str()),
            defaults::UNKNOWN,
        ),
        financing: pick(
            payload.financing.as_ref(),
            current.map(|c| c.financing.as_str()),
            defaults::UNKNOWN,
        ),
        lead_summary: Some(summary.clone()),
        next_best_action: current.and_then(|c| c.next_best_action.clone()),
        last_activity_at: Some(last_activity_at),
        last_activity_relative: current
            .and_then(|c| present_str(&c.last_activity_relative))
            .unwrap_or(defaults::ACTIVITY_RELATIVE)
            .to_string(),
        last_message_preview: Some(summary),
        created_at,
        listing_id,
        last_agent_action_at: pick_opt(
            payload.last_agent_action_at.as_ref(),
            current.and_then(|c| c.last_agent_action_at.as_ref()),
        ),
        listing,
    })
}

/// Merge an appointment payload into the current record.
///
/// Returns `None` when the payload carries no `appointment_id`. The resolved
/// start is written to both `starts_at` and `start_iso`.
pub fn map_appointment_payload(
    payload: &AppointmentPayload,
    current: Option<&NormalizedAppointment>,
    now: DateTime<Utc>,
) -> Option<NormalizedAppointment> {
    let appointment_id = present(payload.refs.appointment_id.as_ref())?.to_string();

    let current_lead = current.and_then(|c| c.lead.as_ref());
    let current_listing = current.and_then(|c| c.listing.as_ref());
    let current_outcome = current.and_then(|c| c.last_reminder_outcome.as_ref());

    let lead_id = present(payload.refs.lead_id.as_ref())
        .or(current_lead.and_then(|l| present_str(&l.id)))
        .map(str::to_string);
    let listing_id = present(payload.refs.listing_id.as_ref())
        .or(current_listing.and_then(|l| present_str(&l.id)))
        .map(str::to_string);
    let starts_at = present(payload.starts_at.as_ref())
        .or(current.and_then(NormalizedAppointment::start).and_then(present_str))
        .map(str::to_string);
    let status = pick(
        payload.status.as_ref(),
        current.map(|c| c.status.as_str()),
        defaults::APPOINTMENT_STATUS,
    );

    let lead = match lead_id {
        Some(id) => Some(AppointmentLeadRef {
            id,
            name: pick(
                payload.lead_name.as_ref(),
                current_lead.map(|l| l.name.as_str()),
                defaults::LEAD_NAME,
            ),
            phone: pick_opt(payload.lead_phone.as_ref(), current_lead.and_then(|l| l.phone.as_ref())),
            email: pick_opt(payload.lead_email.as_ref(), current_lead.and_then(|l| l.email.as_ref())),
        }),
        None => current_lead.cloned(),
    };

    let listing = match listing_id {
        Some(id) => {
            let known = current_listing.filter(|l| l.id == id);
            Some(ListingRef {
                address: pick_opt(
                    payload.listing_address.as_ref(),
                    known.and_then(|l| l.address.as_ref()),
                ),
                city: known.and_then(|l| l.city.clone()),
                state: known.and_then(|l| l.state.clone()),
                zip: known.and_then(|l| l.zip.clone()),
                id,
            })
        }
        None => current_listing.cloned(),
    };

    let outcome_status = present(payload.last_reminder_outcome.as_ref())
        .or(current_outcome.and_then(|o| present_str(&o.status)));
    let last_reminder_outcome = match outcome_status {
        Some(status) => Some(ReminderOutcome {
            status: status.to_string(),
            reminder_type: current_outcome
                .and_then(|o| present_str(&o.reminder_type))
                .unwrap_or(defaults::REMINDER_TYPE)
                .to_string(),
            scheduled_for: current_outcome
                .and_then(|o| present_str(&o.scheduled_for))
                .map(str::to_string)
                .or_else(|| starts_at.clone())
                .unwrap_or_else(|| iso_timestamp(now)),
            provider_response: current_outcome.and_then(|o| o.provider_response.clone()),
        }),
        None => current_outcome.cloned(),
    };

    Some(NormalizedAppointment {
        id: appointment_id,
        start_iso: starts_at.clone(),
        starts_at,
        normalized_status: status.clone(),
        status,
        location: current.and_then(|c| c.location.clone()),
        lead,
        listing,
        confirmation_status: pick(
            payload.confirmation_status.as_ref(),
            current.map(|c| c.confirmation_status.as_str()),
            "",
        ),
        last_reminder_outcome,
    })
}

/// Reminder state after a `reminder.outcome` event.
///
/// Provider details are merged into the existing `provider_response`, keeping
/// any prior keys.
pub fn map_reminder_outcome(
    payload: &ReminderOutcomePayload,
    existing: Option<&ReminderOutcome>,
    now: DateTime<Utc>,
) -> ReminderOutcome {
    let mut provider_response = existing
        .and_then(|o| o.provider_response.clone())
        .unwrap_or_default();
    provider_response.insert(
        "provider".to_string(),
        Value::String(pick(payload.provider.as_ref(), None, defaults::REMINDER_PROVIDER)),
    );
    provider_response.insert(
        "notes".to_string(),
        Value::String(pick(payload.notes.as_ref(), None, "")),
    );

    ReminderOutcome {
        status: pick(payload.outcome.as_ref(), None, defaults::UNKNOWN),
        reminder_type: pick(
            None,
            existing.map(|o| o.reminder_type.as_str()),
            defaults::REMINDER_TYPE,
        ),
        scheduled_for: present(payload.occurred_at.as_ref())
            .map(str::to_string)
            .unwrap_or_else(|| iso_timestamp(now)),
        provider_response: Some(provider_response),
    }
}

/// Reminder state after a `reminder.updated` event.
pub fn map_reminder_update(
    payload: &ReminderUpdatePayload,
    existing: Option<&ReminderOutcome>,
    now: DateTime<Utc>,
) -> ReminderOutcome {
    let status = present(payload.outcome.as_ref())
        .or(present(payload.status.as_ref()))
        .or(existing.and_then(|o| present_str(&o.status)))
        .unwrap_or(defaults::UNKNOWN)
        .to_string();
    let now_iso = iso_timestamp(now);

    ReminderOutcome {
        status,
        reminder_type: pick(
            payload.reminder_type.as_ref(),
            existing.map(|o| o.reminder_type.as_str()),
            defaults::REMINDER_TYPE,
        ),
        scheduled_for: pick(
            payload.scheduled_for.as_ref(),
            existing.map(|o| o.scheduled_for.as_str()),
            &now_iso,
        ),
        provider_response: payload
            .provider_response
            .clone()
            .or_else(|| existing.and_then(|o| o.provider_response.clone())),
    }
}
