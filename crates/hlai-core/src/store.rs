//! Realtime dashboard store.
//!
//! Holds normalized maps of leads and appointments, listing invalidation
//! signals, and the latest command-center snapshot. All writes go through the
//! entry points on [`RealtimeStore`]; realtime events are folded in by the
//! pure [`reduce`] function. Subscribers receive [`StoreChange`] notifications
//! over a broadcast channel, optionally filtered to a single [`StoreSlice`].
//!
//! ## Concurrency
//!
//! A single `RwLock` guards the state. Each mutation takes the write lock,
//! applies the change, releases the lock and only then publishes, so events
//! are applied one at a time in arrival order.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::defaults::STORE_CHANNEL_CAPACITY;
use crate::events::{RealtimeEvent, RealtimeEventEnvelope};
use crate::models::{CommandCenterSnapshot, NormalizedAppointment, NormalizedLead};
use crate::normalize::{
    map_appointment_payload, map_lead_payload, map_reminder_outcome, map_reminder_update,
};

/// A selectable part of the store state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreSlice {
    Leads,
    Appointments,
    ListingSignals,
    CommandCenter,
}

impl StoreSlice {
    pub const ALL: [StoreSlice; 4] = [
        Self::Leads,
        Self::Appointments,
        Self::ListingSignals,
        Self::CommandCenter,
    ];
}

/// Notification published after every store mutation.
#[derive(Debug, Clone)]
pub enum StoreChange {
    /// The given slice was modified.
    Slice(StoreSlice),
    /// A realtime event was applied (whether or not it changed anything).
    Event(Arc<RealtimeEventEnvelope>),
}

impl StoreChange {
    pub fn slice(&self) -> Option<StoreSlice> {
        match self {
            Self::Slice(slice) => Some(*slice),
            Self::Event(_) => None,
        }
    }
}

/// Complete store state.
#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    pub leads_by_id: HashMap<String, NormalizedLead>,
    pub appointments_by_id: HashMap<String, NormalizedAppointment>,
    /// Listing id to `ts` of the latest listing event.
    pub listing_signals_by_id: HashMap<String, String>,
    pub command_center: Option<CommandCenterSnapshot>,
    pub last_event: Option<Arc<RealtimeEventEnvelope>>,
}

/// Fold one realtime event into the state.
///
/// Only the entity addressed by the event is touched. Returns the slice that
/// changed, or `None` when the event was a no-op (missing id, unknown
/// appointment for a reminder, unchanged record, system event).
pub fn reduce(
    state: &mut DashboardState,
    envelope: &RealtimeEventEnvelope,
    now: DateTime<Utc>,
) -> Option<StoreSlice> {
    match &envelope.event {
        RealtimeEvent::LeadCreated(payload)
        | RealtimeEvent::LeadUpdated(payload)
        | RealtimeEvent::LeadStatusChanged(payload) => {
            let lead_id = payload.refs.lead_id.as_deref()?;
            let lead = map_lead_payload(payload, state.leads_by_id.get(lead_id), now)?;
            if state.leads_by_id.get(&lead.id) == Some(&lead) {
                return None;
            }
            state.leads_by_id.insert(lead.id.clone(), lead);
            Some(StoreSlice::Leads)
        }

        RealtimeEvent::AppointmentCreated(payload) | RealtimeEvent::AppointmentUpdated(payload) => {
            let appointment_id = payload.refs.appointment_id.as_deref()?;
            let appointment = map_appointment_payload(
                payload,
                state.appointments_by_id.get(appointment_id),
                now,
            )?;
            if state.appointments_by_id.get(&appointment.id) == Some(&appointment) {
                return None;
            }
            state
                .appointments_by_id
                .insert(appointment.id.clone(), appointment);
            Some(StoreSlice::Appointments)
        }

        RealtimeEvent::ReminderOutcome(payload) => {
            let appointment_id = payload.refs.appointment_id.as_deref()?;
            let existing = state.appointments_by_id.get_mut(appointment_id)?;
            let outcome =
                map_reminder_outcome(payload, existing.last_reminder_outcome.as_ref(), now);
            existing.last_reminder_outcome = Some(outcome);
            Some(StoreSlice::Appointments)
        }

        RealtimeEvent::ReminderUpdated(payload) => {
            let appointment_id = payload.refs.appointment_id.as_deref()?;
            let existing = state.appointments_by_id.get_mut(appointment_id)?;
            let outcome =
                map_reminder_update(payload, existing.last_reminder_outcome.as_ref(), now);
            existing.last_reminder_outcome = Some(outcome);
            Some(StoreSlice::Appointments)
        }

        RealtimeEvent::ListingUpdated(refs) | RealtimeEvent::ListingPerformanceUpdated(refs) => {
            let listing_id = refs.listing_id.as_deref()?;
            state
                .listing_signals_by_id
                .insert(listing_id.to_string(), envelope.ts.clone());
            Some(StoreSlice::ListingSignals)
        }

        RealtimeEvent::SystemReady(_) => None,
    }
}

struct StoreInner {
    state: RwLock<DashboardState>,
    changes: broadcast::Sender<StoreChange>,
}

/// Shared handle to the dashboard store. Cloning is cheap.
#[derive(Clone)]
pub struct RealtimeStore {
    inner: Arc<StoreInner>,
}

impl Default for RealtimeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RealtimeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeStore")
            .field("subscribers", &self.inner.changes.receiver_count())
            .finish()
    }
}

impl RealtimeStore {
    pub fn new() -> Self {
        Self::with_capacity(STORE_CHANNEL_CAPACITY)
    }

    /// Create a store whose change channel buffers `capacity` notifications
    /// per subscriber.
    pub fn with_capacity(capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(DashboardState::default()),
                changes,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, DashboardState> {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, DashboardState> {
        self.inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, change: StoreChange) {
        // No subscribers is fine.
        let _ = self.inner.changes.send(change);
    }

    /// Replace all leads with a fresh snapshot.
    pub fn set_initial_leads(&self, leads: impl IntoIterator<Item = NormalizedLead>) {
        let leads_by_id = leads
            .into_iter()
            .map(|lead| (lead.id.clone(), lead))
            .collect::<HashMap<_, _>>();
        let count = leads_by_id.len();
        self.write().leads_by_id = leads_by_id;
        debug!(subsystem = "store", count, "Seeded leads");
        self.publish(StoreChange::Slice(StoreSlice::Leads));
    }

    /// Replace all appointments with a fresh snapshot.
    pub fn set_initial_appointments(
        &self,
        appointments: impl IntoIterator<Item = NormalizedAppointment>,
    ) {
        let appointments_by_id = appointments
            .into_iter()
            .map(|appointment| (appointment.id.clone(), appointment))
            .collect::<HashMap<_, _>>();
        let count = appointments_by_id.len();
        self.write().appointments_by_id = appointments_by_id;
        debug!(subsystem = "store", count, "Seeded appointments");
        self.publish(StoreChange::Slice(StoreSlice::Appointments));
    }

    /// Atomically replace the command-center snapshot.
    pub fn set_command_center(&self, snapshot: Option<CommandCenterSnapshot>) {
        self.write().command_center = snapshot;
        self.publish(StoreChange::Slice(StoreSlice::CommandCenter));
    }

    /// Record a local agent action on a known lead. Returns `false` (and does
    /// nothing) when the lead is unknown.
    pub fn patch_lead_action(&self, lead_id: &str, action_iso: &str) -> bool {
        {
            let mut state = self.write();
            let Some(lead) = state.leads_by_id.get_mut(lead_id) else {
                return false;
            };
            lead.last_agent_action_at = Some(action_iso.to_string());
        }
        self.publish(StoreChange::Slice(StoreSlice::Leads));
        true
    }

    /// Apply a realtime event at the current time.
    pub fn apply_realtime_event(&self, envelope: RealtimeEventEnvelope) -> Option<StoreSlice> {
        self.apply_realtime_event_at(envelope, Utc::now())
    }

    /// Apply a realtime event with an explicit `now` for timestamp defaults.
    pub fn apply_realtime_event_at(
        &self,
        envelope: RealtimeEventEnvelope,
        now: DateTime<Utc>,
    ) -> Option<StoreSlice> {
        let envelope = Arc::new(envelope);
        let changed = {
            let mut state = self.write();
            let changed = reduce(&mut state, &envelope, now);
            state.last_event = Some(Arc::clone(&envelope));
            changed
        };

        trace!(
            subsystem = "store",
            event_type = %envelope.event_type(),
            entity_id = envelope.refs().primary_id().unwrap_or_default(),
            changed = ?changed,
            "Applied realtime event"
        );

        if let Some(slice) = changed {
            self.publish(StoreChange::Slice(slice));
        }
        self.publish(StoreChange::Event(envelope));
        changed
    }

    /// Tear down all state (the owning view went away).
    pub fn clear(&self) {
        *self.write() = DashboardState::default();
        for slice in StoreSlice::ALL {
            self.publish(StoreChange::Slice(slice));
        }
    }

    pub fn lead(&self, lead_id: &str) -> Option<NormalizedLead> {
        self.read().leads_by_id.get(lead_id).cloned()
    }

    pub fn appointment(&self, appointment_id: &str) -> Option<NormalizedAppointment> {
        self.read().appointments_by_id.get(appointment_id).cloned()
    }

    pub fn listing_signal(&self, listing_id: &str) -> Option<String> {
        self.read().listing_signals_by_id.get(listing_id).cloned()
    }

    pub fn command_center(&self) -> Option<CommandCenterSnapshot> {
        self.read().command_center.clone()
    }

    pub fn last_event(&self) -> Option<Arc<RealtimeEventEnvelope>> {
        self.read().last_event.clone()
    }

    /// Copy of the full state.
    pub fn snapshot(&self) -> DashboardState {
        self.read().clone()
    }

    /// Subscribe to every change notification.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.inner.changes.subscribe()
    }

    /// Subscribe to changes of one slice only.
    pub fn subscribe_slice(&self, slice: StoreSlice) -> SliceSubscription {
        SliceSubscription {
            slice,
            receiver: self.subscribe(),
        }
    }
}

/// Receiver filtered to a single [`StoreSlice`].
pub struct SliceSubscription {
    slice: StoreSlice,
    receiver: broadcast::Receiver<StoreChange>,
}

impl SliceSubscription {
    pub fn slice(&self) -> StoreSlice {
        self.slice
    }

    /// Wait until the selected slice changes. Returns `None` once every store
    /// handle is gone.
    ///
    /// A lagged receiver reports a change, since the missed notifications may
    /// have included one for this slice.
    pub async fn changed(&mut self) -> Option<()> {
        loop {
            match self.receiver.recv().await {
                Ok(StoreChange::Slice(slice)) if slice == self.slice => return Some(()),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => return Some(()),
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
