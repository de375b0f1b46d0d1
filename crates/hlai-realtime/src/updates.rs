//! Debounced notifications for realtime events that affect metric widgets.

use std::future::Future;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

use hlai_core::defaults::METRICS_UPDATE_DEBOUNCE_MS;
use hlai_core::{RealtimeEventEnvelope, RealtimeEventType, RealtimeStore, StoreChange};

/// Which events should trigger an update, and how long to debounce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeUpdateOptions {
    pub event_types: Vec<RealtimeEventType>,
    /// Only react to events for this listing. Events without a listing id
    /// still pass.
    pub listing_id: Option<String>,
    pub debounce: Duration,
}

impl Default for RealtimeUpdateOptions {
    fn default() -> Self {
        Self {
            event_types: vec![
                RealtimeEventType::LeadCreated,
                RealtimeEventType::LeadUpdated,
                RealtimeEventType::LeadStatusChanged,
                RealtimeEventType::AppointmentCreated,
                RealtimeEventType::AppointmentUpdated,
                RealtimeEventType::ReminderOutcome,
                RealtimeEventType::ListingPerformanceUpdated,
            ],
            listing_id: None,
            debounce: Duration::from_millis(METRICS_UPDATE_DEBOUNCE_MS),
        }
    }
}

impl RealtimeUpdateOptions {
    pub fn with_event_types(mut self, event_types: impl IntoIterator<Item = RealtimeEventType>) -> Self {
        self.event_types = event_types.into_iter().collect();
        self
    }

    pub fn with_listing_id(mut self, listing_id: impl Into<String>) -> Self {
        self.listing_id = Some(listing_id.into());
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Whether `envelope` should trigger an update.
    ///
    /// With a listing scope set, only a present, non-empty, different
    /// `listing_id` filters the event out.
    pub fn matches(&self, envelope: &RealtimeEventEnvelope) -> bool {
        if !self.event_types.contains(&envelope.event_type()) {
            return false;
        }
        let wanted = self.listing_id.as_deref().filter(|id| !id.is_empty());
        let carried = envelope.listing_id().filter(|id| !id.is_empty());
        match (wanted, carried) {
            (Some(wanted), Some(carried)) => wanted == carried,
            _ => true,
        }
    }
}

/// Stops the watcher when dropped.
#[derive(Debug)]
pub struct WatcherHandle {
    task: JoinHandle<()>,
}

impl WatcherHandle {
    pub fn stop(self) {}

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Calls back, debounced, whenever a matching realtime event reaches the
/// store.
pub struct RealtimeUpdateWatcher;

impl RealtimeUpdateWatcher {
    /// Spawn a watcher on `store`. `on_update` runs once per quiet period of
    /// `options.debounce` after the last matching event.
    pub fn spawn<F, Fut>(
        store: &RealtimeStore,
        options: RealtimeUpdateOptions,
        mut on_update: F,
    ) -> WatcherHandle
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut changes = store.subscribe();
        let task = tokio::spawn(async move {
            let mut deadline: Option<Instant> = None;
            loop {
                let change = match deadline {
                    Some(at) => {
                        tokio::select! {
                            change = changes.recv() => change,
                            _ = sleep_until(at) => {
                                deadline = None;
                                on_update().await;
                                continue;
                            }
                        }
                    }
                    None => changes.recv().await,
                };

                match change {
                    Ok(StoreChange::Event(envelope)) => {
                        if options.matches(&envelope) {
                            deadline = Some(Instant::now() + options.debounce);
                        }
                    }
                    Ok(StoreChange::Slice(_)) => {}
                    Err(RecvError::Lagged(missed)) => {
                        debug!(subsystem = "realtime", missed, "Update watcher lagged");
                        deadline = Some(Instant::now() + options.debounce);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        WatcherHandle { task }
    }
}
