//! Realtime connection manager.
//!
//! One manager owns one transport. It connects with the session's access
//! token, drops duplicate frames, folds events into the [`RealtimeStore`],
//! raises toasts, schedules a coalesced command-center refetch after every
//! event, and reconnects on close with a linear capped backoff until
//! [`RealtimeManager::stop`] is called.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use hlai_core::{
    CommandCenterSource, RealtimeEventEnvelope, RealtimeEventType, RealtimeStore,
    SessionProvider, ToastNotice, ToastSink,
};

use crate::backoff::ReconnectBackoff;
use crate::config::RealtimeConfig;
use crate::dedup::DedupCache;
use crate::refresh::{CoalescingRefresh, RefreshAction, RefreshPhase};
use crate::transport::{Connector, FrameStream};

/// Transport lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// Not connected and no connection attempt running.
    Idle,
    /// Fetching the token or opening the transport.
    Connecting,
    Open,
    /// The transport closed or failed; a reconnect may be scheduled.
    Closed,
}

struct ConnectionState {
    phase: ConnectionPhase,
    /// Bumped by `stop()`. Work started under an older epoch is discarded.
    epoch: u64,
    backoff: ReconnectBackoff,
    dedup: DedupCache,
    reconnect_timer: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
}

struct ManagerInner {
    config: RealtimeConfig,
    session: Arc<dyn SessionProvider>,
    connector: Arc<dyn Connector>,
    store: RealtimeStore,
    toasts: Arc<dyn ToastSink>,
    refresh: CoalescingRefresh,
    stopped: Arc<AtomicBool>,
    state: Mutex<ConnectionState>,
}

impl ManagerInner {
    fn state(&self) -> MutexGuard<'_, ConnectionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Parse, dedupe and apply one inbound frame.
    fn handle_frame(&self, text: &str, epoch: u64) {
        let envelope = match RealtimeEventEnvelope::parse(text) {
            Ok(envelope) => envelope,
            Err(err) => {
                debug!(subsystem = "realtime", error = %err, "Dropping realtime frame");
                trace!(subsystem = "realtime", frame = text, "Dropped frame body");
                return;
            }
        };

        let key = envelope.identity_key();
        {
            let mut state = self.state();
            if state.epoch != epoch {
                return;
            }
            if !state.dedup.observe(&key, Instant::now()) {
                debug!(subsystem = "realtime", event_key = %key, "Duplicate realtime event dropped");
                return;
            }
        }

        let event_type = envelope.event_type();
        let toast = ToastNotice::for_event(&envelope);
        let changed = self.store.apply_realtime_event(envelope);
        trace!(
            subsystem = "realtime",
            event_type = %event_type,
            event_key = %key,
            slice = ?changed,
            "Realtime event applied"
        );

        if let Some(toast) = toast {
            self.toasts.show(toast);
        }
        if event_type != RealtimeEventType::SystemReady {
            self.refresh.schedule();
        }
    }

    /// Transport ended (close, error, or failed connect).
    fn on_closed(inner: &Arc<Self>, epoch: u64) {
        let mut state = inner.state();
        if state.epoch != epoch {
            return;
        }
        state.reader = None;
        state.phase = ConnectionPhase::Closed;
        Self::schedule_reconnect(inner, &mut state);
    }

    fn schedule_reconnect(inner: &Arc<Self>, state: &mut ConnectionState) {
        if inner.is_stopped() || state.reconnect_timer.is_some() {
            return;
        }

        let delay = state.backoff.next_delay();
        let epoch = state.epoch;
        info!(
            subsystem = "realtime",
            attempt = state.backoff.attempt(),
            delay_ms = delay.as_millis() as u64,
            "Realtime reconnect scheduled"
        );

        let task_inner = Arc::clone(inner);
        state.reconnect_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut state = task_inner.state();
                if state.epoch != epoch {
                    return;
                }
                state.reconnect_timer = None;
            }
            RealtimeManager { inner: task_inner }.start().await;
        }));
    }

    fn spawn_reader(inner: &Arc<Self>, mut frames: FrameStream, epoch: u64) -> JoinHandle<()> {
        let inner = Arc::clone(inner);
        tokio::spawn(async move {
            while let Some(frame) = frames.next().await {
                match frame {
                    Ok(text) => inner.handle_frame(&text, epoch),
                    Err(err) => {
                        warn!(subsystem = "realtime", error = %err, "Realtime transport error");
                        break;
                    }
                }
            }
            if !inner.is_stopped() {
                warn!(subsystem = "realtime", "Realtime transport closed");
            }
            Self::on_closed(&inner, epoch);
        })
    }
}

/// Handle to the realtime connection. Clones share one connection.
#[derive(Clone)]
pub struct RealtimeManager {
    inner: Arc<ManagerInner>,
}

impl std::fmt::Debug for RealtimeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeManager")
            .field("phase", &self.phase())
            .field("stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}

impl RealtimeManager {
    /// Create a manager. Nothing connects until [`start`](Self::start) or
    /// [`resume`](Self::resume) is called.
    pub fn new(
        config: RealtimeConfig,
        session: Arc<dyn SessionProvider>,
        connector: Arc<dyn Connector>,
        store: RealtimeStore,
        snapshots: Arc<dyn CommandCenterSource>,
        toasts: Arc<dyn ToastSink>,
    ) -> Self {
        let stopped = Arc::new(AtomicBool::new(false));
        let refresh = CoalescingRefresh::new(
            config.command_center_debounce,
            command_center_refresh(snapshots, store.clone(), Arc::clone(&stopped)),
        );
        let state = ConnectionState {
            phase: ConnectionPhase::Idle,
            epoch: 0,
            backoff: ReconnectBackoff::new(config.reconnect_step, config.reconnect_max),
            dedup: DedupCache::new(config.dedup_ttl),
            reconnect_timer: None,
            reader: None,
        };

        Self {
            inner: Arc::new(ManagerInner {
                config,
                session,
                connector,
                store,
                toasts,
                refresh,
                stopped,
                state: Mutex::new(state),
            }),
        }
    }

    /// Connect unless already connecting, open, or stopped.
    ///
    /// A missing access token defers the connection silently; it is retried
    /// on the next explicit `start()`/`resume()`, not on a timer. Transport
    /// failures never surface here: they move the manager to
    /// [`ConnectionPhase::Closed`] and schedule a reconnect.
    pub async fn start(&self) {
        let epoch = {
            let mut state = self.inner.state();
            if self.inner.is_stopped() {
                debug!(subsystem = "realtime", "Start ignored, manager stopped");
                return;
            }
            if matches!(state.phase, ConnectionPhase::Connecting | ConnectionPhase::Open) {
                return;
            }
            state.phase = ConnectionPhase::Connecting;
            state.epoch
        };

        let token = self
            .inner
            .session
            .access_token()
            .await
            .filter(|t| !t.is_empty());
        let Some(token) = token else {
            debug!(subsystem = "realtime", "No access token, realtime start deferred");
            let mut state = self.inner.state();
            if state.epoch == epoch && state.phase == ConnectionPhase::Connecting {
                state.phase = ConnectionPhase::Idle;
            }
            return;
        };

        let url = self.inner.config.socket_url(&token);
        let frames = self.inner.connector.connect(&url).await;

        match frames {
            Ok(frames) => {
                {
                    let mut state = self.inner.state();
                    if state.epoch != epoch || self.inner.is_stopped() {
                        debug!(subsystem = "realtime", "Discarding connection opened before stop");
                        return;
                    }
                    state.phase = ConnectionPhase::Open;
                    state.backoff.reset();
                    state.reader = Some(ManagerInner::spawn_reader(&self.inner, frames, epoch));
                }
                info!(subsystem = "realtime", "Realtime connected");
                self.inner.refresh.schedule();
            }
            Err(err) => {
                warn!(subsystem = "realtime", error = %err, "Realtime connect failed");
                ManagerInner::on_closed(&self.inner, epoch);
            }
        }
    }

    /// Stop and suppress all reconnects until [`resume`](Self::resume).
    ///
    /// Cancels the reconnect timer and the pending command-center refresh,
    /// and closes the transport.
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        {
            let mut state = self.inner.state();
            state.epoch = state.epoch.wrapping_add(1);
            if let Some(timer) = state.reconnect_timer.take() {
                timer.abort();
            }
            if let Some(reader) = state.reader.take() {
                reader.abort();
            }
            state.phase = ConnectionPhase::Idle;
        }
        self.inner.refresh.cancel();
        info!(subsystem = "realtime", "Realtime stopped");
    }

    /// Clear the stopped flag and start.
    pub async fn resume(&self) {
        self.inner.stopped.store(false, Ordering::SeqCst);
        info!(subsystem = "realtime", "Realtime resumed");
        self.start().await;
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.inner.state().phase
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.is_stopped()
    }

    /// Reconnect attempts since the last successful open.
    pub fn reconnect_attempt(&self) -> u32 {
        self.inner.state().backoff.attempt()
    }

    pub fn reconnect_pending(&self) -> bool {
        self.inner.state().reconnect_timer.is_some()
    }

    pub fn refresh_phase(&self) -> RefreshPhase {
        self.inner.refresh.phase()
    }

    pub fn store(&self) -> &RealtimeStore {
        &self.inner.store
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.inner.config
    }
}

/// Refetch the snapshot into the store unless the manager is stopped.
/// Failures keep the current snapshot.
fn command_center_refresh(
    snapshots: Arc<dyn CommandCenterSource>,
    store: RealtimeStore,
    stopped: Arc<AtomicBool>,
) -> RefreshAction {
    Arc::new(move || {
        let snapshots = Arc::clone(&snapshots);
        let store = store.clone();
        let stopped = Arc::clone(&stopped);
        Box::pin(async move {
            if stopped.load(Ordering::SeqCst) {
                return;
            }
            match snapshots.fetch_command_center().await {
                Ok(snapshot) => {
                    debug!(subsystem = "realtime", "Command center refreshed");
                    store.set_command_center(Some(snapshot));
                }
                Err(err) => {
                    debug!(subsystem = "realtime", error = %err, "Command center refresh failed");
                }
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hlai_core::{CommandCenterSnapshot, Error, Result, TracingToastSink};

    struct Session(Option<String>);

    #[async_trait]
    impl SessionProvider for Session {
        async fn access_token(&self) -> Option<String> {
            self.0.clone()
        }
        async fn agent_id(&self) -> Option<String> {
            None
        }
    }

    struct Refusing(Mutex<Vec<String>>);

    #[async_trait]
    impl Connector for Refusing {
        async fn connect(&self, url: &str) -> Result<FrameStream> {
            self.0.lock().unwrap().push(url.to_string());
            Err(Error::Transport("connection refused".to_string()))
        }
    }

    struct Snapshots;

    #[async_trait]
    impl CommandCenterSource for Snapshots {
        async fn fetch_command_center(&self) -> Result<CommandCenterSnapshot> {
            Ok(CommandCenterSnapshot::default())
        }
    }

    fn manager(token: Option<&str>, connector: Arc<Refusing>) -> RealtimeManager {
        RealtimeManager::new(
            RealtimeConfig::default().with_ws_base_url("wss://rt.example.com"),
            Arc::new(Session(token.map(str::to_string))),
            connector,
            RealtimeStore::new(),
            Arc::new(Snapshots),
            Arc::new(TracingToastSink),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_token_defers_start() {
        let connector = Arc::new(Refusing(Mutex::new(Vec::new())));
        let manager = manager(None, Arc::clone(&connector));

        manager.start().await;
        assert_eq!(manager.phase(), ConnectionPhase::Idle);
        assert!(!manager.reconnect_pending());

        tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        assert!(connector.0.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_connect_schedules_reconnect() {
        let connector = Arc::new(Refusing(Mutex::new(Vec::new())));
        let manager = manager(Some("tok en"), Arc::clone(&connector));

        manager.start().await;
        assert_eq!(manager.phase(), ConnectionPhase::Closed);
        assert_eq!(manager.reconnect_attempt(), 1);
        assert!(manager.reconnect_pending());
        assert_eq!(
            *connector.0.lock().unwrap(),
            vec!["wss://rt.example.com/ws?token=tok%20en".to_string()]
        );

        manager.stop();
        assert!(!manager.reconnect_pending());
        assert_eq!(manager.phase(), ConnectionPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_ignored_while_stopped() {
        let connector = Arc::new(Refusing(Mutex::new(Vec::new())));
        let manager = manager(Some("tok"), Arc::clone(&connector));

        manager.stop();
        manager.start().await;
        assert!(connector.0.lock().unwrap().is_empty());

        manager.resume().await;
        assert!(!manager.is_stopped());
        assert_eq!(connector.0.lock().unwrap().len(), 1);
        manager.stop();
    }
}
