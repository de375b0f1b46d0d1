//! Coalescing debounce for the command-center snapshot refetch.
//!
//! Requests arriving while a timer is pending restart the timer (trailing
//! debounce). Requests whose timer fires while a refresh is running mark it
//! pending; the running refresh reschedules once when it completes. Refreshes
//! therefore never overlap and a request is never dropped, without queueing
//! more than one follow-up.
//!
//! ```text
//! Idle --fire--> InFlight --fire--> InFlightPending
//!  ^                |                      |
//!  +----done--------+       done: schedule +--> Idle
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Async action run by a [`CoalescingRefresh`].
pub type RefreshAction = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPhase {
    Idle,
    InFlight,
    /// In flight, with one more run requested.
    InFlightPending,
}

struct RefreshState {
    phase: RefreshPhase,
    /// Bumped on every schedule and cancel; a timer whose generation no
    /// longer matches does nothing.
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

struct RefreshInner {
    delay: Duration,
    action: RefreshAction,
    state: Mutex<RefreshState>,
}

impl RefreshInner {
    fn state(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Trailing debounce that never runs its action concurrently.
#[derive(Clone)]
pub struct CoalescingRefresh {
    inner: Arc<RefreshInner>,
}

impl std::fmt::Debug for CoalescingRefresh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoalescingRefresh")
            .field("delay", &self.inner.delay)
            .field("phase", &self.phase())
            .finish()
    }
}

impl CoalescingRefresh {
    pub fn new(delay: Duration, action: RefreshAction) -> Self {
        Self {
            inner: Arc::new(RefreshInner {
                delay,
                action,
                state: Mutex::new(RefreshState {
                    phase: RefreshPhase::Idle,
                    generation: 0,
                    timer: None,
                }),
            }),
        }
    }

    /// Request a run after the debounce delay, replacing any pending timer.
    pub fn schedule(&self) {
        Self::schedule_inner(&self.inner);
    }

    /// Cancel the pending timer and any pending follow-up run. A run already
    /// in flight completes but does not reschedule.
    pub fn cancel(&self) {
        let mut state = self.inner.state();
        state.generation = state.generation.wrapping_add(1);
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        if state.phase == RefreshPhase::InFlightPending {
            state.phase = RefreshPhase::InFlight;
        }
    }

    pub fn phase(&self) -> RefreshPhase {
        self.inner.state().phase
    }

    /// Whether a debounce timer is waiting to fire.
    pub fn is_scheduled(&self) -> bool {
        self.inner.state().timer.is_some()
    }

    fn schedule_inner(inner: &Arc<RefreshInner>) {
        let mut state = inner.state();
        state.generation = state.generation.wrapping_add(1);
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }

        let generation = state.generation;
        let task_inner = Arc::clone(inner);
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(task_inner.delay).await;
            Self::fire(task_inner, generation).await;
        }));
        trace!(subsystem = "realtime", generation, "Refresh scheduled");
    }

    async fn fire(inner: Arc<RefreshInner>, generation: u64) {
        {
            let mut state = inner.state();
            if state.generation != generation {
                return;
            }
            // Detach our own handle so a later cancel cannot abort the run.
            state.timer = None;
            match state.phase {
                RefreshPhase::Idle => state.phase = RefreshPhase::InFlight,
                RefreshPhase::InFlight | RefreshPhase::InFlightPending => {
                    state.phase = RefreshPhase::InFlightPending;
                    debug!(subsystem = "realtime", "Refresh in flight, coalescing");
                    return;
                }
            }
        }

        (inner.action)().await;

        let rerun = {
            let mut state = inner.state();
            let rerun = state.phase == RefreshPhase::InFlightPending;
            state.phase = RefreshPhase::Idle;
            rerun
        };
        if rerun {
            Self::schedule_inner(&inner);
        }
    }
}
