//! Reloadable metric views (ROI, listing performance, billing value proof).
//!
//! A [`MetricsHandle`] publishes `{data, loading, error}` over a `watch`
//! channel. Reload failures set `error` but keep the last good `data`, and a
//! response from a reload that has since been superseded is discarded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::debug;

use hlai_client::DashboardClient;
use hlai_core::{
    BillingValueProof, ListingPerformanceReport, MetricsRange, RealtimeStore, Result, RoiMetrics,
};

use crate::updates::{RealtimeUpdateOptions, RealtimeUpdateWatcher, WatcherHandle};

const FALLBACK_ERROR: &str = "Failed to load metrics";

/// Fetches one kind of metrics for a range.
#[async_trait]
pub trait MetricsSource: Send + Sync + 'static {
    type Output: Clone + Send + Sync + 'static;

    async fn fetch(&self, range: MetricsRange) -> Result<Self::Output>;
}

/// Published state of a [`MetricsHandle`].
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsState<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> Default for MetricsState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
        }
    }
}

struct MetricsInner<S: MetricsSource> {
    source: S,
    range: Mutex<MetricsRange>,
    /// Id of the latest reload; older responses are dropped.
    latest: AtomicU64,
    state: watch::Sender<MetricsState<S::Output>>,
}

/// Reloadable metrics bound to a source and a range.
pub struct MetricsHandle<S: MetricsSource> {
    inner: Arc<MetricsInner<S>>,
}

impl<S: MetricsSource> Clone for MetricsHandle<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: MetricsSource> MetricsHandle<S> {
    pub fn new(source: S, range: MetricsRange) -> Self {
        let (state, _) = watch::channel(MetricsState::default());
        Self {
            inner: Arc::new(MetricsInner {
                source,
                range: Mutex::new(range),
                latest: AtomicU64::new(0),
                state,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<MetricsState<S::Output>> {
        self.inner.state.subscribe()
    }

    /// Current state.
    pub fn state(&self) -> MetricsState<S::Output> {
        self.inner.state.borrow().clone()
    }

    pub fn range(&self) -> MetricsRange {
        *self.inner.range.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Initial load.
    pub async fn mount(&self) {
        self.reload().await;
    }

    /// Change the range, reloading if it differs.
    pub async fn set_range(&self, range: MetricsRange) {
        let changed = {
            let mut current = self.inner.range.lock().unwrap_or_else(PoisonError::into_inner);
            let changed = *current != range;
            *current = range;
            changed
        };
        if changed {
            self.reload().await;
        }
    }

    /// Fetch with the current range.
    pub async fn reload(&self) {
        let id = self.inner.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let range = self.range();
        self.inner.state.send_modify(|state| {
            state.loading = true;
            state.error = None;
        });

        let result = self.inner.source.fetch(range).await;

        self.inner.state.send_if_modified(|state| {
            if self.inner.latest.load(Ordering::SeqCst) != id {
                debug!(subsystem = "realtime", range = range.as_str(), "Discarding superseded metrics response");
                return false;
            }
            state.loading = false;
            match result {
                Ok(data) => state.data = Some(data),
                Err(err) => {
                    debug!(subsystem = "realtime", error = %err, "Metrics reload failed");
                    let message = err.to_string();
                    state.error = Some(if message.is_empty() {
                        FALLBACK_ERROR.to_string()
                    } else {
                        message
                    });
                }
            }
            true
        });
    }

    /// Reload whenever a matching realtime event reaches `store`.
    pub fn follow_realtime(&self, store: &RealtimeStore, options: RealtimeUpdateOptions) -> WatcherHandle {
        let handle = self.clone();
        RealtimeUpdateWatcher::spawn(store, options, move || {
            let handle = handle.clone();
            async move { handle.reload().await }
        })
    }
}

/// `GET /api/dashboard/roi-metrics`
pub struct RoiMetricsSource {
    client: Arc<DashboardClient>,
}

impl RoiMetricsSource {
    pub fn new(client: Arc<DashboardClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MetricsSource for RoiMetricsSource {
    type Output = RoiMetrics;

    async fn fetch(&self, range: MetricsRange) -> Result<RoiMetrics> {
        self.client.fetch_roi_metrics(range).await
    }
}

/// `GET /api/dashboard/listings/{id}/performance`
pub struct ListingPerformanceSource {
    client: Arc<DashboardClient>,
    listing_id: String,
}

impl ListingPerformanceSource {
    pub fn new(client: Arc<DashboardClient>, listing_id: impl Into<String>) -> Self {
        Self {
            client,
            listing_id: listing_id.into(),
        }
    }

    pub fn listing_id(&self) -> &str {
        &self.listing_id
    }
}

#[async_trait]
impl MetricsSource for ListingPerformanceSource {
    type Output = ListingPerformanceReport;

    async fn fetch(&self, range: MetricsRange) -> Result<ListingPerformanceReport> {
        self.client
            .fetch_listing_performance(&self.listing_id, range)
            .await
    }
}

/// `GET /api/dashboard/billing/value-proof`
pub struct BillingValueProofSource {
    client: Arc<DashboardClient>,
}

impl BillingValueProofSource {
    pub fn new(client: Arc<DashboardClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MetricsSource for BillingValueProofSource {
    type Output = BillingValueProof;

    async fn fetch(&self, range: MetricsRange) -> Result<BillingValueProof> {
        self.client.fetch_billing_value_proof(range).await
    }
}

pub type RoiMetricsHandle = MetricsHandle<RoiMetricsSource>;
pub type ListingPerformanceHandle = MetricsHandle<ListingPerformanceSource>;
pub type BillingValueProofHandle = MetricsHandle<BillingValueProofSource>;
