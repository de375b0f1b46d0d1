//! # hlai-realtime
//!
//! Keeps a [`hlai_core::RealtimeStore`] in sync with the dashboard's realtime
//! socket.
//!
//! - [`RealtimeManager`]: connection lifecycle, dedup, reconnect backoff and
//!   the coalesced command-center refetch
//! - [`MetricsHandle`]: reloadable metric views with stale-on-error state
//! - [`RealtimeUpdateWatcher`]: debounced callbacks on matching events

pub mod backoff;
pub mod config;
pub mod dedup;
pub mod manager;
pub mod metrics;
pub mod refresh;
pub mod transport;
pub mod updates;

pub use backoff::ReconnectBackoff;
pub use config::{ConfigError, RealtimeConfig};
pub use dedup::DedupCache;
pub use manager::{ConnectionPhase, RealtimeManager};
pub use metrics::{
    BillingValueProofHandle, BillingValueProofSource, ListingPerformanceHandle,
    ListingPerformanceSource, MetricsHandle, MetricsSource, MetricsState, RoiMetricsHandle,
    RoiMetricsSource,
};
pub use refresh::{CoalescingRefresh, RefreshAction, RefreshPhase};
pub use transport::{Connector, FrameStream, WebSocketConnector};
pub use updates::{RealtimeUpdateOptions, RealtimeUpdateWatcher, WatcherHandle};
