//! Metric views and the realtime update watcher.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use hlai_client::{ClientConfig, DashboardClient, StaticSession};
use hlai_core::{MetricsRange, RealtimeEventEnvelope, RealtimeStore, Result};
use hlai_realtime::{
    ListingPerformanceSource, MetricsHandle, MetricsSource, RealtimeUpdateOptions,
    RealtimeUpdateWatcher, RoiMetricsSource,
};

fn event(event_type: &str, ts: &str, payload: serde_json::Value) -> RealtimeEventEnvelope {
    RealtimeEventEnvelope::parse(
        &json!({"type": event_type, "v": 1, "ts": ts, "payload": payload}).to_string(),
    )
    .unwrap()
}

fn counter() -> (Arc<AtomicUsize>, impl FnMut() -> std::future::Ready<()> + Send + 'static) {
    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    (calls, move || {
        c.fetch_add(1, Ordering::SeqCst);
        std::future::ready(())
    })
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_events_triggers_one_update() {
    let store = RealtimeStore::new();
    let (calls, on_update) = counter();
    let _watcher = RealtimeUpdateWatcher::spawn(&store, RealtimeUpdateOptions::default(), on_update);

    for n in 0..5 {
        store.apply_realtime_event(event(
            "lead.updated",
            &format!("2024-01-01T00:00:0{}Z", n),
            json!({"lead_id": format!("L{}", n)}),
        ));
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_listing_scope_filters_other_listings() {
    let store = RealtimeStore::new();
    let (calls, on_update) = counter();
    let _watcher = RealtimeUpdateWatcher::spawn(
        &store,
        RealtimeUpdateOptions::default().with_listing_id("L1"),
        on_update,
    );

    store.apply_realtime_event(event(
        "listing.performance.updated",
        "2024-01-01T00:00:00Z",
        json!({"listing_id": "L2"}),
    ));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    store.apply_realtime_event(event(
        "appointment.created",
        "2024-01-01T00:00:01Z",
        json!({"appointment_id": "A1"}),
    ));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_events_outside_allow_list_ignored() {
    let store = RealtimeStore::new();
    let (calls, on_update) = counter();
    let _watcher = RealtimeUpdateWatcher::spawn(&store, RealtimeUpdateOptions::default(), on_update);

    store.apply_realtime_event(event("system.ready", "2024-01-01T00:00:00Z", json!({})));
    store.apply_realtime_event(event(
        "reminder.updated",
        "2024-01-01T00:00:00Z",
        json!({"appointment_id": "A1"}),
    ));
    store.set_command_center(None);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_handle_stops_watcher() {
    let store = RealtimeStore::new();
    let (calls, on_update) = counter();
    let watcher = RealtimeUpdateWatcher::spawn(
        &store,
        RealtimeUpdateOptions::default().with_debounce(Duration::from_millis(100)),
        on_update,
    );
    drop(watcher);

    store.apply_realtime_event(event(
        "lead.created",
        "2024-01-01T00:00:00Z",
        json!({"lead_id": "L1"}),
    ));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

/// First call is slow, later calls are fast.
#[derive(Default)]
struct SlowThenFast {
    calls: AtomicUsize,
}

#[async_trait]
impl MetricsSource for SlowThenFast {
    type Output = usize;

    async fn fetch(&self, _range: MetricsRange) -> Result<usize> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = if call == 1 { 2000 } else { 100 };
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok(call)
    }
}

#[tokio::test(start_paused = true)]
async fn test_superseded_response_is_discarded() {
    let handle = MetricsHandle::new(SlowThenFast::default(), MetricsRange::SevenDays);

    let slow = {
        let handle = handle.clone();
        tokio::spawn(async move { handle.reload().await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(handle.state().loading);

    handle.reload().await;
    assert_eq!(handle.state().data, Some(2));

    slow.await.unwrap();
    let state = handle.state();
    assert_eq!(state.data, Some(2));
    assert!(!state.loading);
}

fn client_for(server: &MockServer) -> Arc<DashboardClient> {
    Arc::new(
        DashboardClient::new(
            ClientConfig::default().with_base_url(server.uri()),
            Arc::new(StaticSession::new(Some("tok".to_string()), Some("agent-1".to_string()))),
        )
        .unwrap(),
    )
}

#[tokio::test]
async fn test_listing_performance_error_keeps_data() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/dashboard/listings/X1/performance"))
        .and(query_param("range", "7d"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "listing_id": "X1",
            "metrics": {"leads_count": 4}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/dashboard/listings/X1/performance"))
        .and(query_param("range", "30d"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "server_error"})))
        .mount(&server)
        .await;

    let handle = MetricsHandle::new(
        ListingPerformanceSource::new(client_for(&server), "X1"),
        MetricsRange::SevenDays,
    );
    handle.mount().await;
    assert_eq!(handle.state().data.unwrap().metrics.leads_count, 4);

    handle.set_range(MetricsRange::ThirtyDays).await;
    let state = handle.state();
    assert_eq!(state.error.as_deref(), Some("server_error"));
    assert_eq!(state.data.unwrap().metrics.leads_count, 4);
    assert!(!state.loading);
}

#[tokio::test]
async fn test_roi_metrics_follow_realtime_events() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/dashboard/roi-metrics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "metrics": {"leads_captured": 12}
        })))
        .mount(&server)
        .await;

    let store = RealtimeStore::new();
    let handle = MetricsHandle::new(RoiMetricsSource::new(client_for(&server)), MetricsRange::SevenDays);
    handle.mount().await;
    assert_eq!(handle.state().data.unwrap().leads_captured, 12);

    let _watcher = handle.follow_realtime(
        &store,
        RealtimeUpdateOptions::default().with_debounce(Duration::from_millis(50)),
    );
    store.apply_realtime_event(event(
        "reminder.outcome",
        "2024-01-01T00:00:00Z",
        json!({"appointment_id": "A1", "outcome": "confirmed"}),
    ));

    let mut reloads = 0;
    for _ in 0..50 {
        reloads = server.received_requests().await.unwrap().len();
        if reloads >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(reloads, 2);
}
