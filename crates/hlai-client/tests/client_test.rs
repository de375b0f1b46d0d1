//! Integration tests for the dashboard REST client against a mock server.

use std::sync::Arc;

use hlai_client::{
    AgentAction, AppointmentsView, ClientConfig, DashboardClient, DashboardSession, LeadsFilter,
    StaticSession,
};
use hlai_core::{ApiErrorNotifier, CommandCenterSource, Error, MetricsRange, RealtimeStore};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, session: StaticSession) -> DashboardClient {
    DashboardClient::new(
        ClientConfig::default().with_base_url(server.uri()),
        Arc::new(session),
    )
    .expect("Failed to create client")
}

fn signed_in() -> StaticSession {
    StaticSession::new(Some("tok-123".to_string()), Some("agent-1".to_string()))
}

#[tokio::test]
async fn test_identity_headers_and_query() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/dashboard/command-center"))
        .and(query_param("agentId", "agent-1"))
        .and(header("x-user-id", "agent-1"))
        .and(header("authorization", "Bearer tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "stats": {
                "new_leads_today": 3,
                "unworked_leads": 5,
                "appointments_today": 1,
                "confirmations_7d": 4
            },
            "queues": {
                "new_leads_to_work": [{"lead_id": "L1", "full_name": "Jane Doe"}],
                "appointments_coming_up": [],
                "needs_attention": []
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, signed_in());
    let snapshot = client.fetch_command_center().await.unwrap();

    assert_eq!(snapshot.stats.new_leads_today, 3);
    assert_eq!(snapshot.stats.confirmations_7d, 4);
    assert_eq!(snapshot.queues.new_leads_to_work.len(), 1);
}

#[tokio::test]
async fn test_anonymous_session_sends_no_identity() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/dashboard/billing"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "plan": {"id": "free", "name": "Free", "status": "active"},
            "usage": {"reports_per_month": {"used": 2, "limit": 3}},
            "warnings": [{"key": "reports_per_month", "percent": 66}]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, StaticSession::anonymous());
    let billing = client.fetch_dashboard_billing().await.unwrap();
    assert_eq!(billing.plan.id, "free");
    assert_eq!(billing.usage.reports_per_month.limit, 3);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("x-user-id").is_none());
    assert!(requests[0].headers.get("authorization").is_none());
    assert!(requests[0].url.query().is_none());
}

#[tokio::test]
async fn test_limit_reached_becomes_billing_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/dashboard/reports/track-generation"))
        .and(body_partial_json(json!({"listing_id": "X1", "reference_id": "ref-1"})))
        .respond_with(ResponseTemplate::new(402).set_body_json(json!({
            "error": "limit_reached",
            "feature": "reports",
            "plan_id": "free",
            "used": 3,
            "limit": 3
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, signed_in());
    let err = client
        .track_report_generation("X1", Some("ref-1"))
        .await
        .unwrap_err();

    let limit = err.billing_limit().expect("billing limit error");
    assert_eq!(limit.feature, "reports");
    assert_eq!(limit.plan_id, "free");
    assert_eq!(limit.used, 3);
    assert_eq!(limit.limit, 3);
    assert_eq!(limit.modal.title, "You're at your limit.");
    assert_eq!(limit.modal.primary, "Upgrade now");
}

#[tokio::test]
async fn test_plain_error_carries_server_message() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/dashboard/roi-metrics"))
        .and(query_param("timeframe", "30d"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "server_error"})))
        .mount(&server)
        .await;

    let client = client_for(&server, signed_in());
    let err = client
        .fetch_roi_metrics(MetricsRange::ThirtyDays)
        .await
        .unwrap_err();

    assert!(err.billing_limit().is_none());
    assert_eq!(err.to_string(), "server_error");
    assert_eq!(err.status_code(), Some(500));
}

#[tokio::test]
async fn test_roi_metrics_unwraps_envelope() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/dashboard/roi-metrics"))
        .and(query_param("timeframe", "7d"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "metrics": {
                "leads_captured": 12,
                "appointments_set": 4,
                "confirmations": 3,
                "top_source": {"label": "Open House", "count": 6}
            }
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, signed_in());
    let metrics = client.fetch_roi_metrics(MetricsRange::SevenDays).await.unwrap();
    assert_eq!(metrics.leads_captured, 12);
    assert_eq!(metrics.top_source.unwrap().count, 6);
}

#[tokio::test]
async fn test_listing_performance_path_and_range() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/dashboard/listings/X%201/performance"))
        .and(query_param("range", "30d"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "listing_id": "X 1",
            "metrics": {"leads_count": 5, "appointments_count": 2},
            "breakdown": {"by_source_type": [{"source_type": "open_house", "total": 5}]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, signed_in());
    let report = client
        .fetch_listing_performance("X 1", MetricsRange::ThirtyDays)
        .await
        .unwrap();
    assert_eq!(report.metrics.leads_count, 5);
    assert_eq!(report.top_source().label.as_deref(), Some("Open House"));
}

#[tokio::test]
async fn test_leads_query_omits_all_filters() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/dashboard/leads"))
        .and(query_param("tab", "New"))
        .and(query_param("intent", "Hot"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "leads": [{"id": "L1", "name": "Jane Doe", "status": "New", "intent_level": "Hot"}]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, signed_in());
    let filter = LeadsFilter {
        status: Some("all".to_string()),
        intent: Some("Hot".to_string()),
        ..Default::default()
    };
    let page = client.fetch_dashboard_leads(&filter).await.unwrap();
    assert_eq!(page.leads.len(), 1);

    let requests = server.received_requests().await.unwrap();
    let query = requests[0].url.query().unwrap_or_default().to_string();
    assert!(!query.contains("status="), "unexpected query {}", query);
}

#[tokio::test]
async fn test_session_seeds_store_and_reports_failures() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/dashboard/leads"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "leads": [{"id": "L1", "name": "Jane Doe"}, {"id": "L2", "name": "John Roe"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/dashboard/appointments"))
        .and(query_param("view", "today"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let store = RealtimeStore::new();
    let notifier = ApiErrorNotifier::new();
    let mut notices = notifier.subscribe();
    let session = DashboardSession::new(
        Arc::new(client_for(&server, signed_in())),
        store.clone(),
        notifier,
    );

    let err = session
        .load_initial(&LeadsFilter::default(), AppointmentsView::Today)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Request failed (503)");

    assert!(store.lead("L1").is_some());
    assert!(store.lead("L2").is_some());

    let notice = notices.recv().await.unwrap();
    assert_eq!(notice.title, "Could not load appointments");
    assert_eq!(notice.context.as_deref(), Some("dashboard.load_appointments"));
}

#[tokio::test]
async fn test_null_fields_in_snapshot_rows_still_seed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/dashboard/leads"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "L1", "name": "Jane", "timeline": null, "phone": null},
            {"id": "L2", "name": "Ok"}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/dashboard/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "appointments": [
                {"id": "A1", "status": "scheduled", "normalizedStatus": null, "lead": {"id": "L1", "name": null}}
            ],
            "counts": {"today": 1, "upcoming": null}
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, signed_in());
    let page = client
        .fetch_dashboard_appointments(AppointmentsView::Today)
        .await
        .unwrap();
    assert_eq!(page.counts.get("today"), Some(&1));
    assert!(!page.counts.contains_key("upcoming"));

    let store = RealtimeStore::new();
    let session = DashboardSession::new(Arc::new(client), store.clone(), ApiErrorNotifier::new());
    session
        .load_initial(&LeadsFilter::default(), AppointmentsView::Today)
        .await
        .unwrap();

    let jane = store.lead("L1").unwrap();
    assert_eq!(jane.name, "Jane");
    assert_eq!(jane.timeline, "");
    assert!(store.lead("L2").is_some());
    assert_eq!(store.appointment("A1").unwrap().normalized_status, "");
}

#[tokio::test]
async fn test_record_agent_action_patches_then_posts() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/dashboard/leads"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "leads": [{"id": "L1", "name": "Jane Doe"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/dashboard/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true, "appointments": [], "counts": {"today": 0}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/dashboard/agent-actions"))
        .and(body_partial_json(json!({
            "lead_id": "L1", "action": "call_clicked", "agentId": "agent-1"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "action": {"id": "act-1", "lead_id": "L1", "action": "call_clicked", "created_at": "2024-01-01T00:00:00Z"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = RealtimeStore::new();
    let session = DashboardSession::new(
        Arc::new(client_for(&server, signed_in())),
        store.clone(),
        ApiErrorNotifier::new(),
    );
    session
        .load_initial(&LeadsFilter::default(), AppointmentsView::Week)
        .await
        .unwrap();

    let record = session
        .record_agent_action("L1", AgentAction::CallClicked)
        .await
        .unwrap();
    assert_eq!(record.id.as_deref(), Some("act-1"));
    assert!(store.lead("L1").unwrap().last_agent_action_at.is_some());
}

#[tokio::test]
async fn test_client_as_command_center_source() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/dashboard/command-center"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "unauthorized"})))
        .mount(&server)
        .await;

    let source: Arc<dyn CommandCenterSource> = Arc::new(client_for(&server, signed_in()));
    let err = source.fetch_command_center().await.unwrap_err();
    assert!(matches!(err, Error::Api { status: 401, .. }));
}
