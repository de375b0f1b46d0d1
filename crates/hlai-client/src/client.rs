//! Dashboard REST client.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use hlai_core::defaults::USER_ID_HEADER;
use hlai_core::{
    error_from_response, BillingValueProof, CommandCenterSnapshot, CommandCenterSource,
    DashboardBilling, Error, ListingPerformanceReport, MetricsRange, Result, RoiMetrics,
    SessionProvider,
};

use crate::config::ClientConfig;
use crate::types::*;

/// Identity resolved once per request.
struct Identity {
    agent_id: Option<String>,
    token: Option<String>,
}

/// Client for the dashboard API.
///
/// Every request carries the session identity: `x-user-id` and an `agentId`
/// query parameter when an agent id resolves, and a bearer token when an
/// access token resolves. Non-2xx responses are mapped through
/// [`hlai_core::error_from_response`], so plan-limit failures surface as
/// [`Error::BillingLimit`].
pub struct DashboardClient {
    client: Client,
    config: ClientConfig,
    session: Arc<dyn SessionProvider>,
}

impl std::fmt::Debug for DashboardClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DashboardClient {
    /// Create a new client with the given configuration.
    pub fn new(config: ClientConfig, session: Arc<dyn SessionProvider>) -> Result<Self> {
        config.validate()?;

        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "client",
            base_url = %config.base(),
            timeout_secs = ?config.timeout_seconds,
            "Initializing dashboard client"
        );

        Ok(Self {
            client,
            config,
            session,
        })
    }

    /// Create from environment variables.
    pub fn from_env(session: Arc<dyn SessionProvider>) -> Result<Self> {
        Self::new(ClientConfig::from_env(), session)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn identity(&self) -> Identity {
        Identity {
            agent_id: self.session.agent_id().await.filter(|id| !id.is_empty()),
            token: self.session.access_token().await.filter(|t| !t.is_empty()),
        }
    }

    /// Build a request with identity headers and query.
    async fn build_request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
    ) -> RequestBuilder {
        let identity = self.identity().await;
        let url = format!("{}{}", self.config.base(), path);
        let mut req = self.client.request(method, &url);
        if !query.is_empty() {
            req = req.query(query);
        }

        if let Some(ref agent_id) = identity.agent_id {
            req = req
                .query(&[("agentId", agent_id.as_str())])
                .header(USER_ID_HEADER, agent_id.as_str());
        }
        if let Some(ref token) = identity.token {
            req = req.bearer_auth(token);
        }
        req
    }

    /// Send and decode, mapping failures through the error contract.
    async fn execute<T: DeserializeOwned>(&self, req: RequestBuilder, path: &str) -> Result<T> {
        let started = Instant::now();
        let response = req.send().await.map_err(|e| {
            warn!(subsystem = "client", path, error = %e, "Request failed");
            Error::Request(e.to_string())
        })?;
        let status = response.status();

        debug!(
            subsystem = "client",
            path,
            status = status.as_u16(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Dashboard API response"
        );

        if !status.is_success() {
            let err = Self::error_for(response).await;
            warn!(subsystem = "client", path, status = status.as_u16(), error = %err, "Dashboard API error");
            return Err(err);
        }

        response.json::<T>().await.map_err(|e| {
            Error::Serialization(format!("Failed to decode {} response: {}", path, e))
        })
    }

    async fn error_for(response: Response) -> Error {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        error_from_response(status, &body)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let req = self.build_request(Method::GET, path, query).await;
        self.execute(req, path).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let req = self.build_request(Method::POST, path, &[]).await.json(body);
        self.execute(req, path).await
    }

    // =========================================================================
    // Command center & metrics
    // =========================================================================

    /// `GET /api/dashboard/command-center`
    pub async fn fetch_command_center(&self) -> Result<CommandCenterSnapshot> {
        self.get("/api/dashboard/command-center", &[]).await
    }

    /// `GET /api/dashboard/roi-metrics?timeframe=`
    pub async fn fetch_roi_metrics(&self, range: MetricsRange) -> Result<RoiMetrics> {
        let response: RoiMetricsResponse = self
            .get(
                "/api/dashboard/roi-metrics",
                &[("timeframe", range.as_str().to_string())],
            )
            .await?;
        Ok(response.metrics)
    }

    /// `GET /api/dashboard/listings/{id}/performance?range=`
    pub async fn fetch_listing_performance(
        &self,
        listing_id: &str,
        range: MetricsRange,
    ) -> Result<ListingPerformanceReport> {
        if listing_id.trim().is_empty() {
            return Err(Error::InvalidInput("listing id is required".to_string()));
        }
        let path = format!(
            "/api/dashboard/listings/{}/performance",
            urlencoding::encode(listing_id)
        );
        self.get(&path, &[("range", range.as_str().to_string())])
            .await
    }

    /// `GET /api/dashboard/billing/value-proof?range=`
    pub async fn fetch_billing_value_proof(&self, range: MetricsRange) -> Result<BillingValueProof> {
        self.get(
            "/api/dashboard/billing/value-proof",
            &[("range", range.as_str().to_string())],
        )
        .await
    }

    // =========================================================================
    // Leads & appointments
    // =========================================================================

    /// `GET /api/dashboard/leads`
    pub async fn fetch_dashboard_leads(&self, filter: &LeadsFilter) -> Result<LeadsPage> {
        self.get("/api/dashboard/leads", &filter.query_pairs()).await
    }

    /// `GET /api/dashboard/appointments?view=`
    pub async fn fetch_dashboard_appointments(
        &self,
        view: AppointmentsView,
    ) -> Result<AppointmentsPage> {
        self.get(
            "/api/dashboard/appointments",
            &[("view", view.as_str().to_string())],
        )
        .await
    }

    /// `POST /api/dashboard/agent-actions`
    pub async fn log_agent_action(&self, request: &AgentActionRequest) -> Result<AgentActionRecord> {
        let mut body = match serde_json::to_value(request)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        if let Some(agent_id) = self.identity().await.agent_id {
            body.insert("agentId".to_string(), Value::String(agent_id));
        }

        let response: AgentActionResponse = self.post("/api/dashboard/agent-actions", &body).await?;
        Ok(response.action)
    }

    // =========================================================================
    // Billing
    // =========================================================================

    /// `GET /api/dashboard/billing`
    pub async fn fetch_dashboard_billing(&self) -> Result<DashboardBilling> {
        self.get("/api/dashboard/billing", &[]).await
    }

    /// `POST /api/dashboard/billing/check-entitlement`
    ///
    /// Fails with [`Error::BillingLimit`] when the plan does not allow
    /// `requested_units` more of `feature`.
    pub async fn check_billing_entitlement(
        &self,
        feature: &str,
        requested_units: u32,
        context: &Map<String, Value>,
    ) -> Result<Value> {
        let body = EntitlementCheckRequest {
            feature,
            requested_units,
            context,
        };
        self.post("/api/dashboard/billing/check-entitlement", &body)
            .await
    }

    /// `POST /api/dashboard/reports/track-generation`
    pub async fn track_report_generation(
        &self,
        listing_id: &str,
        reference_id: Option<&str>,
    ) -> Result<Value> {
        let body = ReportTrackRequest {
            listing_id,
            reference_id: reference_id
                .map(str::to_string)
                .unwrap_or_else(|| format!("report_{}", chrono::Utc::now().timestamp_millis())),
        };
        self.post("/api/dashboard/reports/track-generation", &body)
            .await
    }
}

#[async_trait]
impl CommandCenterSource for DashboardClient {
    async fn fetch_command_center(&self) -> Result<CommandCenterSnapshot> {
        DashboardClient::fetch_command_center(self).await
    }
}
