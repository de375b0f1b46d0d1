//! Session identity and store seeding.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use hlai_core::normalize::iso_timestamp;
use hlai_core::{
    ApiErrorNotice, ApiErrorNotifier, Error, RealtimeStore, Result, SessionProvider,
};

use crate::client::DashboardClient;
use crate::types::{
    AgentAction, AgentActionRecord, AgentActionRequest, AppointmentsView, LeadsFilter,
};

/// Session with fixed credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticSession {
    access_token: Option<String>,
    agent_id: Option<String>,
}

impl StaticSession {
    pub fn new(access_token: Option<String>, agent_id: Option<String>) -> Self {
        Self {
            access_token: access_token.filter(|t| !t.is_empty()),
            agent_id: agent_id.filter(|id| !id.is_empty()),
        }
    }

    /// No token and no agent; realtime start is deferred.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Read `HLAI_ACCESS_TOKEN` and `HLAI_AGENT_ID`.
    pub fn from_env() -> Self {
        Self::new(
            std::env::var("HLAI_ACCESS_TOKEN").ok(),
            std::env::var("HLAI_AGENT_ID").ok(),
        )
    }
}

#[async_trait]
impl SessionProvider for StaticSession {
    async fn access_token(&self) -> Option<String> {
        self.access_token.clone()
    }

    async fn agent_id(&self) -> Option<String> {
        self.agent_id.clone()
    }
}

/// Ties the REST client to a store: seeds it from snapshots and applies
/// optimistic patches for local agent actions.
#[derive(Clone)]
pub struct DashboardSession {
    client: Arc<DashboardClient>,
    store: RealtimeStore,
    notifier: ApiErrorNotifier,
}

impl DashboardSession {
    pub fn new(client: Arc<DashboardClient>, store: RealtimeStore, notifier: ApiErrorNotifier) -> Self {
        Self {
            client,
            store,
            notifier,
        }
    }

    pub fn client(&self) -> &Arc<DashboardClient> {
        &self.client
    }

    pub fn store(&self) -> &RealtimeStore {
        &self.store
    }

    /// Fetch leads and appointments and replace the store's maps.
    ///
    /// Both fetches run concurrently. Whatever succeeds is seeded; each
    /// failure is reported to the notifier and the first one is returned.
    pub async fn load_initial(&self, filter: &LeadsFilter, view: AppointmentsView) -> Result<()> {
        let (leads, appointments) = tokio::join!(
            self.client.fetch_dashboard_leads(filter),
            self.client.fetch_dashboard_appointments(view),
        );

        let mut first_error: Option<Error> = None;

        match leads {
            Ok(page) => {
                info!(subsystem = "client", count = page.leads.len(), "Loaded leads");
                self.store.set_initial_leads(page.leads);
            }
            Err(err) => {
                self.report(
                    "Could not load leads",
                    "We could not reach the dashboard service. Refresh to try again.",
                    "dashboard.load_leads",
                    &err,
                );
                first_error.get_or_insert(err);
            }
        }

        match appointments {
            Ok(page) => {
                info!(
                    subsystem = "client",
                    count = page.appointments.len(),
                    "Loaded appointments"
                );
                self.store.set_initial_appointments(page.appointments);
            }
            Err(err) => {
                self.report(
                    "Could not load appointments",
                    "We could not reach the dashboard service. Refresh to try again.",
                    "dashboard.load_appointments",
                    &err,
                );
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Fetch the command-center snapshot into the store.
    pub async fn refresh_command_center(&self) -> Result<()> {
        let snapshot = self.client.fetch_command_center().await?;
        self.store.set_command_center(Some(snapshot));
        Ok(())
    }

    /// Mark the lead as acted on locally, then record the action server-side.
    ///
    /// The optimistic patch stays in place if the request fails; the next
    /// snapshot or realtime event corrects it.
    pub async fn record_agent_action(
        &self,
        lead_id: &str,
        action: AgentAction,
    ) -> Result<AgentActionRecord> {
        let patched = self
            .store
            .patch_lead_action(lead_id, &iso_timestamp(Utc::now()));
        debug!(subsystem = "client", entity_id = lead_id, patched, "Optimistic agent action");

        self.client
            .log_agent_action(&AgentActionRequest::new(lead_id, action))
            .await
    }

    fn report(&self, title: &str, description: &str, context: &str, err: &Error) {
        self.notifier.notify(
            ApiErrorNotice::new(title, description)
                .with_context(context)
                .with_error(err),
        );
    }
}
