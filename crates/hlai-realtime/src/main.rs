//! `hlai-realtime`: keep a dashboard store in sync with the realtime socket
//! and log what changes.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hlai_client::{AppointmentsView, DashboardClient, DashboardSession, LeadsFilter, StaticSession};
use hlai_core::{ApiErrorNotifier, RealtimeStore, StoreChange, TracingToastSink};
use hlai_realtime::{RealtimeConfig, RealtimeManager, WebSocketConnector};

/// Initialize tracing with configurable output.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional, daily rotation)
///   LOG_ANSI    - "true"/"false" override ANSI colors
///   RUST_LOG    - env filter (default: "hlai_realtime=info,hlai_client=info,hlai_core=info")
fn init_tracing() -> Option<WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "hlai_realtime=info,hlai_client=info,hlai_core=info".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    let guard = if let Some(ref path) = log_file {
        let path = std::path::Path::new(path);
        let file_dir = path.parent().unwrap_or(std::path::Path::new("."));
        let file_name = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("hlai-realtime.log");
        let (writer, guard) =
            tracing_appender::non_blocking(tracing_appender::rolling::daily(file_dir, file_name));

        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry.with(tracing_subscriber::fmt::layer().json()).init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );
    guard
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = init_tracing();

    let config = RealtimeConfig::from_env();
    config.validate()?;

    let session = Arc::new(StaticSession::from_env());
    let client = Arc::new(DashboardClient::from_env(session.clone())?);
    let store = RealtimeStore::with_capacity(config.store_channel_capacity);
    let notifier = ApiErrorNotifier::new();

    let mut notices = notifier.subscribe();
    tokio::spawn(async move {
        while let Ok(notice) = notices.recv().await {
            warn!(
                subsystem = "client",
                title = %notice.title,
                context = notice.context.as_deref().unwrap_or(""),
                error = notice.error.as_deref().unwrap_or(""),
                "API error"
            );
        }
    });

    let mut changes = store.subscribe();
    tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(StoreChange::Slice(slice)) => info!(subsystem = "store", slice = ?slice, "Store updated"),
                Ok(StoreChange::Event(event)) => info!(
                    subsystem = "store",
                    event_type = %event.event_type(),
                    entity_id = event.refs().primary_id().unwrap_or(""),
                    "Realtime event"
                ),
                Err(RecvError::Lagged(missed)) => warn!(subsystem = "store", missed, "Store log lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let dashboard = DashboardSession::new(client.clone(), store.clone(), notifier);
    if let Err(e) = dashboard
        .load_initial(&LeadsFilter::default(), AppointmentsView::default())
        .await
    {
        warn!(error = %e, "Initial load incomplete");
    }
    if let Err(e) = dashboard.refresh_command_center().await {
        warn!(error = %e, "Initial command center load failed");
    }

    let manager = RealtimeManager::new(
        config,
        session,
        Arc::new(WebSocketConnector),
        store,
        client,
        Arc::new(TracingToastSink),
    );
    manager.resume().await;

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    manager.stop();
    Ok(())
}
