//! Seams between the realtime layer and its collaborators.

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::info;

use crate::defaults::NOTICE_CHANNEL_CAPACITY;
use crate::error::Result;
use crate::models::CommandCenterSnapshot;
use crate::notices::ToastNotice;

/// Source of the signed-in agent's identity.
///
/// Either value may be absent; an absent token means "not signed in yet".
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Short-lived access token for the realtime socket and REST calls.
    async fn access_token(&self) -> Option<String>;

    /// Agent (tenant) id sent as `x-user-id` / `agentId`.
    async fn agent_id(&self) -> Option<String>;
}

/// Anything that can fetch the authoritative command-center snapshot.
#[async_trait]
pub trait CommandCenterSource: Send + Sync {
    async fn fetch_command_center(&self) -> Result<CommandCenterSnapshot>;
}

/// Receiver of realtime toasts.
pub trait ToastSink: Send + Sync {
    fn show(&self, toast: ToastNotice);
}

/// Logs toasts instead of displaying them.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingToastSink;

impl ToastSink for TracingToastSink {
    fn show(&self, toast: ToastNotice) {
        info!(
            subsystem = "realtime",
            title = %toast.title,
            body = %toast.body,
            duration_ms = toast.duration.as_millis() as u64,
            "Toast"
        );
    }
}

/// Forwards toasts to broadcast subscribers (UI layers).
#[derive(Debug, Clone)]
pub struct BroadcastToastSink {
    sender: broadcast::Sender<ToastNotice>,
}

impl Default for BroadcastToastSink {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastToastSink {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(NOTICE_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ToastNotice> {
        self.sender.subscribe()
    }
}

impl ToastSink for BroadcastToastSink {
    fn show(&self, toast: ToastNotice) {
        let _ = self.sender.send(toast);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_sink_delivers() {
        let sink = BroadcastToastSink::new();
        sink.show(ToastNotice::new("dropped", "nobody listening"));

        let mut rx = sink.subscribe();
        sink.show(ToastNotice::new("New lead captured", "Tap to open and follow up."));
        assert_eq!(rx.recv().await.unwrap().title, "New lead captured");
    }

    #[test]
    fn test_sinks_are_object_safe() {
        let sinks: Vec<Box<dyn ToastSink>> =
            vec![Box::new(TracingToastSink), Box::new(BroadcastToastSink::new())];
        for sink in &sinks {
            sink.show(ToastNotice::new("t", "b"));
        }
    }
}
