//! End-to-end test against a local WebSocket server.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

use hlai_client::StaticSession;
use hlai_core::{
    CommandCenterSnapshot, CommandCenterSource, RealtimeStore, Result, StoreChange,
    TracingToastSink,
};
use hlai_realtime::{ConnectionPhase, RealtimeConfig, RealtimeManager, WebSocketConnector};

struct EmptySnapshots;

#[async_trait]
impl CommandCenterSource for EmptySnapshots {
    async fn fetch_command_center(&self) -> Result<CommandCenterSnapshot> {
        Ok(CommandCenterSnapshot::default())
    }
}

async fn wait_for_phase(manager: &RealtimeManager, phase: ConnectionPhase) {
    for _ in 0..100 {
        if manager.phase() == phase {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("manager never reached {:?}, now {:?}", phase, manager.phase());
}

#[tokio::test]
async fn test_socket_frames_reach_store() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (uri_tx, uri_rx) = oneshot::channel::<String>();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let callback = move |req: &Request, resp: Response| -> std::result::Result<Response, ErrorResponse> {
            let _ = uri_tx.send(req.uri().to_string());
            Ok(resp)
        };
        let mut ws = accept_hdr_async(stream, callback).await.unwrap();

        ws.send(Message::Text(
            json!({
                "type": "lead.created", "v": 1, "ts": "2024-01-01T00:00:00Z",
                "payload": {"lead_id": "L1", "full_name": "Jane Doe", "intent_level": "hot"}
            })
            .to_string(),
        ))
        .await
        .unwrap();
        ws.send(Message::Text("{broken".to_string())).await.unwrap();
        ws.send(Message::Ping(vec![1, 2, 3])).await.unwrap();
        ws.send(Message::Binary(
            json!({
                "type": "listing.performance.updated", "v": 1, "ts": "2024-01-01T00:00:02Z",
                "payload": {"listing_id": "X1"}
            })
            .to_string()
            .into_bytes(),
        ))
        .await
        .unwrap();
        ws.close(None).await.unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });

    let store = RealtimeStore::new();
    let mut changes = store.subscribe();
    let manager = RealtimeManager::new(
        RealtimeConfig::default().with_ws_base_url(format!("ws://{}", addr)),
        Arc::new(StaticSession::new(Some("tok 1".to_string()), None)),
        Arc::new(WebSocketConnector),
        store.clone(),
        Arc::new(EmptySnapshots),
        Arc::new(TracingToastSink),
    );

    manager.start().await;

    let uri = tokio::time::timeout(Duration::from_secs(5), uri_rx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(uri, "/ws?token=tok%201");

    let mut events = Vec::new();
    while events.len() < 2 {
        let change = tokio::time::timeout(Duration::from_secs(5), changes.recv())
            .await
            .expect("timed out waiting for realtime events")
            .unwrap();
        if let StoreChange::Event(event) = change {
            events.push(event.event_type().as_str());
        }
    }
    assert_eq!(events, ["lead.created", "listing.performance.updated"]);
    assert_eq!(store.lead("L1").unwrap().name, "Jane Doe");
    assert_eq!(
        store.listing_signal("X1").as_deref(),
        Some("2024-01-01T00:00:02Z")
    );

    server.await.unwrap();
    wait_for_phase(&manager, ConnectionPhase::Closed).await;
    assert!(manager.reconnect_pending());

    manager.stop();
    assert_eq!(manager.phase(), ConnectionPhase::Idle);
}

#[tokio::test]
async fn test_refused_connection_schedules_reconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let manager = RealtimeManager::new(
        RealtimeConfig::default().with_ws_base_url(format!("http://{}", addr)),
        Arc::new(StaticSession::new(Some("tok".to_string()), None)),
        Arc::new(WebSocketConnector),
        RealtimeStore::new(),
        Arc::new(EmptySnapshots),
        Arc::new(TracingToastSink),
    );

    manager.start().await;
    assert_eq!(manager.phase(), ConnectionPhase::Closed);
    assert_eq!(manager.reconnect_attempt(), 1);

    manager.stop();
    assert!(!manager.reconnect_pending());
}
