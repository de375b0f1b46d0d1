//! Socket transport behind the connection manager.

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace};

use hlai_core::{Error, Result};

/// Receive-only stream of text frames. Ends when the peer closes; an `Err`
/// item means the transport failed.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Opens the realtime transport.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect to `url` and return its inbound frames.
    async fn connect(&self, url: &str) -> Result<FrameStream>;
}

/// WebSocket connector over `tokio-tungstenite`.
///
/// Text frames are forwarded as-is, binary frames are decoded as UTF-8,
/// control frames are skipped. The socket closes when the stream is dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<FrameStream> {
        let (socket, response) = connect_async(url)
            .await
            .map_err(|e| Error::Transport(format!("WebSocket connect failed: {}", e)))?;
        debug!(
            subsystem = "realtime",
            status = response.status().as_u16(),
            "WebSocket upgraded"
        );

        let frames = socket.filter_map(|message| async move {
            match message {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                    Ok(text) => Some(Ok(text)),
                    Err(_) => {
                        trace!(subsystem = "realtime", "Skipping non-UTF-8 binary frame");
                        None
                    }
                },
                Ok(Message::Close(frame)) => {
                    debug!(subsystem = "realtime", close = ?frame, "WebSocket close frame");
                    None
                }
                Ok(_) => None,
                Err(e) => Some(Err(Error::Transport(e.to_string()))),
            }
        });
        Ok(Box::pin(frames))
    }
}
