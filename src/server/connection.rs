//! WebSocket subscriber connections
//!
//! After the upgrade the socket is split. The sending half becomes the
//! subscriber's [`Transport`] and is owned by its writer task; the receiving
//! half stays here and is read only to notice the peer going away (inbound
//! messages are discarded).

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};

use crate::relay::{Relay, Transport};

/// Sending half of a WebSocket, one binary message per frame
pub struct WsTransport {
    sink: SplitSink<WebSocket, Message>,
}

impl WsTransport {
    /// Wrap the sending half of an upgraded socket
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self { sink }
    }
}

impl Transport for WsTransport {
    async fn write(&mut self, data: Bytes) -> std::io::Result<()> {
        self.sink
            .send(Message::Binary(data.to_vec()))
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::BrokenPipe, e))
    }

    async fn close(&mut self) {
        // Fails if the peer is already gone; nothing left to do then
        let _ = self.sink.close().await;
    }
}

/// Serve one upgraded WebSocket until either side gives up
pub(crate) async fn handle_socket(
    socket: WebSocket,
    peer: Option<SocketAddr>,
    relay: Arc<Relay>,
) {
    let (sink, mut stream) = socket.split();

    let (subscriber, mut writer) = match relay.subscribe(WsTransport::new(sink), peer).await
    {
        Ok(parts) => parts,
        Err(e) => {
            tracing::debug!(peer = ?peer, error = %e, "WebSocket subscriber rejected");
            return;
        }
    };

    tracing::debug!(subscriber = %subscriber.id(), peer = ?peer, "WebSocket connected");

    tokio::select! {
        result = &mut writer => {
            // Writer died on its own (write failure or relay shutdown)
            if let Err(e) = result {
                tracing::warn!(subscriber = %subscriber.id(), error = %e, "Writer task failed");
            }
        }
        _ = drain_inbound(&mut stream) => {
            subscriber.disconnect();
            if let Err(e) = writer.await {
                tracing::warn!(subscriber = %subscriber.id(), error = %e, "Writer task failed");
            }
        }
    }

    tracing::debug!(subscriber = %subscriber.id(), peer = ?peer, "WebSocket disconnected");
}

/// Read and discard messages until the peer closes or errors
async fn drain_inbound(stream: &mut SplitStream<WebSocket>) {
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::trace!(error = %e, "WebSocket read failed");
                break;
            }
        }
    }
}
