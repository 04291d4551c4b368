//! Subscribers and their writer tasks
//!
//! Each subscriber is split in two halves:
//! - a [`SubscriberHandle`], cloned into the dispatcher's live set and kept by
//!   the connection handler, which only ever touches the mailbox
//! - a writer task that owns the [`Transport`], drains the mailbox and performs
//!   the (possibly slow) network write
//!
//! Lifecycle: `Connected → Registered → Live → Dead`. The subscriber dies on
//! the first failed write or when the connection handler disconnects it; the
//! writer then closes the transport exactly once and exits. There is no way
//! back from dead: a reconnecting client becomes a new subscriber.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::task::JoinHandle;

use super::error::RelayError;
use super::frame::{Frame, SubscriberId};
use super::mailbox::{Delivery, Mailbox, MailboxClosed};

/// Outbound, message-oriented connection to one subscriber
///
/// Implemented by the WebSocket sink in the server; tests use in-memory
/// transports.
pub trait Transport: Send + 'static {
    /// Send one frame as a single message
    fn write(&mut self, data: Bytes) -> impl Future<Output = std::io::Result<()>> + Send;

    /// Close the connection
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Dispatcher-facing half of a subscriber
#[derive(Debug, Clone)]
pub struct SubscriberHandle {
    id: SubscriberId,
    peer: Option<SocketAddr>,
    mailbox: Arc<Mailbox>,
}

impl SubscriberHandle {
    /// Create a subscriber with an empty mailbox
    pub fn new(id: SubscriberId, peer: Option<SocketAddr>) -> Self {
        Self {
            id,
            peer,
            mailbox: Arc::new(Mailbox::new()),
        }
    }

    /// Get the subscriber ID
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Get the remote address, if known
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Get the subscriber's mailbox
    pub fn mailbox(&self) -> &Arc<Mailbox> {
        &self.mailbox
    }

    /// Hand a frame to the writer without waiting
    pub fn send(&self, frame: Frame) -> Result<Delivery, MailboxClosed> {
        self.mailbox.send(frame)
    }

    /// Mark the subscriber dead (peer went away)
    ///
    /// The writer notices, closes the transport and exits. Returns `true` if
    /// the subscriber was still alive.
    pub fn disconnect(&self) -> bool {
        self.mailbox.close()
    }

    /// Whether the subscriber is dead
    pub fn is_dead(&self) -> bool {
        self.mailbox.is_closed()
    }

    /// Start the writer task for this subscriber
    pub fn spawn_writer<T: Transport>(&self, transport: T) -> JoinHandle<Result<(), RelayError>> {
        tokio::spawn(run_writer(self.clone(), transport))
    }
}

/// Drain the mailbox into the transport until the subscriber dies
///
/// Returns `Ok(())` after an explicit disconnect, or the write error that
/// killed the subscriber.
pub async fn run_writer<T: Transport>(
    handle: SubscriberHandle,
    mut transport: T,
) -> Result<(), RelayError> {
    let result = loop {
        let Some(frame) = handle.mailbox.recv().await else {
            break Ok(());
        };

        let sequence = frame.sequence;
        if let Err(e) = transport.write(frame.data).await {
            tracing::trace!(subscriber = %handle.id, sequence, "Frame write failed");
            break Err(RelayError::SubscriberWriteFailed {
                id: handle.id,
                source: e,
            });
        }
    };

    handle.mailbox.close();
    transport.close().await;

    match &result {
        Ok(()) => tracing::debug!(
            subscriber = %handle.id,
            peer = ?handle.peer,
            "Writer stopped: subscriber disconnected"
        ),
        Err(e) => tracing::debug!(
            subscriber = %handle.id,
            peer = ?handle.peer,
            error = %e,
            "Writer stopped"
        ),
    }

    result
}
