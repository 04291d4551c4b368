//! Relay front door
//!
//! [`Relay::new`] wires the pipeline together: it validates the
//! configuration and creates the intake and registration queues, returning
//! the three pieces that are driven by separate tasks:
//! - the [`Relay`] itself, shared by connection handlers to add subscribers
//! - the [`Dispatcher`], to be spawned
//! - the intake sender, handed to the ingest loop

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::ConfigError;
use crate::stats::RelayStats;

use super::config::RelayConfig;
use super::dispatcher::Dispatcher;
use super::error::RelayError;
use super::frame::{Frame, SubscriberId};
use super::subscriber::{SubscriberHandle, Transport};

/// Producer side of the intake queue
pub type FrameSender = mpsc::Sender<Frame>;

/// Capacity of the ingest → dispatcher hand-off
const INTAKE_CAPACITY: usize = 1;

/// Admission point for new subscribers
pub struct Relay {
    config: RelayConfig,
    registrations: mpsc::Sender<SubscriberHandle>,
    next_subscriber_id: AtomicU64,
    stats: Arc<RelayStats>,
}

impl Relay {
    /// Build the pipeline queues for `config`
    pub fn new(config: RelayConfig) -> Result<(Self, Dispatcher, FrameSender), ConfigError> {
        config.validate()?;
        if config.mailbox_capacity > 1 {
            tracing::warn!(
                mailbox_capacity = config.mailbox_capacity,
                "Mailbox capacity above 1 has no effect: each frame replaces the pending one"
            );
        }

        let (intake_tx, intake_rx) = mpsc::channel(INTAKE_CAPACITY);
        let (registration_tx, registration_rx) = mpsc::channel(config.registration_capacity);
        let stats = Arc::new(RelayStats::new());

        let dispatcher = Dispatcher::new(intake_rx, registration_rx, Arc::clone(&stats));
        let relay = Self {
            config,
            registrations: registration_tx,
            next_subscriber_id: AtomicU64::new(1),
            stats,
        };

        Ok((relay, dispatcher, intake_tx))
    }

    /// Get the relay configuration
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Get the shared pipeline statistics
    pub fn stats(&self) -> &Arc<RelayStats> {
        &self.stats
    }

    /// Whether the dispatcher still admits subscribers
    pub fn is_running(&self) -> bool {
        !self.registrations.is_closed()
    }

    /// Create a subscriber with a fresh ID and an empty mailbox
    pub fn new_subscriber(&self, peer: Option<SocketAddr>) -> SubscriberHandle {
        let id = SubscriberId(self.next_subscriber_id.fetch_add(1, Ordering::Relaxed));
        SubscriberHandle::new(id, peer)
    }

    /// Queue a subscriber for admission by the dispatcher
    ///
    /// Waits if the registration queue is full.
    pub async fn register(&self, subscriber: SubscriberHandle) -> Result<(), RelayError> {
        self.registrations
            .send(subscriber)
            .await
            .map_err(|_| RelayError::DispatcherClosed)
    }

    /// Attach a connected transport as a new subscriber
    ///
    /// Registers the subscriber and starts its writer. The returned handle is
    /// for the connection handler, which calls
    /// [`SubscriberHandle::disconnect`] when the peer goes away. If the
    /// dispatcher has stopped, the transport is closed and an error returned.
    pub async fn subscribe<T: Transport>(
        &self,
        mut transport: T,
        peer: Option<SocketAddr>,
    ) -> Result<(SubscriberHandle, JoinHandle<Result<(), RelayError>>), RelayError> {
        let subscriber = self.new_subscriber(peer);

        if let Err(e) = self.register(subscriber.clone()).await {
            transport.close().await;
            tracing::warn!(
                subscriber = %subscriber.id(),
                peer = ?peer,
                "Subscriber rejected: dispatcher stopped"
            );
            return Err(e);
        }

        tracing::debug!(subscriber = %subscriber.id(), peer = ?peer, "Subscriber registered");

        let writer = subscriber.spawn_writer(transport);
        Ok((subscriber, writer))
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::media::ImageFormat;
    use crate::relay::mailbox::Delivery;
    use crate::relay::testing::{wait_until, RecordingTransport};

    #[test]
    fn test_invalid_config_rejected() {
        let result = Relay::new(RelayConfig::default().mailbox_capacity(0));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidMailboxCapacity(0))
        ));
    }

    #[tokio::test]
    async fn test_subscriber_ids_are_unique() {
        let (relay, _dispatcher, _intake) = Relay::new(RelayConfig::default()).unwrap();

        let a = relay.new_subscriber(None);
        let b = relay.new_subscriber(None);

        assert_ne!(a.id(), b.id());
        assert!(a.mailbox().is_empty());
    }

    #[tokio::test]
    async fn test_deeper_queue_still_delivers_latest() {
        let config = RelayConfig::default().mailbox_capacity(2);
        let (relay, _dispatcher, _intake) = Relay::new(config).unwrap();
        let subscriber = relay.new_subscriber(None);

        let frame = |seq: u64, data: &'static [u8]| {
            Frame::new(seq, ImageFormat::Jpeg, Bytes::from_static(data))
        };
        assert_eq!(subscriber.send(frame(1, &b"A"[..])), Ok(Delivery::Queued));
        assert_eq!(subscriber.send(frame(2, &b"B"[..])), Ok(Delivery::Replaced));

        let received = subscriber.mailbox().recv().await.unwrap();
        assert_eq!((received.sequence, &received.data[..]), (2, &b"B"[..]));
        assert!(subscriber.mailbox().is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_and_receive() {
        let config = RelayConfig::with_format(ImageFormat::Png);
        let (relay, dispatcher, intake) = Relay::new(config).unwrap();
        let dispatcher = tokio::spawn(dispatcher.run());

        let transport = RecordingTransport::new();
        let (subscriber, writer) = relay.subscribe(transport.clone(), None).await.unwrap();

        // The first frame admits the subscriber, later ones reach it
        let mut seq = 0;
        while transport.frames().is_empty() {
            intake
                .send(Frame::new(seq, ImageFormat::Png, Bytes::from_static(b"img")))
                .await
                .unwrap();
            seq += 1;
            tokio::task::yield_now().await;
        }
        assert_eq!(relay.stats().snapshot().subscribers_added, 1);

        // Dropping the intake stops the dispatcher, which kills the writer
        drop(intake);
        dispatcher.await.unwrap();
        writer.await.unwrap().unwrap();
        assert!(subscriber.is_dead());
        assert_eq!(transport.close_count(), 1);
        wait_until(|| !relay.is_running()).await;
    }

    #[tokio::test]
    async fn test_subscribe_after_dispatcher_stopped() {
        let (relay, dispatcher, intake) = Relay::new(RelayConfig::default()).unwrap();
        drop(intake);
        dispatcher.run().await;

        let transport = RecordingTransport::new();
        let result = relay.subscribe(transport.clone(), None).await;

        assert!(matches!(result, Err(RelayError::DispatcherClosed)));
        assert_eq!(transport.close_count(), 1);
        assert!(!relay.is_running());
    }
}
